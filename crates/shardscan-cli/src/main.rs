//! shardscan CLI - plan splits from a catalog and scan them

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shardscan_connectors::{
    read_split, DelimitedRowDecoder, FetchSize, LocalityConnector, PgHostConnector, ScanConfig,
    ScanMetrics,
};
use shardscan_core::{Catalog, CatalogDescription, Split, SplitPlanner};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "shardscan")]
#[command(about = "Scan relations partitioned across independent database nodes")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which nodes serve each partition of a relation
    Describe {
        /// Path to the catalog JSON file
        #[arg(short, long)]
        catalog: PathBuf,

        /// Relation name
        #[arg(short, long)]
        relation: String,
    },

    /// Plan one split per partition and write them as JSON
    Plan {
        /// Path to the catalog JSON file
        #[arg(short, long)]
        catalog: PathBuf,

        /// Relation name
        #[arg(short, long)]
        relation: String,

        /// Keep every replica of each partition as a candidate host
        #[arg(long)]
        replication: bool,

        /// Output path for the splits (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run a query against one planned split and print its rows
    Scan {
        /// Path to a splits file written by `plan`
        #[arg(short, long)]
        splits: PathBuf,

        /// Which split of the file to scan
        #[arg(short, long, default_value_t = 0)]
        index: usize,

        /// SQL to run on the chosen chunk host
        #[arg(long)]
        sql: String,

        /// Output columns as "name type, ..." (all columns if omitted)
        #[arg(long)]
        schema: Option<String>,

        /// This worker's address, overriding SHARDSCAN_LOCAL_ADDRESS
        #[arg(long)]
        local_address: Option<String>,

        /// Rows per fetch, or "streaming"
        #[arg(long)]
        fetch_size: Option<FetchSize>,

        /// Print Prometheus metrics to stderr when done
        #[arg(long)]
        metrics: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Describe { catalog, relation } => {
            describe(&catalog, &relation)?;
        }
        Commands::Plan {
            catalog,
            relation,
            replication,
            out,
        } => {
            let replication = replication || ScanConfig::from_env()?.replication;
            plan(&catalog, &relation, replication, out.as_deref())?;
        }
        Commands::Scan {
            splits,
            index,
            sql,
            schema,
            local_address,
            fetch_size,
            metrics,
        } => {
            let mut config = ScanConfig::from_env()?;
            if local_address.is_some() {
                config.local_address = local_address;
            }
            if let Some(fetch_size) = fetch_size {
                config.fetch_size = fetch_size;
            }
            scan(&splits, index, &sql, schema.as_deref(), &config, metrics).await?;
        }
    }

    Ok(())
}

fn load_catalog(path: &Path) -> Result<Catalog> {
    info!("Loading catalog from {:?}", path);
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {}", path.display()))?;
    let description: CatalogDescription = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog {}", path.display()))?;
    Ok(Catalog::new(description))
}

fn describe(catalog_path: &Path, relation: &str) -> Result<()> {
    let catalog = load_catalog(catalog_path)?;
    let index = catalog.index();
    let partitions = index.relation_partitions(relation)?;

    println!("Relation: {} ({} partitions)", relation.trim(), partitions.len());
    for (partition, nodes) in partitions {
        let locations: Vec<&str> = nodes
            .iter()
            .map(|id| index.node(*id).location.as_str())
            .collect();
        println!("  {:<16} {}", partition, locations.join(", "));
    }
    Ok(())
}

fn plan(catalog_path: &Path, relation: &str, replication: bool, out: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(catalog_path)?;
    let splits = SplitPlanner::new(&catalog).plan_splits(relation, replication)?;

    for split in &splits {
        info!(
            "Split {} -> {}",
            split.chunk().id(),
            split.locations().join(", ")
        );
    }

    let json = serde_json::to_string_pretty(&splits)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write splits to {}", path.display()))?;
            info!("Wrote {} splits to {:?}", splits.len(), path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn scan(
    splits_path: &Path,
    index: usize,
    sql: &str,
    schema: Option<&str>,
    config: &ScanConfig,
    with_metrics: bool,
) -> Result<()> {
    let content = std::fs::read_to_string(splits_path)
        .with_context(|| format!("Failed to read splits {}", splits_path.display()))?;
    let splits: Vec<Split> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse splits {}", splits_path.display()))?;
    let split = splits.get(index).with_context(|| {
        format!("Split index {} out of range ({} splits)", index, splits.len())
    })?;

    let decoder = match schema {
        Some(schema) => DelimitedRowDecoder::from_schema(schema)?,
        None => DelimitedRowDecoder::positional(),
    };

    let metrics = ScanMetrics::new();
    let mut connector = LocalityConnector::from_config(PgHostConnector::new(), config)
        .with_metrics(metrics.clone());
    let session = connector.connect(split).await?;
    info!(
        "Scanning chunk {} of {} on {}",
        split.chunk().id(),
        split.relation(),
        session.host().address()
    );

    let rows = read_split(session, sql, decoder, config.fetch_size, |key, line| {
        println!("{}\t{}", key, line);
        ControlFlow::Continue(())
    })
    .await?;
    info!("Scanned {} rows", rows);

    if with_metrics {
        eprint!("{}", metrics.encode()?);
    }
    Ok(())
}
