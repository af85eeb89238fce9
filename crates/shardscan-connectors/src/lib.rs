//! shardscan connectors - execution side of a federated relation scan
//!
//! Given a [`Split`](shardscan_core::Split) planned by `shardscan-core`, this
//! crate connects to one of its chunk hosts and streams the rows of a query
//! run against that host:
//! - [`LocalityConnector`]: prefer the local replica, fail over to the others
//! - [`RowReader`]: forward-only cursor reads with guaranteed release
//! - [`PgHostConnector`]: the PostgreSQL backend

pub mod config;
pub mod decode;
pub mod error;
pub mod locality;
pub mod metrics;
pub mod postgres;
pub mod reader;
pub mod session;

pub use config::{FetchSize, ScanConfig};
pub use decode::{ColumnKind, DelimitedRowDecoder, RowDecoder, TextColumns};
pub use error::ConnectorError;
pub use locality::LocalityConnector;
pub use metrics::ScanMetrics;
pub use postgres::{PgCursorBackend, PgHostConnector};
pub use reader::{read_split, RowReader};
pub use session::{HostConnector, ScanBackend, Session};

use shardscan_core::{HostPicker, Split};

/// Connect to a host of `split` and start `sql` on it.
pub async fn open_split<C, P, D>(
    connector: &mut LocalityConnector<C, P>,
    split: &Split,
    sql: &str,
    decoder: D,
    fetch_size: FetchSize,
) -> Result<RowReader<C::Backend, D>, ConnectorError>
where
    C: HostConnector,
    P: HostPicker + Send,
    D: RowDecoder<<C::Backend as ScanBackend>::Row>,
{
    let session = connector.connect(split).await?;
    RowReader::open(session, sql, decoder, fetch_size).await
}
