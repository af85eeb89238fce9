//! In-memory catalog description and the job-scoped [`Catalog`] handle.
//!
//! The description mirrors what the on-disk catalog declares: a list of
//! nodes, each holding partitions of one or more relations. The same
//! `(relation, partition)` pair declared on several nodes is a replica.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chunk::redact_url;
use crate::index::PartitionIndex;

/// The whole catalog as loaded by the surrounding system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDescription {
    pub nodes: Vec<NodeDecl>,
}

/// One database node and the relation partitions it serves.
#[derive(Clone, Serialize, Deserialize)]
pub struct NodeDecl {
    /// Network address of the node, compared against a worker's own address.
    pub location: String,
    pub username: String,
    pub password: String,
    pub driver: String,
    #[serde(default)]
    pub relations: Vec<RelationDecl>,
}

/// A relation as declared on one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDecl {
    pub id: String,
    #[serde(default)]
    pub partitions: Vec<PartitionDecl>,
}

/// One physical partition and the connection URL that reaches it on its node.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDecl {
    pub id: String,
    pub url: String,
}

impl CatalogDescription {
    pub fn new(nodes: Vec<NodeDecl>) -> Self {
        Self { nodes }
    }
}

impl NodeDecl {
    pub fn new(location: &str, username: &str, password: &str, driver: &str) -> Self {
        Self {
            location: location.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            driver: driver.to_string(),
            relations: Vec::new(),
        }
    }

    /// Declare `(partition id, url)` pairs of `relation` on this node.
    pub fn with_relation(mut self, relation: &str, partitions: &[(&str, &str)]) -> Self {
        self.relations.push(RelationDecl {
            id: relation.to_string(),
            partitions: partitions
                .iter()
                .map(|(id, url)| PartitionDecl {
                    id: id.to_string(),
                    url: url.to_string(),
                })
                .collect(),
        });
        self
    }
}

impl std::fmt::Debug for NodeDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDecl")
            .field("location", &self.location)
            .field("username", &self.username)
            .field("password", &"***")
            .field("driver", &self.driver)
            .field("relations", &self.relations)
            .finish()
    }
}

impl std::fmt::Debug for PartitionDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionDecl")
            .field("id", &self.id)
            .field("url", &redact_url(&self.url))
            .finish()
    }
}

/// Relation and partition ids are matched after trimming and lower-casing.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

/// Job-scoped catalog: the description plus its partition index, built
/// once on first use and shared read-only afterwards.
///
/// Create one per job, wrap it in an `Arc` if planning happens on several
/// threads, and hand `&Catalog` to the registry and planner.
#[derive(Debug)]
pub struct Catalog {
    description: CatalogDescription,
    index: OnceCell<PartitionIndex>,
}

impl Catalog {
    pub fn new(description: CatalogDescription) -> Self {
        Self {
            description,
            index: OnceCell::new(),
        }
    }

    pub fn description(&self) -> &CatalogDescription {
        &self.description
    }

    /// The partition index. Concurrent first calls block until a single
    /// build has been published.
    pub fn index(&self) -> &PartitionIndex {
        self.index.get_or_init(|| {
            let index = PartitionIndex::build(&self.description);
            info!(
                "Built partition index: {} nodes, {} relations",
                index.node_count(),
                index.relation_count()
            );
            index
        })
    }
}
