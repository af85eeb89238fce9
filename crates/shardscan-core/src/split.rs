//! Split Planner: one [`Split`] per chunk of a relation.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::Catalog;
use crate::chunk::Chunk;
use crate::error::CatalogError;
use crate::registry::ChunkRegistry;

/// The unit of work handed to one task: a relation, one chunk, and the
/// chunk's host addresses as scheduling hints.
///
/// A split owns a copy of its chunk; nothing done to the registry after
/// planning is visible through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SplitDto", into = "SplitDto")]
pub struct Split {
    relation: String,
    chunk: Chunk,
    locations: Vec<String>,
}

impl Split {
    pub fn new(relation: &str, chunk: Chunk) -> Self {
        let locations = chunk.locations();
        Self {
            relation: relation.to_string(),
            chunk,
            locations,
        }
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    /// Candidate host addresses captured when the split was created.
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Always 1: no per-chunk size estimate is available.
    pub fn length(&self) -> u64 {
        1
    }
}

/// Locations are derived from the chunk, so only relation and chunk travel.
#[derive(Serialize, Deserialize)]
struct SplitDto {
    relation: String,
    chunk: Chunk,
}

impl From<SplitDto> for Split {
    fn from(dto: SplitDto) -> Self {
        Split::new(&dto.relation, dto.chunk)
    }
}

impl From<Split> for SplitDto {
    fn from(split: Split) -> Self {
        SplitDto {
            relation: split.relation,
            chunk: split.chunk,
        }
    }
}

pub struct SplitPlanner<'a> {
    registry: ChunkRegistry<'a>,
}

impl<'a> SplitPlanner<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            registry: ChunkRegistry::new(catalog),
        }
    }

    /// Plan every split of `relation`. Fails before returning anything if
    /// the relation is unknown or a chunk has no host.
    pub fn plan_splits(&self, relation: &str, replication: bool) -> Result<Vec<Split>, CatalogError> {
        let chunks = self.registry.build_chunks(relation, replication)?;
        let splits: Vec<Split> = chunks
            .into_iter()
            .map(|chunk| Split::new(relation, chunk))
            .collect();
        info!(
            "Planned {} splits for relation '{}' (replication={})",
            splits.len(),
            relation,
            replication
        );
        Ok(splits)
    }
}
