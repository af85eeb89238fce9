//! Chunk Registry: materializes a relation's partitions into [`Chunk`]s.

use std::collections::HashSet;

use tracing::debug;

use crate::catalog::Catalog;
use crate::chunk::{Chunk, ChunkHost};
use crate::error::CatalogError;
use crate::index::{NodeId, PartitionIndex};

pub struct ChunkRegistry<'a> {
    catalog: &'a Catalog,
}

impl<'a> ChunkRegistry<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// One chunk per partition of `relation`, in catalog order.
    ///
    /// With `replication` every node holding a partition becomes a host of
    /// its chunk. Without it each chunk gets a single host: the first of its
    /// nodes not already given to an earlier chunk, or its first declared
    /// node when all of them are taken.
    pub fn build_chunks(
        &self,
        relation: &str,
        replication: bool,
    ) -> Result<Vec<Chunk>, CatalogError> {
        let index = self.catalog.index();
        let partitions = index.relation_partitions(relation)?;

        let mut chunks = Vec::with_capacity(partitions.len());
        let mut used: HashSet<NodeId> = HashSet::new();

        for (chunk_id, nodes) in partitions {
            let mut chunk = Chunk::new(chunk_id);

            if replication {
                for node in nodes {
                    if let Some(host) = chunk_host(index, *node, relation, chunk_id) {
                        chunk.add_host(host);
                    }
                }
            } else {
                let fresh = nodes.iter().find(|node| !used.contains(*node));
                let node = match fresh {
                    Some(node) => {
                        used.insert(*node);
                        Some(*node)
                    }
                    None => {
                        debug!(
                            "All nodes of chunk {} already serve {}, reusing first node",
                            chunk_id, relation
                        );
                        nodes.first().copied()
                    }
                };
                if let Some(host) = node.and_then(|n| chunk_host(index, n, relation, chunk_id)) {
                    chunk.add_host(host);
                }
            }

            if chunk.is_empty() {
                return Err(CatalogError::EmptyChunk {
                    relation: relation.to_string(),
                    chunk: chunk_id.clone(),
                });
            }
            chunks.push(chunk);
        }

        Ok(chunks)
    }
}

fn chunk_host(
    index: &PartitionIndex,
    node: NodeId,
    relation: &str,
    partition: &str,
) -> Option<ChunkHost> {
    let descriptor = index.descriptor_for(node, relation, partition)?;
    let node = index.node(node);
    Some(ChunkHost::new(
        &node.location,
        &descriptor.url,
        &node.username,
        &node.password,
        &node.driver,
    ))
}
