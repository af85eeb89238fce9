//! Partition Index: the two lookups every planning call is answered from.
//!
//! - relation -> partition id -> nodes holding it (replicas), in catalog order
//! - node x relation x partition id -> that node's partition descriptor
//!
//! Both maps come out of a single pass over the catalog description.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::catalog::{normalize_id, CatalogDescription, PartitionDecl};
use crate::error::CatalogError;

/// Position of a node in the catalog description. Two declarations with the
/// same address are still two different nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Connection attributes of a node.
#[derive(Clone)]
pub struct Node {
    pub location: String,
    pub username: String,
    pub password: String,
    pub driver: String,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("location", &self.location)
            .field("username", &self.username)
            .field("driver", &self.driver)
            .finish_non_exhaustive()
    }
}

/// Partition id -> nodes holding it, in order of first declaration.
pub type PartitionNodes = IndexMap<String, Vec<NodeId>>;

type DescriptorKey = (NodeId, String, String);

#[derive(Debug, Default)]
pub struct PartitionIndex {
    nodes: Vec<Node>,
    relation_partitions: HashMap<String, PartitionNodes>,
    descriptors: HashMap<DescriptorKey, PartitionDecl>,
}

impl PartitionIndex {
    /// Build both lookups in one pass over every node declaration.
    pub fn build(description: &CatalogDescription) -> Self {
        let mut index = PartitionIndex::default();

        for (pos, decl) in description.nodes.iter().enumerate() {
            let node_id = NodeId(pos);
            index.nodes.push(Node {
                location: decl.location.clone(),
                username: decl.username.clone(),
                password: decl.password.clone(),
                driver: decl.driver.clone(),
            });

            for relation in &decl.relations {
                let relation_key = normalize_id(&relation.id);
                let partitions = index
                    .relation_partitions
                    .entry(relation_key.clone())
                    .or_default();

                for partition in &relation.partitions {
                    let partition_key = normalize_id(&partition.id);
                    let holders = partitions.entry(partition_key.clone()).or_default();
                    if !holders.contains(&node_id) {
                        holders.push(node_id);
                    }
                    index
                        .descriptors
                        .insert((node_id, relation_key.clone(), partition_key), partition.clone());
                }
            }
        }

        index
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relation_partitions.len()
    }

    /// Partition id -> holding nodes for `relation`.
    pub fn relation_partitions(&self, relation: &str) -> Result<&PartitionNodes, CatalogError> {
        self.relation_partitions
            .get(&normalize_id(relation))
            .ok_or_else(|| CatalogError::UnknownRelation(relation.to_string()))
    }

    /// The descriptor `node` declared for `(relation, partition)`, if any.
    pub fn descriptor_for(
        &self,
        node: NodeId,
        relation: &str,
        partition: &str,
    ) -> Option<&PartitionDecl> {
        self.descriptors
            .get(&(node, normalize_id(relation), normalize_id(partition)))
    }

    /// Every node that holds at least one partition of `relation`, each once.
    pub fn nodes_for_relation(&self, relation: &str) -> Result<Vec<NodeId>, CatalogError> {
        let partitions = self.relation_partitions(relation)?;
        let mut nodes: Vec<NodeId> = Vec::new();
        for holders in partitions.values() {
            for node in holders {
                if !nodes.contains(node) {
                    nodes.push(*node);
                }
            }
        }
        Ok(nodes)
    }

    /// Nodes holding one partition of `relation`; empty if the partition is unknown.
    pub fn nodes_for_partition(
        &self,
        relation: &str,
        partition: &str,
    ) -> Result<&[NodeId], CatalogError> {
        let partitions = self.relation_partitions(relation)?;
        Ok(partitions
            .get(&normalize_id(partition))
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }
}
