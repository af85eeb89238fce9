//! shardscan core - planning side of a federated relation scan
//!
//! A relation is partitioned (and possibly replicated) across independent
//! database nodes. This crate turns the catalog describing that layout into
//! one [`Split`] per partition:
//! - [`PartitionIndex`]: relation -> partition -> nodes, and per-node descriptors
//! - [`ChunkRegistry`]: partitions as [`Chunk`]s with host selection policy
//! - [`SplitPlanner`]: the serializable unit of work per chunk

pub mod catalog;
pub mod chunk;
pub mod error;
pub mod index;
pub mod registry;
pub mod split;
pub mod wire;

pub use catalog::{Catalog, CatalogDescription, NodeDecl, PartitionDecl, RelationDecl};
pub use chunk::{redact_url, Chunk, ChunkHost, HostId, HostPicker, RandomPicker};
pub use error::CatalogError;
pub use index::{Node, NodeId, PartitionIndex};
pub use registry::ChunkRegistry;
pub use split::{Split, SplitPlanner};
pub use wire::{decode_split, encode_split};
