//! Typed errors for catalog lookups and split planning.

use thiserror::Error;

/// Errors raised while resolving a relation into chunks and splits.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The relation was never declared by any node of the catalog.
    #[error("relation '{0}' is not defined in the catalog")]
    UnknownRelation(String),

    /// A chunk ended up with no host after registry construction.
    #[error("chunk '{chunk}' of relation '{relation}' has no host")]
    EmptyChunk { relation: String, chunk: String },

    /// Host selection was asked of a chunk that holds no host.
    #[error("chunk '{chunk}' has no host to select")]
    NoHosts { chunk: String },

    /// A host handle that does not belong to the chunk it was used with.
    #[error("host #{host} is not part of chunk '{chunk}'")]
    UnknownHost { chunk: String, host: usize },

    /// A split could not be decoded from its wire form.
    #[error("split codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        CatalogError::Codec(e.to_string())
    }
}
