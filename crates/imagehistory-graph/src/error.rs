//! Error types for imagehistory-graph.

use thiserror::Error;

use imagehistory_catalog::{CatalogError, ImageRowId};

/// Errors produced by fallible graph operations.
///
/// Graph queries never fail; they return empty results instead. Errors come
/// from loading a graph out of a catalog and from reading settings.
#[derive(Debug, Error)]
pub enum GraphError {
    /// No vertex holds the given stored image.
    #[error("no vertex for image row {0}")]
    VertexNotFound(ImageRowId),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
