//! Catalog error types for imagehistory-catalog.

use thiserror::Error;

use crate::types::ImageRowId;

/// Errors produced by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No stored image has the given row id.
    #[error("image not found: row {0}")]
    ImageNotFound(ImageRowId),

    /// A relation would make an image derived from itself.
    #[error("invalid relation: {child} -> {parent}")]
    InvalidRelation {
        child: ImageRowId,
        parent: ImageRowId,
    },
}
