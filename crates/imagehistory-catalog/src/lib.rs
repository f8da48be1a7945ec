//! Collaborator interface between the history graph and the image database.
//!
//! Provides the [`ImageCatalog`] trait the graph uses to resolve history ids
//! to stored images, plus [`InMemoryCatalog`] as a first-class backend for
//! tests, tools, and batch rescans that work from exported data.
//!
//! # Modules
//!
//! - [`error`]: CatalogError
//! - [`types`]: ImageRowId and relation pairs
//! - [`traits`]: ImageCatalog trait definition
//! - [`memory`]: InMemoryCatalog implementation

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::CatalogError;
pub use memory::InMemoryCatalog;
pub use traits::ImageCatalog;
pub use types::{ImageRowId, RowRelation};
