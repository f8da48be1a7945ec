//! The [`ImageCatalog`] trait: what the history graph needs from the image
//! database.
//!
//! The graph never reaches for global state. Every operation that needs to
//! know about stored images takes a catalog as an explicit parameter.
//!
//! The trait is synchronous. Implementations materialize whatever they need
//! before answering; the graph performs no I/O of its own.

use imagehistory_core::{DImageHistory, HistoryImageId};

use crate::error::CatalogError;
use crate::types::{ImageRowId, RowRelation};

/// Read access to stored images, their histories and relations.
pub trait ImageCatalog {
    /// Returns the stored rows holding the image identified by `id`, in
    /// ascending row order. Empty if the image is not (or no longer) stored.
    fn resolve(&self, id: &HistoryImageId) -> Vec<ImageRowId>;

    /// Describes a stored row as a history id (uuid, location, fingerprint).
    fn image_id(&self, row: ImageRowId) -> Result<HistoryImageId, CatalogError>;

    /// Returns true if the row still exists.
    fn contains(&self, row: ImageRowId) -> bool;

    /// Loads the stored history of a row. `Ok(None)` if the image has none.
    fn history(&self, row: ImageRowId) -> Result<Option<DImageHistory>, CatalogError>;

    /// Returns every derived-from relation `(child, parent)` in the connected
    /// component of `row`, in insertion order.
    fn relation_cloud(&self, row: ImageRowId) -> Result<Vec<RowRelation>, CatalogError>;
}
