//! Catalog-layer types for stored image identity.
//!
//! [`ImageRowId`] is defined here (not in imagehistory-core) because a row id
//! is a storage concern: images only gain one once the catalog knows them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a stored image record.
///
/// The inner `i64` aligns with an SQL `INTEGER PRIMARY KEY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRowId(pub i64);

impl fmt::Display for ImageRowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A derived-from relation between two stored images: `(child, parent)`.
pub type RowRelation = (ImageRowId, ImageRowId);
