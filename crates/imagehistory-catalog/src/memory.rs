//! In-memory implementation of [`ImageCatalog`].
//!
//! [`InMemoryCatalog`] is a first-class backend for tests, command line tools
//! and batch rescans working from exported data. It keeps stored images in a
//! `BTreeMap` so every listing is in ascending row order, and can be saved to
//! and loaded from a JSON snapshot.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use imagehistory_core::{DImageHistory, HistoryImageId};

use crate::error::CatalogError;
use crate::traits::ImageCatalog;
use crate::types::{ImageRowId, RowRelation};

/// Data stored for a single image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredImage {
    row: ImageRowId,
    id: HistoryImageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    history: Option<DImageHistory>,
}

/// Serialized form of a catalog.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogSnapshot {
    #[serde(default)]
    images: Vec<StoredImage>,
    #[serde(default)]
    relations: Vec<RowRelation>,
}

/// A catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    images: BTreeMap<ImageRowId, StoredImage>,
    /// Derived-from relations `(child, parent)` in insertion order
    relations: Vec<RowRelation>,
    next_row: i64,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        InMemoryCatalog {
            images: BTreeMap::new(),
            relations: Vec::new(),
            next_row: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// All stored rows in ascending order.
    pub fn rows(&self) -> Vec<ImageRowId> {
        self.images.keys().copied().collect()
    }

    pub fn relations(&self) -> &[RowRelation] {
        &self.relations
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Stores an image under a newly allocated row.
    pub fn insert_image(
        &mut self,
        id: HistoryImageId,
        history: Option<DImageHistory>,
    ) -> ImageRowId {
        let row = ImageRowId(self.next_row.max(1));
        self.insert_image_at(row, id, history);
        row
    }

    /// Stores an image under a caller-chosen row, replacing any previous one.
    pub fn insert_image_at(
        &mut self,
        row: ImageRowId,
        id: HistoryImageId,
        history: Option<DImageHistory>,
    ) {
        self.next_row = self.next_row.max(row.0 + 1);
        self.images.insert(row, StoredImage { row, id, history });
    }

    /// Removes a stored image.
    ///
    /// Relations are left in place, as a database keeps them for trashed
    /// images; [`contains`](ImageCatalog::contains) reports the row as gone.
    pub fn remove_image(&mut self, row: ImageRowId) -> Result<(), CatalogError> {
        self.images
            .remove(&row)
            .map(|_| ())
            .ok_or(CatalogError::ImageNotFound(row))
    }

    pub fn set_history(
        &mut self,
        row: ImageRowId,
        history: DImageHistory,
    ) -> Result<(), CatalogError> {
        let image = self
            .images
            .get_mut(&row)
            .ok_or(CatalogError::ImageNotFound(row))?;
        image.history = Some(history);
        Ok(())
    }

    /// Records that `child` is derived from `parent`. Duplicates are ignored.
    pub fn add_relation(
        &mut self,
        child: ImageRowId,
        parent: ImageRowId,
    ) -> Result<(), CatalogError> {
        if child == parent {
            return Err(CatalogError::InvalidRelation { child, parent });
        }
        if !self.relations.contains(&(child, parent)) {
            self.relations.push((child, parent));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Loads a catalog from its JSON snapshot.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let snapshot: CatalogSnapshot = serde_json::from_str(text)?;
        let mut catalog = InMemoryCatalog::new();
        for image in snapshot.images {
            catalog.insert_image_at(image.row, image.id, image.history);
        }
        for (child, parent) in snapshot.relations {
            if let Err(err) = catalog.add_relation(child, parent) {
                tracing::warn!("skipping relation in snapshot: {err}");
            }
        }
        Ok(catalog)
    }

    /// Saves the catalog as a JSON snapshot.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let snapshot = CatalogSnapshot {
            images: self.images.values().cloned().collect(),
            relations: self.relations.clone(),
        };
        serde_json::to_string_pretty(&snapshot)
    }
}

impl ImageCatalog for InMemoryCatalog {
    fn resolve(&self, id: &HistoryImageId) -> Vec<ImageRowId> {
        self.images
            .values()
            .filter(|image| image.id.is_same_image(id))
            .map(|image| image.row)
            .collect()
    }

    fn image_id(&self, row: ImageRowId) -> Result<HistoryImageId, CatalogError> {
        self.images
            .get(&row)
            .map(|image| image.id.clone())
            .ok_or(CatalogError::ImageNotFound(row))
    }

    fn contains(&self, row: ImageRowId) -> bool {
        self.images.contains_key(&row)
    }

    fn history(&self, row: ImageRowId) -> Result<Option<DImageHistory>, CatalogError> {
        self.images
            .get(&row)
            .map(|image| image.history.clone())
            .ok_or(CatalogError::ImageNotFound(row))
    }

    fn relation_cloud(&self, row: ImageRowId) -> Result<Vec<RowRelation>, CatalogError> {
        if !self.contains(row) {
            return Err(CatalogError::ImageNotFound(row));
        }

        // Walk the relations as an undirected graph to find the component.
        let mut component = HashSet::from([row]);
        let mut queue = VecDeque::from([row]);
        while let Some(current) = queue.pop_front() {
            for &(child, parent) in &self.relations {
                let neighbor = if child == current {
                    parent
                } else if parent == current {
                    child
                } else {
                    continue;
                };
                if component.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }

        Ok(self
            .relations
            .iter()
            .filter(|(child, _)| component.contains(child))
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imagehistory_core::{FilterAction, FilterCategory, ImageType};

    fn image(uuid: &str) -> HistoryImageId {
        HistoryImageId::new(uuid, ImageType::Current)
    }

    #[test]
    fn insert_allocates_ascending_rows() {
        let mut catalog = InMemoryCatalog::new();
        let a = catalog.insert_image(image("a"), None);
        let b = catalog.insert_image(image("b"), None);
        assert_eq!(a, ImageRowId(1));
        assert_eq!(b, ImageRowId(2));

        catalog.insert_image_at(ImageRowId(10), image("c"), None);
        assert_eq!(catalog.insert_image(image("d"), None), ImageRowId(11));
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn resolve_uses_identity_rules() {
        let mut catalog = InMemoryCatalog::new();
        let row = catalog.insert_image(image("a"), None);
        catalog.insert_image(image("b"), None);

        assert_eq!(catalog.resolve(&image("a")), vec![row]);
        assert!(catalog.resolve(&image("zzz")).is_empty());
    }

    #[test]
    fn duplicates_resolve_to_all_rows() {
        let mut catalog = InMemoryCatalog::new();
        let mut a = HistoryImageId::from_path("/x/a.jpg", ImageType::Original);
        a.set_unique_hash("h", 100);
        let mut copy = HistoryImageId::from_path("/y/a.jpg", ImageType::Original);
        copy.set_unique_hash("h", 100);
        let r1 = catalog.insert_image(a.clone(), None);
        let r2 = catalog.insert_image(copy, None);

        assert_eq!(catalog.resolve(&a), vec![r1, r2]);
    }

    #[test]
    fn removed_image_is_gone_but_relations_remain() {
        let mut catalog = InMemoryCatalog::new();
        let a = catalog.insert_image(image("a"), None);
        let b = catalog.insert_image(image("b"), None);
        catalog.add_relation(b, a).unwrap();

        catalog.remove_image(a).unwrap();
        assert!(!catalog.contains(a));
        assert!(catalog.image_id(a).is_err());
        assert_eq!(catalog.relation_cloud(b).unwrap(), vec![(b, a)]);
        assert!(matches!(
            catalog.remove_image(a),
            Err(CatalogError::ImageNotFound(_))
        ));
    }

    #[test]
    fn self_relation_is_rejected() {
        let mut catalog = InMemoryCatalog::new();
        let a = catalog.insert_image(image("a"), None);
        assert!(matches!(
            catalog.add_relation(a, a),
            Err(CatalogError::InvalidRelation { .. })
        ));
    }

    #[test]
    fn relation_cloud_returns_connected_component() {
        let mut catalog = InMemoryCatalog::new();
        let rows: Vec<ImageRowId> = ["1", "2", "3", "4", "5"]
            .iter()
            .map(|u| catalog.insert_image(image(u), None))
            .collect();
        // 2 -> 1, 3 -> 2, 3 -> 1 (duplicate ignored later), 5 -> 4 separate
        catalog.add_relation(rows[1], rows[0]).unwrap();
        catalog.add_relation(rows[2], rows[1]).unwrap();
        catalog.add_relation(rows[2], rows[0]).unwrap();
        catalog.add_relation(rows[2], rows[0]).unwrap();
        catalog.add_relation(rows[4], rows[3]).unwrap();

        let cloud = catalog.relation_cloud(rows[0]).unwrap();
        assert_eq!(
            cloud,
            vec![(rows[1], rows[0]), (rows[2], rows[1]), (rows[2], rows[0])]
        );
        assert_eq!(catalog.relation_cloud(rows[3]).unwrap(), vec![(rows[4], rows[3])]);
        assert!(catalog.relation_cloud(ImageRowId(99)).is_err());
    }

    #[test]
    fn history_storage() {
        let mut catalog = InMemoryCatalog::new();
        let row = catalog.insert_image(image("a"), None);
        assert_eq!(catalog.history(row).unwrap(), None);

        let mut h = DImageHistory::new();
        h.append_id(HistoryImageId::new("o", ImageType::Original))
            .append_action(FilterAction::new("f", 1, FilterCategory::Reproducible))
            .append_id(image("a"));
        catalog.set_history(row, h.clone()).unwrap();
        assert_eq!(catalog.history(row).unwrap(), Some(h));
        assert!(catalog.set_history(ImageRowId(42), DImageHistory::new()).is_err());
    }

    #[test]
    fn snapshot_round_trip() {
        let mut catalog = InMemoryCatalog::new();
        let a = catalog.insert_image(image("a"), None);
        let mut h = DImageHistory::new();
        h.append_id(image("b"));
        let b = catalog.insert_image(image("b"), Some(h));
        catalog.add_relation(b, a).unwrap();

        let json = catalog.to_json().unwrap();
        let back = InMemoryCatalog::from_json(&json).unwrap();
        assert_eq!(back.rows(), vec![a, b]);
        assert_eq!(back.relations(), &[(b, a)]);
        assert_eq!(back.history(b).unwrap(), catalog.history(b).unwrap());
        assert_eq!(back.to_json().unwrap(), json);
    }
}
