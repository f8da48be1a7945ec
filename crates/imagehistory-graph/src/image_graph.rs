//! ImageHistoryGraph: the history graph of stored images.
//!
//! [`ImageHistoryGraph`] wraps a [`HistoryGraph`] whose vertices are images
//! ([`HistoryVertex`]) and whose edges carry the editing actions that lead
//! from a parent image to a child ([`HistoryEdge`]). It ingests histories and
//! stored relations, merges vertices that denote the same image, and maps
//! graph queries back to catalog row ids.
//!
//! The catalog is passed to the operations that need it; the graph holds no
//! reference to it. Registered observers are notified synchronously after
//! every mutation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use imagehistory_catalog::{CatalogError, ImageCatalog, ImageRowId, RowRelation};
use imagehistory_core::{DImageHistory, FilterAction, HistoryImageId};

use crate::config::{GraphConfig, LoadFlags};
use crate::error::GraphError;
use crate::graph::{HistoryGraph, Vertex};
use crate::observer::{GraphEvent, GraphObserver};

/// One image in the graph.
///
/// A vertex collects every id found to denote the image, and the stored rows
/// holding it once they are known. A vertex without rows is unresolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryVertex {
    /// Uuid of the image, taken from the first id that carries one.
    pub uuid: String,
    pub referred_images: Vec<HistoryImageId>,
    pub rows: SmallVec<[ImageRowId; 2]>,
}

impl HistoryVertex {
    pub fn from_ids(ids: &[HistoryImageId]) -> Self {
        let mut vertex = HistoryVertex::default();
        vertex.merge_ids(ids.iter().cloned());
        vertex
    }

    pub fn from_row(row: ImageRowId) -> Self {
        HistoryVertex {
            rows: smallvec![row],
            ..Default::default()
        }
    }

    /// True if `id` denotes this image.
    pub fn matches_id(&self, id: &HistoryImageId) -> bool {
        if !self.uuid.is_empty() && self.uuid == id.uuid {
            return true;
        }
        self.referred_images.iter().any(|known| known.is_same_image(id))
    }

    /// Adds ids not known yet.
    pub fn merge_ids(&mut self, ids: impl IntoIterator<Item = HistoryImageId>) {
        for id in ids {
            if self.uuid.is_empty() && id.has_uuid() {
                self.uuid = id.uuid.clone();
            }
            if !self.referred_images.contains(&id) {
                self.referred_images.push(id);
            }
        }
    }

    /// Returns false if the row was already attached.
    pub fn add_row(&mut self, row: ImageRowId) -> bool {
        if self.rows.contains(&row) {
            return false;
        }
        self.rows.push(row);
        true
    }

    pub fn is_resolved(&self) -> bool {
        !self.rows.is_empty()
    }

    fn absorb(&mut self, other: HistoryVertex) {
        if self.uuid.is_empty() {
            self.uuid = other.uuid;
        }
        self.merge_ids(other.referred_images);
        for row in other.rows {
            self.add_row(row);
        }
    }
}

/// The actions that turned the parent image into the child.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEdge {
    pub actions: Vec<FilterAction>,
}

impl HistoryEdge {
    /// Keeps the current actions unless there are none.
    fn absorb(&mut self, other: HistoryEdge) {
        if self.actions.is_empty() {
            self.actions = other.actions;
        }
    }
}

/// Structural role of a stored image within its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    /// A root with derived images.
    Original,
    /// Neither root nor leaf.
    Intermediate,
    /// A leaf derived from another image.
    Current,
    /// No relation to any other image.
    Standalone,
}

/// The history graph of stored images.
#[derive(Clone, Default)]
pub struct ImageHistoryGraph {
    graph: HistoryGraph<HistoryVertex, HistoryEdge>,
    /// Vertex holding each attached row
    row_index: HashMap<ImageRowId, Vertex>,
    observers: Vec<Arc<dyn GraphObserver>>,
}

impl fmt::Debug for ImageHistoryGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageHistoryGraph")
            .field("graph", &self.graph)
            .field("row_index", &self.row_index)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ImageHistoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph around a stored image.
    ///
    /// `flags` selects what is loaded: the stored relations of the image's
    /// connected component, the image's own history, and the histories of
    /// the leaves reached through the relations. Rows are resolved against
    /// the catalog before returning.
    pub fn from_catalog<C>(catalog: &C, subject: ImageRowId, flags: LoadFlags) -> Result<Self, GraphError>
    where
        C: ImageCatalog + ?Sized,
    {
        if !catalog.contains(subject) {
            return Err(CatalogError::ImageNotFound(subject).into());
        }

        let mut graph = ImageHistoryGraph::new();
        if flags.relation_cloud {
            let cloud = catalog.relation_cloud(subject)?;
            graph.add_relations(&cloud);
        }

        let mut loaded = HashSet::new();
        if flags.subject_history {
            graph.load_stored_history(catalog, subject)?;
            loaded.insert(subject);
        }
        if flags.leaves_history {
            for row in graph.leaf_images() {
                if catalog.contains(row) && loaded.insert(row) {
                    graph.load_stored_history(catalog, row)?;
                }
            }
        }

        if graph.vertex_of_row(subject).is_none() {
            graph.vertex_for_row(subject);
        }
        graph.resolve_unresolved(catalog);

        tracing::debug!(
            subject = %subject,
            vertices = graph.graph.vertex_count(),
            edges = graph.graph.edge_count(),
            "loaded image history graph"
        );
        Ok(graph)
    }

    fn load_stored_history<C>(&mut self, catalog: &C, row: ImageRowId) -> Result<Vertex, GraphError>
    where
        C: ImageCatalog + ?Sized,
    {
        let history = catalog.history(row)?.unwrap_or_default();
        let id = catalog.image_id(row)?;
        Ok(self.ingest_for_row(&history, Some(&id), row))
    }

    // -----------------------------------------------------------------------
    // Observers
    // -----------------------------------------------------------------------

    pub fn subscribe(&mut self, observer: Arc<dyn GraphObserver>) {
        self.observers.push(observer);
    }

    fn notify(&self, event: GraphEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Adds a history to the graph.
    ///
    /// `subject`, if valid, is added to the last entry as the image the
    /// history belongs to. Each entry naming images becomes one vertex, merged
    /// with any existing vertex denoting the same image, and is linked to the
    /// previous such entry by an edge carrying the actions in between.
    /// Returns the vertex of the last entry naming an image.
    pub fn add_history(
        &mut self,
        history: &DImageHistory,
        subject: Option<&HistoryImageId>,
    ) -> Option<Vertex> {
        let history = with_subject(history, subject);
        let last = self.ingest(&history);
        self.notify(GraphEvent::HistoryAdded { subject: last });
        last
    }

    /// Adds the stored history of a freshly scanned image and attaches its
    /// row to the vertex of the history's last entry. An empty history
    /// still gives the row a vertex.
    pub fn add_scanned_history(&mut self, history: &DImageHistory, row: ImageRowId) -> Vertex {
        self.ingest_for_row(history, None, row)
    }

    fn ingest_for_row(
        &mut self,
        history: &DImageHistory,
        subject: Option<&HistoryImageId>,
        row: ImageRowId,
    ) -> Vertex {
        let history = with_subject(history, subject);
        let v = match self.ingest(&history) {
            Some(v) => v,
            None => self.vertex_for_row(row),
        };
        let v = self.attach_row(v, row);
        self.notify(GraphEvent::HistoryAdded { subject: Some(v) });
        v
    }

    fn ingest(&mut self, history: &DImageHistory) -> Option<Vertex> {
        let mut last: Option<Vertex> = None;
        let mut pending: Vec<FilterAction> = Vec::new();

        for entry in history.entries() {
            if let Some(action) = &entry.action {
                pending.push(action.clone());
            }
            if entry.referred_images.is_empty() {
                continue;
            }

            let v = self.vertex_for_ids(&entry.referred_images);
            // The previous vertex may just have been merged into v.
            let parent = last.filter(|&p| p != v && self.graph.contains_vertex(p));
            match parent {
                Some(parent) => self.connect(v, parent, std::mem::take(&mut pending)),
                None => pending.clear(),
            }
            last = Some(v);
        }
        last
    }

    /// Adds stored `(child, parent)` row relations. Returns the number of
    /// edges added.
    pub fn add_relations(&mut self, pairs: &[RowRelation]) -> usize {
        let mut index = std::mem::take(&mut self.row_index);
        let added = self
            .graph
            .add_relations(pairs.iter().copied(), &mut index, |&row| HistoryVertex::from_row(row));
        self.row_index = index;
        self.notify(GraphEvent::RelationsAdded { edges: added });
        added
    }

    /// Links `child` to `parent`. An existing edge keeps its actions unless
    /// it has none.
    fn connect(&mut self, child: Vertex, parent: Vertex, actions: Vec<FilterAction>) {
        match self.graph.edge(child, parent) {
            Some(e) => {
                if let Some(edge) = self.graph.edge_properties_mut(e) {
                    edge.absorb(HistoryEdge { actions });
                }
            }
            None => {
                self.graph.add_edge_with(child, parent, HistoryEdge { actions });
            }
        }
    }

    /// The vertex denoting the image named by `ids`. Existing vertices that
    /// match are merged into the earliest one.
    fn vertex_for_ids(&mut self, ids: &[HistoryImageId]) -> Vertex {
        let matches: Vec<Vertex> = self
            .graph
            .vertices()
            .into_iter()
            .filter(|&v| {
                self.graph
                    .properties(v)
                    .is_some_and(|props| ids.iter().any(|id| props.matches_id(id)))
            })
            .collect();

        match matches.split_first() {
            None => self.graph.add_vertex(HistoryVertex::from_ids(ids)),
            Some((&target, rest)) => {
                if let Some(props) = self.graph.properties_mut(target) {
                    props.merge_ids(ids.iter().cloned());
                }
                self.merge_vertices(target, rest);
                target
            }
        }
    }

    fn vertex_for_row(&mut self, row: ImageRowId) -> Vertex {
        if let Some(v) = self.vertex_of_row(row) {
            return v;
        }
        let v = self.graph.add_vertex(HistoryVertex::from_row(row));
        self.row_index.insert(row, v);
        v
    }

    /// Attaches `row` to `v`. If another vertex already holds the row, the
    /// two are merged and the surviving vertex is returned.
    fn attach_row(&mut self, v: Vertex, row: ImageRowId) -> Vertex {
        match self.vertex_of_row(row) {
            Some(holder) if holder != v => {
                let (target, source) = if self.graph.seq(holder) < self.graph.seq(v) {
                    (holder, v)
                } else {
                    (v, holder)
                };
                self.merge_vertices(target, &[source]);
                target
            }
            _ => {
                if let Some(props) = self.graph.properties_mut(v) {
                    props.add_row(row);
                }
                self.row_index.insert(row, v);
                v
            }
        }
    }

    fn merge_vertices(&mut self, target: Vertex, sources: &[Vertex]) {
        let merged = sources
            .iter()
            .filter(|&&source| {
                self.graph
                    .merge_into(target, source, HistoryVertex::absorb, HistoryEdge::absorb)
            })
            .count();
        if merged > 0 {
            self.rebuild_row_index();
            self.notify(GraphEvent::VerticesMerged { target, merged });
        }
    }

    fn rebuild_row_index(&mut self) {
        self.row_index.clear();
        for v in self.graph.vertices() {
            if let Some(props) = self.graph.properties(v) {
                for &row in &props.rows {
                    self.row_index.entry(row).or_insert(v);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Resolution and pruning
    // -----------------------------------------------------------------------

    /// Attaches stored rows to vertices whose ids the catalog now knows, and
    /// describes row-only vertices with the catalog's ids. Vertices that end
    /// up sharing a row are merged. Returns the number of rows attached.
    pub fn resolve_unresolved<C>(&mut self, catalog: &C) -> usize
    where
        C: ImageCatalog + ?Sized,
    {
        let mut attached = 0;
        for v in self.graph.vertices() {
            let Some(props) = self.graph.properties(v) else {
                continue;
            };
            let described: Vec<HistoryImageId> = if props.referred_images.is_empty() {
                props
                    .rows
                    .iter()
                    .filter_map(|&row| catalog.image_id(row).ok())
                    .collect()
            } else {
                Vec::new()
            };
            let found: Vec<ImageRowId> = props
                .referred_images
                .iter()
                .flat_map(|id| catalog.resolve(id))
                .collect();

            if let Some(props) = self.graph.properties_mut(v) {
                props.merge_ids(described);
                for row in found {
                    if props.add_row(row) {
                        attached += 1;
                    }
                }
            }
        }

        while let Some((target, source)) = self.first_shared_row() {
            self.merge_vertices(target, &[source]);
        }
        self.rebuild_row_index();

        self.notify(GraphEvent::Resolved { attached });
        attached
    }

    /// The first pair of vertices holding the same row, earlier one first.
    fn first_shared_row(&self) -> Option<(Vertex, Vertex)> {
        let mut owner: HashMap<ImageRowId, Vertex> = HashMap::new();
        for v in self.graph.vertices() {
            for &row in self.rows(v) {
                match owner.get(&row) {
                    Some(&first) if first != v => return Some((first, v)),
                    Some(_) => {}
                    None => {
                        owner.insert(row, v);
                    }
                }
            }
        }
        None
    }

    /// Detaches rows the catalog no longer holds. Returns the number of rows
    /// detached.
    pub fn prune_deleted<C>(&mut self, catalog: &C) -> usize
    where
        C: ImageCatalog + ?Sized,
    {
        let mut pruned = 0;
        for v in self.graph.vertices() {
            if let Some(props) = self.graph.properties_mut(v) {
                let before = props.rows.len();
                props.rows.retain(|row| catalog.contains(*row));
                pruned += before - props.rows.len();
            }
        }
        if pruned > 0 {
            self.rebuild_row_index();
        }
        self.notify(GraphEvent::RowsPruned { pruned });
        pruned
    }

    /// Removes every vertex without a stored row.
    ///
    /// The children of a removed vertex are linked to its parents, with the
    /// actions of both edges in application order, so ancestry is kept.
    /// Running it again changes nothing. Returns the number of vertices
    /// removed.
    pub fn drop_unresolved_entries(&mut self) -> usize {
        let unresolved: Vec<Vertex> = self
            .graph
            .vertices()
            .into_iter()
            .filter(|&v| self.graph.properties(v).is_some_and(|p| !p.is_resolved()))
            .collect();

        for &u in &unresolved {
            let parents = self.graph.parents(u);
            let children = self.graph.children(u);
            for &child in &children {
                let below = self.edge_actions(child, u);
                for &parent in &parents {
                    let mut actions = self.edge_actions(u, parent);
                    actions.extend(below.iter().cloned());
                    self.connect(child, parent, actions);
                }
            }
            self.graph.remove_vertex(u);
        }

        let dropped = unresolved.len();
        if dropped > 0 {
            tracing::debug!(dropped, "dropped unresolved history entries");
        }
        self.notify(GraphEvent::VerticesDropped { dropped });
        dropped
    }

    fn edge_actions(&self, child: Vertex, parent: Vertex) -> Vec<FilterAction> {
        self.graph
            .edge(child, parent)
            .and_then(|e| self.graph.edge_properties(e))
            .map(|edge| edge.actions.clone())
            .unwrap_or_default()
    }

    /// Removes redundant edges. Call after everything of interest has been
    /// ingested. Returns the number of edges removed.
    pub fn reduce_edges(&mut self) -> usize {
        let removed = self.graph.reduce_edges().len();
        self.notify(GraphEvent::EdgesReduced { removed });
        removed
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.row_index.clear();
        self.notify(GraphEvent::Cleared);
    }

    /// Resolves, prunes and reduces the graph as `config` says, then returns
    /// its vertices in display order: breadth-first from the roots of the
    /// subject's vertex.
    pub fn prepare_for_display<C>(
        &mut self,
        catalog: &C,
        subject: Option<ImageRowId>,
        config: &GraphConfig,
    ) -> Vec<Vertex>
    where
        C: ImageCatalog + ?Sized,
    {
        self.resolve_unresolved(catalog);
        self.prune_deleted(catalog);
        if config.drop_unresolved_on_display {
            self.drop_unresolved_entries();
        }
        if config.reduce_on_display {
            self.reduce_edges();
        }
        let reference = subject.and_then(|row| self.vertex_of_row(row));
        self.graph.vertices_breadth_first(reference)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn graph(&self) -> &HistoryGraph<HistoryVertex, HistoryEdge> {
        &self.graph
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn is_single_vertex(&self) -> bool {
        self.graph.vertex_count() == 1
    }

    pub fn has_edges(&self) -> bool {
        self.graph.has_edges()
    }

    pub fn has_unresolved_entries(&self) -> bool {
        self.graph
            .vertices()
            .into_iter()
            .any(|v| self.graph.properties(v).is_some_and(|p| !p.is_resolved()))
    }

    pub fn vertex_of_row(&self, row: ImageRowId) -> Option<Vertex> {
        self.row_index
            .get(&row)
            .copied()
            .filter(|&v| self.graph.contains_vertex(v))
    }

    /// Like [`vertex_of_row`](Self::vertex_of_row), for callers that need
    /// the row to be present.
    pub fn require_vertex_of_row(&self, row: ImageRowId) -> Result<Vertex, GraphError> {
        self.vertex_of_row(row).ok_or(GraphError::VertexNotFound(row))
    }

    /// Rows attached to a vertex.
    pub fn rows(&self, v: Vertex) -> &[ImageRowId] {
        self.graph
            .properties(v)
            .map(|p| p.rows.as_slice())
            .unwrap_or_default()
    }

    fn rows_of(&self, vertices: Vec<Vertex>) -> Vec<ImageRowId> {
        vertices
            .into_iter()
            .flat_map(|v| self.rows(v).iter().copied())
            .collect()
    }

    /// All attached rows, in vertex insertion order.
    pub fn all_images(&self) -> Vec<ImageRowId> {
        self.rows_of(self.graph.vertices())
    }

    pub fn root_images(&self) -> Vec<ImageRowId> {
        self.rows_of(self.graph.roots())
    }

    pub fn leaf_images(&self) -> Vec<ImageRowId> {
        self.rows_of(self.graph.leaves())
    }

    /// Maps vertex pairs to row pairs, skipping unresolved vertices.
    fn row_pairs(&self, pairs: Vec<(Vertex, Vertex)>) -> Vec<RowRelation> {
        let mut seen = HashSet::new();
        let mut relations = Vec::new();
        for (child, parent) in pairs {
            for &child_row in self.rows(child) {
                for &parent_row in self.rows(parent) {
                    if child_row != parent_row && seen.insert((child_row, parent_row)) {
                        relations.push((child_row, parent_row));
                    }
                }
            }
        }
        relations
    }

    /// Every `(descendant, ancestor)` pair of stored rows.
    pub fn relation_cloud(&self) -> Vec<RowRelation> {
        self.row_pairs(self.graph.relation_cloud())
    }

    /// The relation cloud as two parallel lists of descendants and
    /// ancestors.
    pub fn relation_cloud_parallel(&self) -> (Vec<ImageRowId>, Vec<ImageRowId>) {
        self.relation_cloud().into_iter().unzip()
    }

    /// The current edges as `(child, parent)` row pairs.
    pub fn image_relations(&self) -> Vec<RowRelation> {
        self.row_pairs(self.graph.edge_pairs())
    }

    /// The longest ancestry line through a stored image, root first, one row
    /// per image.
    pub fn history_of(&self, row: ImageRowId) -> Vec<ImageRowId> {
        let Some(v) = self.vertex_of_row(row) else {
            return Vec::new();
        };
        self.graph
            .longest_path_touching(v)
            .into_iter()
            .filter_map(|u| {
                if u == v {
                    Some(row)
                } else {
                    self.rows(u).first().copied()
                }
            })
            .collect()
    }

    /// Classifies every attached row by the position of its vertex.
    ///
    /// This only reports structure; recording the categories is up to the
    /// caller.
    pub fn categorize(&self) -> BTreeMap<ImageRowId, ImageCategory> {
        let mut categories = BTreeMap::new();
        for v in self.graph.vertices() {
            let root = self.graph.is_root(v);
            let leaf = self.graph.is_leaf(v);
            let category = match (root, leaf) {
                (true, true) => ImageCategory::Standalone,
                (true, false) => ImageCategory::Original,
                (false, true) => ImageCategory::Current,
                (false, false) => ImageCategory::Intermediate,
            };
            for &row in self.rows(v) {
                categories.insert(row, category);
            }
        }
        categories
    }
}

/// `history` with `subject` added to its last entry, if given and valid.
fn with_subject(history: &DImageHistory, subject: Option<&HistoryImageId>) -> DImageHistory {
    let mut history = history.clone();
    if let Some(subject) = subject {
        if subject.is_valid() {
            history.append_id(subject.clone());
        } else {
            tracing::debug!(%subject, "ignoring invalid history subject");
        }
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::RecordingObserver;
    use imagehistory_catalog::InMemoryCatalog;
    use imagehistory_core::{FilterCategory, ImageType};

    fn id(uuid: &str) -> HistoryImageId {
        HistoryImageId::new(uuid, ImageType::Intermediate)
    }

    fn action(name: &str) -> FilterAction {
        FilterAction::new(name, 1, FilterCategory::Reproducible)
    }

    /// `[ids[0]] a1 [ids[1]] a2 [ids[2]] ...`
    fn linear_history(uuids: &[&str]) -> DImageHistory {
        let mut h = DImageHistory::new();
        for (i, uuid) in uuids.iter().enumerate() {
            if i > 0 {
                h.append_action(action(&format!("step{i}")));
            }
            h.append_id(id(uuid));
        }
        h
    }

    fn vertex_with_uuid(g: &ImageHistoryGraph, uuid: &str) -> Vertex {
        g.graph().find_vertex(|p| p.uuid == uuid).unwrap()
    }

    #[test]
    fn entries_become_vertices_and_edges() {
        let mut g = ImageHistoryGraph::new();
        let last = g.add_history(&linear_history(&["o", "i", "c"]), None);

        assert_eq!(g.graph().vertex_count(), 3);
        assert_eq!(g.graph().edge_count(), 2);
        let c = vertex_with_uuid(&g, "c");
        let i = vertex_with_uuid(&g, "i");
        assert_eq!(last, Some(c));
        assert_eq!(g.graph().parents(c), vec![i]);

        let e = g.graph().edge(c, i).unwrap();
        let actions = &g.graph().edge_properties(e).unwrap().actions;
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].identifier, "step2");
    }

    #[test]
    fn entries_without_ids_accumulate_actions() {
        let mut h = DImageHistory::new();
        h.append_id(id("o"))
            .append_action(action("a"))
            .append_action(action("b"))
            .append_id(id("c"));

        let mut g = ImageHistoryGraph::new();
        g.add_history(&h, None);
        let e = g
            .graph()
            .edge(vertex_with_uuid(&g, "c"), vertex_with_uuid(&g, "o"))
            .unwrap();
        let names: Vec<&str> = g.graph().edge_properties(e).unwrap().actions.iter()
            .map(|a| a.identifier.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn subject_joins_last_entry() {
        let mut g = ImageHistoryGraph::new();
        let subject = HistoryImageId::new("current-file", ImageType::Current);
        let v = g.add_history(&linear_history(&["o", "i"]), Some(&subject)).unwrap();

        assert_eq!(g.graph().vertex_count(), 2);
        let props = g.graph().properties(v).unwrap();
        assert!(props.matches_id(&subject));
        assert!(props.matches_id(&id("i")));
    }

    #[test]
    fn shared_ancestry_merges() {
        let mut g = ImageHistoryGraph::new();
        g.add_history(&linear_history(&["o", "a1", "a2"]), None);
        g.add_history(&linear_history(&["o", "b1"]), None);

        assert_eq!(g.graph().vertex_count(), 4);
        assert_eq!(g.graph().roots(), vec![vertex_with_uuid(&g, "o")]);
        assert_eq!(g.graph().leaves().len(), 2);
    }

    #[test]
    fn hash_identity_merges_without_uuid() {
        let mut original = HistoryImageId::from_path("/a/x.jpg", ImageType::Original);
        original.set_unique_hash("h", 10);
        let mut moved = HistoryImageId::from_path("/b/y.jpg", ImageType::Original);
        moved.set_unique_hash("h", 10);

        let mut first = DImageHistory::new();
        first.append_id(original).append_action(action("a")).append_id(id("c1"));
        let mut second = DImageHistory::new();
        second.append_id(moved).append_action(action("b")).append_id(id("c2"));

        let mut g = ImageHistoryGraph::new();
        g.add_history(&first, None);
        g.add_history(&second, None);
        assert_eq!(g.graph().vertex_count(), 3);
        assert_eq!(g.graph().roots().len(), 1);
        let root = g.graph().roots()[0];
        assert_eq!(g.graph().properties(root).unwrap().referred_images.len(), 2);
    }

    #[test]
    fn shared_edge_keeps_first_actions() {
        let mut g = ImageHistoryGraph::new();
        g.add_history(&linear_history(&["o", "c"]), None);
        let mut other = DImageHistory::new();
        other.append_id(id("o")).append_action(action("other")).append_id(id("c"));
        g.add_history(&other, None);

        assert_eq!(g.graph().edge_count(), 1);
        let e = g.graph().edges()[0];
        assert_eq!(g.graph().edge_properties(e).unwrap().actions[0].identifier, "step1");
    }

    #[test]
    fn relations_map_to_rows() {
        let mut g = ImageHistoryGraph::new();
        let (r1, r2, r3) = (ImageRowId(1), ImageRowId(2), ImageRowId(3));
        assert_eq!(g.add_relations(&[(r2, r1), (r3, r2), (r3, r1)]), 3);

        assert_eq!(g.relation_cloud(), vec![(r2, r1), (r3, r2), (r3, r1)]);
        assert_eq!(g.reduce_edges(), 1);
        assert_eq!(g.image_relations(), vec![(r2, r1), (r3, r2)]);
        assert_eq!(g.relation_cloud().len(), 3);

        let (descendants, ancestors) = g.relation_cloud_parallel();
        assert_eq!(descendants, vec![r2, r3, r3]);
        assert_eq!(ancestors, vec![r1, r2, r1]);

        assert_eq!(g.root_images(), vec![r1]);
        assert_eq!(g.leaf_images(), vec![r3]);
        assert_eq!(g.history_of(r2), vec![r1, r2, r3]);
    }

    #[test]
    fn categorize_by_position() {
        let mut g = ImageHistoryGraph::new();
        let rows: Vec<ImageRowId> = (1..=4).map(ImageRowId).collect();
        g.add_relations(&[(rows[1], rows[0]), (rows[2], rows[1])]);
        g.add_scanned_history(&DImageHistory::new(), rows[3]);

        let categories = g.categorize();
        assert_eq!(categories[&rows[0]], ImageCategory::Original);
        assert_eq!(categories[&rows[1]], ImageCategory::Intermediate);
        assert_eq!(categories[&rows[2]], ImageCategory::Current);
        assert_eq!(categories[&rows[3]], ImageCategory::Standalone);
    }

    #[test]
    fn drop_unresolved_bridges_parents_and_children() {
        let mut g = ImageHistoryGraph::new();
        g.add_history(&linear_history(&["o", "gone", "c"]), None);
        let o = vertex_with_uuid(&g, "o");
        let c = vertex_with_uuid(&g, "c");
        g.graph.properties_mut(o).unwrap().add_row(ImageRowId(1));
        g.graph.properties_mut(c).unwrap().add_row(ImageRowId(3));
        g.rebuild_row_index();

        assert!(g.has_unresolved_entries());
        assert_eq!(g.drop_unresolved_entries(), 1);
        assert!(!g.has_unresolved_entries());
        assert_eq!(g.image_relations(), vec![(ImageRowId(3), ImageRowId(1))]);

        let e = g.graph().edge(c, o).unwrap();
        let names: Vec<&str> = g.graph().edge_properties(e).unwrap().actions.iter()
            .map(|a| a.identifier.as_str())
            .collect();
        assert_eq!(names, vec!["step1", "step2"]);

        assert_eq!(g.drop_unresolved_entries(), 0);
        assert_eq!(g.graph().vertex_count(), 2);
    }

    #[test]
    fn handles_of_dropped_vertices_stay_unknown() {
        let mut g = ImageHistoryGraph::new();
        let c = g.add_history(&linear_history(&["o", "c"]), None).unwrap();
        assert_eq!(g.drop_unresolved_entries(), 2);

        let other = g.add_history(&linear_history(&["other"]), None).unwrap();
        assert_ne!(c, other);
        assert!(!g.graph().contains_vertex(c));
        assert!(g.graph().properties(c).is_none());
        assert!(g.rows(c).is_empty());
        assert_eq!(g.graph().properties(other).unwrap().uuid, "other");
    }

    #[test]
    fn resolve_attaches_rows_and_merges() {
        let mut catalog = InMemoryCatalog::new();
        let o = catalog.insert_image(HistoryImageId::new("o", ImageType::Original), None);
        let c = catalog.insert_image(HistoryImageId::new("c", ImageType::Current), None);
        catalog.add_relation(c, o).unwrap();

        let mut g = ImageHistoryGraph::new();
        g.add_relations(&[(c, o)]);
        g.add_history(&linear_history(&["o", "c"]), None);
        assert_eq!(g.graph().vertex_count(), 4);

        let attached = g.resolve_unresolved(&catalog);
        assert_eq!(attached, 2);
        assert_eq!(g.graph().vertex_count(), 2);
        assert_eq!(g.graph().edge_count(), 1);
        assert!(!g.has_unresolved_entries());
        assert_eq!(g.relation_cloud(), vec![(c, o)]);
    }

    #[test]
    fn prune_deleted_then_drop() {
        let mut catalog = InMemoryCatalog::new();
        let rows: Vec<ImageRowId> = ["a", "b", "c"]
            .iter()
            .map(|u| catalog.insert_image(id(u), None))
            .collect();
        catalog.add_relation(rows[1], rows[0]).unwrap();
        catalog.add_relation(rows[2], rows[1]).unwrap();

        let mut g = ImageHistoryGraph::from_catalog(&catalog, rows[2], LoadFlags::ALL).unwrap();
        assert_eq!(g.graph().vertex_count(), 3);

        catalog.remove_image(rows[1]).unwrap();
        let order = g.prepare_for_display(&catalog, Some(rows[2]), &GraphConfig::default());
        assert_eq!(order.len(), 2);
        assert_eq!(g.image_relations(), vec![(rows[2], rows[0])]);
        assert_eq!(g.vertex_of_row(rows[1]), None);
    }

    #[test]
    fn from_catalog_loads_histories() {
        let mut catalog = InMemoryCatalog::new();
        let original = HistoryImageId::new("orig", ImageType::Original);
        let o = catalog.insert_image(original.clone(), None);

        let mut stored = DImageHistory::new();
        stored.append_id(original).append_action(action("crop"));
        let c = catalog.insert_image(HistoryImageId::new("cur", ImageType::Current), Some(stored));

        let g = ImageHistoryGraph::from_catalog(&catalog, c, LoadFlags::ALL).unwrap();
        assert_eq!(g.graph().vertex_count(), 2);
        assert_eq!(g.relation_cloud(), vec![(c, o)]);
        assert_eq!(g.history_of(c), vec![o, c]);

        let only_relations = ImageHistoryGraph::from_catalog(&catalog, c, LoadFlags::NONE).unwrap();
        assert!(only_relations.is_single_vertex());
        assert!(only_relations.require_vertex_of_row(c).is_ok());
        assert!(matches!(
            only_relations.require_vertex_of_row(o),
            Err(GraphError::VertexNotFound(row)) if row == o
        ));

        assert!(matches!(
            ImageHistoryGraph::from_catalog(&catalog, ImageRowId(99), LoadFlags::ALL),
            Err(GraphError::Catalog(CatalogError::ImageNotFound(_)))
        ));
    }

    #[test]
    fn observers_see_every_mutation() {
        let observer = Arc::new(RecordingObserver::default());
        let mut g = ImageHistoryGraph::new();
        g.subscribe(observer.clone());

        let v = g.add_history(&linear_history(&["o", "c"]), None);
        g.add_relations(&[(ImageRowId(2), ImageRowId(1))]);
        g.reduce_edges();
        g.drop_unresolved_entries();
        g.clear();

        assert_eq!(
            observer.events(),
            vec![
                GraphEvent::HistoryAdded { subject: v },
                GraphEvent::RelationsAdded { edges: 1 },
                GraphEvent::EdgesReduced { removed: 0 },
                GraphEvent::VerticesDropped { dropped: 2 },
                GraphEvent::Cleared,
            ]
        );
    }
}
