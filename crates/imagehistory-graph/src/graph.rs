//! HistoryGraph: a generic derived-from graph with insertion-ordered queries.
//!
//! [`HistoryGraph`] stores vertices carrying a property value `V` and edges
//! carrying a property value `E` in a petgraph `StableGraph`. Vertex and edge
//! handles stay valid across removals of other elements.
//!
//! # Direction
//!
//! An edge points from a child to the parent it was derived from. Roots are
//! the oldest ancestors (no outgoing edge); leaves are the most derived
//! images (no incoming edge). Paths are always returned root first.
//!
//! # Ordering
//!
//! `StableGraph` reuses freed indices, so index order says nothing about age.
//! Every vertex and edge records an insertion sequence number instead, and
//! every enumeration and every tie-break in this crate is by that number.
//!
//! A [`Vertex`] handle carries the sequence number of the vertex it was
//! issued for. Once that vertex is removed the handle stays unknown, even
//! after its index is reused.
//!
//! # Acyclicity
//!
//! Edge insertion rejects self-loops and edges that would close a cycle, so
//! the graph is a DAG at all times.

use std::collections::HashMap;
use std::hash::Hash;

use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

/// Handle of a vertex in a [`HistoryGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vertex {
    index: NodeIndex<u32>,
    seq: u64,
}

impl Vertex {
    /// Raw index of the vertex. Indices of removed vertices are reused.
    pub fn index(self) -> usize {
        self.index.index()
    }
}

/// Handle of an edge in a [`HistoryGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge(pub(crate) EdgeIndex<u32>);

/// A stored element with its insertion sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Slot<T> {
    pub(crate) props: T,
    pub(crate) seq: u64,
}

/// A directed acyclic graph of derived-from relations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryGraph<V, E> {
    graph: StableGraph<Slot<V>, Slot<E>, Directed, u32>,
    /// Next insertion sequence number, shared by vertices and edges
    next_seq: u64,
}

impl<V, E> Default for HistoryGraph<V, E> {
    fn default() -> Self {
        HistoryGraph {
            graph: StableGraph::default(),
            next_seq: 0,
        }
    }
}

impl<V, E> HistoryGraph<V, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    // -----------------------------------------------------------------------
    // Vertices
    // -----------------------------------------------------------------------

    pub fn add_vertex(&mut self, props: V) -> Vertex {
        let seq = self.take_seq();
        let index = self.graph.add_node(Slot { props, seq });
        Vertex { index, seq }
    }

    /// Removes a vertex together with all its edges.
    pub fn remove_vertex(&mut self, v: Vertex) -> Option<V> {
        if !self.contains_vertex(v) {
            return None;
        }
        self.graph.remove_node(v.index).map(|slot| slot.props)
    }

    /// True if `v` names a vertex of this graph. Handles of removed vertices
    /// are unknown, whether or not their index was reused.
    pub fn contains_vertex(&self, v: Vertex) -> bool {
        self.slot(v).is_some()
    }

    /// Insertion sequence number of a vertex.
    pub fn seq(&self, v: Vertex) -> Option<u64> {
        self.slot(v).map(|slot| slot.seq)
    }

    pub fn properties(&self, v: Vertex) -> Option<&V> {
        self.slot(v).map(|slot| &slot.props)
    }

    pub fn properties_mut(&mut self, v: Vertex) -> Option<&mut V> {
        match self.graph.node_weight_mut(v.index) {
            Some(slot) if slot.seq == v.seq => Some(&mut slot.props),
            _ => None,
        }
    }

    fn slot(&self, v: Vertex) -> Option<&Slot<V>> {
        match self.graph.node_weight(v.index) {
            Some(slot) if slot.seq == v.seq => Some(slot),
            Some(_) => {
                tracing::debug!(vertex = v.index(), seq = v.seq, "stale vertex handle");
                None
            }
            None => None,
        }
    }

    /// The handle of the vertex currently stored at `index`.
    fn vertex_at(&self, index: NodeIndex<u32>) -> Option<Vertex> {
        self.graph
            .node_weight(index)
            .map(|slot| Vertex { index, seq: slot.seq })
    }

    /// Returns the earliest inserted vertex whose properties match.
    pub fn find_vertex(&self, mut predicate: impl FnMut(&V) -> bool) -> Option<Vertex> {
        self.vertices()
            .into_iter()
            .find(|&v| self.properties(v).is_some_and(&mut predicate))
    }

    /// All vertices in insertion order.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.sorted(
            self.graph
                .node_indices()
                .filter_map(|index| self.vertex_at(index))
                .collect(),
        )
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Sorts vertices by insertion order. Unknown vertices sort last.
    pub(crate) fn sorted(&self, mut vertices: Vec<Vertex>) -> Vec<Vertex> {
        vertices.sort_by_key(|&v| self.seq(v).unwrap_or(u64::MAX));
        vertices
    }

    // -----------------------------------------------------------------------
    // Edges
    // -----------------------------------------------------------------------

    /// Adds the edge `child -> parent` with default properties.
    ///
    /// See [`add_edge_with`](Self::add_edge_with).
    pub fn add_edge(&mut self, child: Vertex, parent: Vertex) -> Option<Edge>
    where
        E: Default,
    {
        self.add_edge_with(child, parent, E::default())
    }

    /// Adds the edge `child -> parent`.
    ///
    /// Returns the existing edge if there is one. Self-loops, unknown
    /// vertices and edges that would close a cycle are not added.
    pub fn add_edge_with(&mut self, child: Vertex, parent: Vertex, props: E) -> Option<Edge> {
        if child == parent {
            tracing::debug!(vertex = child.index(), "ignoring self-loop");
            return None;
        }
        if !self.contains_vertex(child) || !self.contains_vertex(parent) {
            tracing::debug!(
                child = child.index(),
                parent = parent.index(),
                "ignoring edge to unknown vertex"
            );
            return None;
        }
        if let Some(existing) = self.edge(child, parent) {
            return Some(existing);
        }
        if has_path_connecting(&self.graph, parent.index, child.index, None) {
            tracing::warn!(
                child = child.index(),
                parent = parent.index(),
                "rejecting edge that would close a cycle"
            );
            return None;
        }
        let seq = self.take_seq();
        Some(self.insert_edge(child, parent, Slot { props, seq }))
    }

    /// Adds an edge without any checks. The caller guarantees that the edge
    /// is new and keeps the graph acyclic.
    pub(crate) fn insert_edge(&mut self, child: Vertex, parent: Vertex, slot: Slot<E>) -> Edge {
        Edge(self.graph.add_edge(child.index, parent.index, slot))
    }

    pub fn remove_edge(&mut self, e: Edge) -> Option<E> {
        self.graph.remove_edge(e.0).map(|slot| slot.props)
    }

    pub(crate) fn remove_edge_slot(&mut self, e: Edge) -> Option<Slot<E>> {
        self.graph.remove_edge(e.0)
    }

    /// The edge `child -> parent`, if present.
    pub fn edge(&self, child: Vertex, parent: Vertex) -> Option<Edge> {
        if !self.contains_vertex(child) || !self.contains_vertex(parent) {
            return None;
        }
        self.graph.find_edge(child.index, parent.index).map(Edge)
    }

    pub fn has_edge(&self, child: Vertex, parent: Vertex) -> bool {
        self.edge(child, parent).is_some()
    }

    /// True if the vertices are joined by an edge in either direction.
    pub fn is_connected(&self, a: Vertex, b: Vertex) -> bool {
        self.has_edge(a, b) || self.has_edge(b, a)
    }

    /// Returns `(child, parent)` of an edge.
    pub fn edge_endpoints(&self, e: Edge) -> Option<(Vertex, Vertex)> {
        let (child, parent) = self.graph.edge_endpoints(e.0)?;
        Some((self.vertex_at(child)?, self.vertex_at(parent)?))
    }

    pub fn edge_properties(&self, e: Edge) -> Option<&E> {
        self.graph.edge_weight(e.0).map(|slot| &slot.props)
    }

    pub fn edge_properties_mut(&mut self, e: Edge) -> Option<&mut E> {
        self.graph.edge_weight_mut(e.0).map(|slot| &mut slot.props)
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<(u64, Edge)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_weight(e).map(|slot| (slot.seq, Edge(e))))
            .collect();
        edges.sort_by_key(|(seq, _)| *seq);
        edges.into_iter().map(|(_, e)| e).collect()
    }

    /// All edges as `(child, parent)` pairs, in insertion order.
    pub fn edge_pairs(&self) -> Vec<(Vertex, Vertex)> {
        self.edges()
            .into_iter()
            .filter_map(|e| self.edge_endpoints(e))
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_edges(&self) -> bool {
        self.graph.edge_count() > 0
    }

    // -----------------------------------------------------------------------
    // Adjacency
    // -----------------------------------------------------------------------

    /// Neighbors in insertion order. `Outgoing` leads to parents,
    /// `Incoming` to children.
    pub(crate) fn neighbors(&self, v: Vertex, direction: Direction) -> Vec<Vertex> {
        if !self.contains_vertex(v) {
            return Vec::new();
        }
        self.sorted(
            self.graph
                .neighbors_directed(v.index, direction)
                .filter_map(|index| self.vertex_at(index))
                .collect(),
        )
    }

    /// Direct parents of `v`, in insertion order.
    pub fn parents(&self, v: Vertex) -> Vec<Vertex> {
        self.neighbors(v, Direction::Outgoing)
    }

    /// Direct children of `v`, in insertion order.
    pub fn children(&self, v: Vertex) -> Vec<Vertex> {
        self.neighbors(v, Direction::Incoming)
    }

    pub fn out_degree(&self, v: Vertex) -> usize {
        self.degree(v, Direction::Outgoing)
    }

    pub fn in_degree(&self, v: Vertex) -> usize {
        self.degree(v, Direction::Incoming)
    }

    fn degree(&self, v: Vertex, direction: Direction) -> usize {
        if !self.contains_vertex(v) {
            return 0;
        }
        self.graph.edges_directed(v.index, direction).count()
    }

    /// A root has no parent.
    pub fn is_root(&self, v: Vertex) -> bool {
        self.contains_vertex(v) && self.out_degree(v) == 0
    }

    /// A leaf has no child.
    pub fn is_leaf(&self, v: Vertex) -> bool {
        self.contains_vertex(v) && self.in_degree(v) == 0
    }

    /// All roots in insertion order.
    pub fn roots(&self) -> Vec<Vertex> {
        self.vertices()
            .into_iter()
            .filter(|&v| self.out_degree(v) == 0)
            .collect()
    }

    /// All leaves in insertion order.
    pub fn leaves(&self) -> Vec<Vertex> {
        self.vertices()
            .into_iter()
            .filter(|&v| self.in_degree(v) == 0)
            .collect()
    }

    pub fn clear(&mut self) {
        self.graph.clear();
    }

    // -----------------------------------------------------------------------
    // Bulk construction
    // -----------------------------------------------------------------------

    /// Adds `(child, parent)` relations between caller-side keys.
    ///
    /// `index` maps keys to vertices already in the graph. Unseen keys get a
    /// new vertex with properties from `make`, which is recorded in `index`.
    /// Returns the number of edges added.
    pub fn add_relations<K, I, F>(
        &mut self,
        pairs: I,
        index: &mut HashMap<K, Vertex>,
        mut make: F,
    ) -> usize
    where
        K: Eq + Hash + Clone,
        I: IntoIterator<Item = (K, K)>,
        F: FnMut(&K) -> V,
        E: Default,
    {
        let mut added = 0;
        for (child_key, parent_key) in pairs {
            let child = self.vertex_for_key(&child_key, index, &mut make);
            let parent = self.vertex_for_key(&parent_key, index, &mut make);
            let before = self.edge_count();
            if self.add_edge(child, parent).is_some() && self.edge_count() > before {
                added += 1;
            }
        }
        added
    }

    fn vertex_for_key<K, F>(&mut self, key: &K, index: &mut HashMap<K, Vertex>, make: &mut F) -> Vertex
    where
        K: Eq + Hash + Clone,
        F: FnMut(&K) -> V,
    {
        if let Some(&v) = index.get(key) {
            if self.contains_vertex(v) {
                return v;
            }
        }
        let v = self.add_vertex(make(key));
        index.insert(key.clone(), v);
        v
    }

    /// Merges `source` into `target`.
    ///
    /// The edges of `source` are moved to `target`, then `source` is removed
    /// and its properties are handed to `merge`. Where `target` already has
    /// the edge, the moved properties are handed to `merge_edge` instead.
    /// Edges that would close a cycle are dropped. Returns false if either
    /// vertex is unknown or both are the same.
    pub fn merge_into(
        &mut self,
        target: Vertex,
        source: Vertex,
        merge: impl FnOnce(&mut V, V),
        mut merge_edge: impl FnMut(&mut E, E),
    ) -> bool {
        if target == source || !self.contains_vertex(target) || !self.contains_vertex(source) {
            return false;
        }

        let outgoing: Vec<(Edge, Vertex)> = self
            .graph
            .edges_directed(source.index, Direction::Outgoing)
            .filter_map(|e| Some((Edge(e.id()), self.vertex_at(e.target())?)))
            .collect();
        let incoming: Vec<(Edge, Vertex)> = self
            .graph
            .edges_directed(source.index, Direction::Incoming)
            .filter_map(|e| Some((Edge(e.id()), self.vertex_at(e.source())?)))
            .collect();

        let mut moved: Vec<(Vertex, Vertex, Slot<E>)> = Vec::new();
        for (e, parent) in outgoing {
            if let Some(slot) = self.remove_edge_slot(e) {
                moved.push((target, parent, slot));
            }
        }
        for (e, child) in incoming {
            if let Some(slot) = self.remove_edge_slot(e) {
                moved.push((child, target, slot));
            }
        }
        moved.sort_by_key(|(_, _, slot)| slot.seq);

        for (child, parent, slot) in moved {
            if child == parent {
                continue;
            }
            if let Some(existing) = self.edge(child, parent) {
                if let Some(props) = self.edge_properties_mut(existing) {
                    merge_edge(props, slot.props);
                }
                continue;
            }
            if has_path_connecting(&self.graph, parent.index, child.index, None) {
                tracing::warn!(
                    child = child.index(),
                    parent = parent.index(),
                    "dropping merged edge that would close a cycle"
                );
                continue;
            }
            self.insert_edge(child, parent, slot);
        }

        if let Some(props) = self.remove_vertex(source) {
            if let Some(target_props) = self.properties_mut(target) {
                merge(target_props, props);
            }
        }
        true
    }
}
