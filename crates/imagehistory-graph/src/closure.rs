//! Reachability: relation cloud, topological order, transitive closure and
//! transitive reduction.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction;

use crate::graph::{HistoryGraph, Slot, Vertex};

impl<V, E> HistoryGraph<V, E> {
    /// Vertices reachable from `v` in `direction`, excluding `v`.
    pub(crate) fn reachable(&self, v: Vertex, direction: Direction) -> HashSet<Vertex> {
        let mut seen = HashSet::new();
        let mut stack = self.neighbors(v, direction);
        while let Some(current) = stack.pop() {
            if seen.insert(current) {
                stack.extend(self.neighbors(current, direction));
            }
        }
        seen
    }

    /// Every pair `(descendant, ancestor)` joined by a directed path of any
    /// length.
    ///
    /// Pairs are grouped by descendant in insertion order, ancestors in
    /// insertion order within each group.
    pub fn relation_cloud(&self) -> Vec<(Vertex, Vertex)> {
        let mut cloud = Vec::new();
        for v in self.vertices() {
            let ancestors = self.reachable(v, Direction::Outgoing);
            for ancestor in self.sorted(ancestors.into_iter().collect()) {
                cloud.push((v, ancestor));
            }
        }
        cloud
    }

    /// All vertices with parents before children.
    ///
    /// Among vertices whose parents are all placed, the earliest inserted
    /// comes first. Returns an empty list if the graph has a cycle.
    pub fn topological_sort(&self) -> Vec<Vertex> {
        let mut pending: HashMap<Vertex, usize> = HashMap::new();
        let mut ready: BTreeSet<(u64, Vertex)> = BTreeSet::new();
        for v in self.vertices() {
            let parents = self.out_degree(v);
            if parents == 0 {
                ready.insert((self.seq(v).unwrap_or(u64::MAX), v));
            } else {
                pending.insert(v, parents);
            }
        }

        let mut order = Vec::with_capacity(self.vertex_count());
        while let Some((seq, v)) = ready.iter().next().copied() {
            ready.remove(&(seq, v));
            order.push(v);
            for child in self.children(v) {
                if let Some(count) = pending.get_mut(&child) {
                    *count -= 1;
                    if *count == 0 {
                        pending.remove(&child);
                        ready.insert((self.seq(child).unwrap_or(u64::MAX), child));
                    }
                }
            }
        }

        if order.len() != self.vertex_count() {
            tracing::debug!("graph has a cycle, no topological order");
            return Vec::new();
        }
        order
    }

    /// Removes every edge `(a, b)` for which another path from `a` to `b`
    /// exists. Returns the removed edges as `(child, parent)` pairs in edge
    /// insertion order.
    ///
    /// Candidates are chosen from the reachability of the graph as it was on
    /// entry, and each one is checked again against the current edge set
    /// right before removal, so an edge is never removed while it is the
    /// only connection between its ends.
    pub fn reduce_edges(&mut self) -> Vec<(Vertex, Vertex)> {
        let reach: HashMap<Vertex, HashSet<Vertex>> = self
            .vertices()
            .into_iter()
            .map(|v| (v, self.reachable(v, Direction::Outgoing)))
            .collect();

        let candidates: Vec<_> = self
            .edges()
            .into_iter()
            .filter_map(|e| self.edge_endpoints(e).map(|ends| (e, ends)))
            .filter(|&(_, (child, parent))| {
                self.parents(child)
                    .into_iter()
                    .any(|other| {
                        other != parent && reach.get(&other).is_some_and(|r| r.contains(&parent))
                    })
            })
            .collect();

        let mut removed = Vec::new();
        for (e, (child, parent)) in candidates {
            let still_redundant = self.parents(child).into_iter().any(|other| {
                other != parent && self.reachable(other, Direction::Outgoing).contains(&parent)
            });
            if still_redundant {
                self.remove_edge(e);
                removed.push((child, parent));
            }
        }

        if !removed.is_empty() {
            tracing::debug!(removed = removed.len(), "reduced redundant edges");
        }
        removed
    }
}

impl<V: Clone, E: Clone + Default> HistoryGraph<V, E> {
    /// Returns a copy with an edge for every pair of the relation cloud.
    /// Added edges carry default properties.
    pub fn transitive_closure(&self) -> Self {
        let mut closure = self.clone();
        for (descendant, ancestor) in self.relation_cloud() {
            if !closure.has_edge(descendant, ancestor) {
                let seq = closure.take_seq();
                closure.insert_edge(
                    descendant,
                    ancestor,
                    Slot {
                        props: E::default(),
                        seq,
                    },
                );
            }
        }
        closure
    }
}

impl<V: Clone, E: Clone> HistoryGraph<V, E> {
    /// Returns a reduced copy together with the edges it no longer has.
    pub fn transitive_reduction(&self) -> (Self, Vec<(Vertex, Vertex)>) {
        let mut reduction = self.clone();
        let removed = reduction.reduce_edges();
        (reduction, removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 <- 1 <- 2 <- 3 plus the shortcuts 2 -> 0 and 3 -> 0.
    fn shortcut_chain() -> (HistoryGraph<usize, ()>, Vec<Vertex>) {
        let mut g = HistoryGraph::new();
        let vs: Vec<Vertex> = (0..4).map(|i| g.add_vertex(i)).collect();
        g.add_edge(vs[1], vs[0]);
        g.add_edge(vs[2], vs[1]);
        g.add_edge(vs[2], vs[0]);
        g.add_edge(vs[3], vs[2]);
        g.add_edge(vs[3], vs[0]);
        (g, vs)
    }

    #[test]
    fn relation_cloud_lists_all_ancestors() {
        let (g, vs) = shortcut_chain();
        let cloud = g.relation_cloud();
        assert_eq!(
            cloud,
            vec![
                (vs[1], vs[0]),
                (vs[2], vs[0]),
                (vs[2], vs[1]),
                (vs[3], vs[0]),
                (vs[3], vs[1]),
                (vs[3], vs[2]),
            ]
        );
    }

    #[test]
    fn reduce_removes_shortcuts_only() {
        let (mut g, vs) = shortcut_chain();
        let cloud_before = g.relation_cloud();

        let removed = g.reduce_edges();
        assert_eq!(removed, vec![(vs[2], vs[0]), (vs[3], vs[0])]);
        assert_eq!(g.edge_pairs(), vec![(vs[1], vs[0]), (vs[2], vs[1]), (vs[3], vs[2])]);
        assert_eq!(g.relation_cloud(), cloud_before);

        assert!(g.reduce_edges().is_empty());
    }

    #[test]
    fn diamond_keeps_both_parents() {
        let mut g: HistoryGraph<&str, ()> = HistoryGraph::new();
        let root = g.add_vertex("root");
        let left = g.add_vertex("left");
        let right = g.add_vertex("right");
        let merged = g.add_vertex("merged");
        g.add_edge(left, root);
        g.add_edge(right, root);
        g.add_edge(merged, left);
        g.add_edge(merged, right);

        assert!(g.reduce_edges().is_empty());
        assert_eq!(g.edge_count(), 4);
    }

    #[test]
    fn topological_sort_puts_parents_first() {
        let (g, vs) = shortcut_chain();
        assert_eq!(g.topological_sort(), vs);
    }

    #[test]
    fn topological_sort_breaks_ties_by_insertion() {
        let mut g: HistoryGraph<u8, ()> = HistoryGraph::new();
        let late_root = g.add_vertex(0);
        let early_child = g.add_vertex(1);
        let other_root = g.add_vertex(2);
        g.add_edge(early_child, other_root);
        assert_eq!(g.topological_sort(), vec![late_root, other_root, early_child]);
    }

    #[test]
    fn closure_and_reduction_copies() {
        let mut g: HistoryGraph<usize, ()> = HistoryGraph::new();
        let vs: Vec<Vertex> = (0..3).map(|i| g.add_vertex(i)).collect();
        g.add_edge(vs[1], vs[0]);
        g.add_edge(vs[2], vs[1]);

        let closure = g.transitive_closure();
        assert_eq!(closure.edge_count(), 3);
        assert!(closure.has_edge(vs[2], vs[0]));
        assert_eq!(g.edge_count(), 2);

        let (reduced, removed) = closure.transitive_reduction();
        assert_eq!(removed, vec![(vs[2], vs[0])]);
        assert_eq!(reduced.edge_pairs(), g.edge_pairs());
        assert_eq!(closure.edge_count(), 3);
    }

    #[test]
    fn empty_graph() {
        let mut g: HistoryGraph<(), ()> = HistoryGraph::new();
        assert!(g.relation_cloud().is_empty());
        assert!(g.topological_sort().is_empty());
        assert!(g.reduce_edges().is_empty());
    }
}
