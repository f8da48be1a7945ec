//! Graph searches and the orderings built on them: dominated subtrees,
//! display orders, roots of and leaves from a vertex.
//!
//! All searches here start at a vertex and move toward the leaves unless
//! stated otherwise. Neighbors are visited in insertion order.

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};

use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::graph::{HistoryGraph, Vertex};

/// Order in which a search reports vertices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraversalOrder {
    #[default]
    BreadthFirst,
    DepthFirst,
}

impl<V, E> HistoryGraph<V, E> {
    /// Vertices in breadth-first discovery order, starting with `start`.
    pub(crate) fn breadth_first(&self, start: Vertex, direction: Direction) -> Vec<Vertex> {
        if !self.contains_vertex(start) {
            return Vec::new();
        }
        let mut seen = HashSet::from([start]);
        let mut order = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(current, direction) {
                if seen.insert(next) {
                    order.push(next);
                    queue.push_back(next);
                }
            }
        }
        order
    }

    /// Vertices in depth-first discovery order, starting with `start`.
    ///
    /// At each vertex the neighbors are visited in the order given by
    /// `compare`, falling back to insertion order.
    pub(crate) fn depth_first_sorted<F>(
        &self,
        start: Vertex,
        direction: Direction,
        mut compare: F,
    ) -> Vec<Vertex>
    where
        F: FnMut(&Vertex, &Vertex) -> Ordering,
    {
        if !self.contains_vertex(start) {
            return Vec::new();
        }

        let mut sorted_neighbors = |v: Vertex| {
            let mut next = self.neighbors(v, direction);
            next.sort_by(|a, b| compare(a, b));
            next
        };

        let mut seen = HashSet::from([start]);
        let mut order = vec![start];
        // Each frame holds the neighbors of a discovered vertex still to try.
        let mut stack = vec![sorted_neighbors(start).into_iter()];
        while let Some(frame) = stack.last_mut() {
            match frame.next() {
                Some(next) => {
                    if seen.insert(next) {
                        order.push(next);
                        stack.push(sorted_neighbors(next).into_iter());
                    }
                }
                None => {
                    stack.pop();
                }
            }
        }
        order
    }

    pub(crate) fn depth_first(&self, start: Vertex, direction: Direction) -> Vec<Vertex> {
        self.depth_first_sorted(start, direction, |_, _| Ordering::Equal)
    }

    // -----------------------------------------------------------------------
    // Roots and leaves relative to a vertex
    // -----------------------------------------------------------------------

    /// The roots `v` descends from, in breadth-first order from `v`.
    /// A root is its own root.
    pub fn roots_of(&self, v: Vertex) -> Vec<Vertex> {
        self.breadth_first(v, Direction::Outgoing)
            .into_iter()
            .filter(|&u| self.out_degree(u) == 0)
            .collect()
    }

    /// The leaves derived from `v`, in breadth-first order from `v`.
    /// A leaf is its own leaf.
    pub fn leaves_from(&self, v: Vertex) -> Vec<Vertex> {
        self.breadth_first(v, Direction::Incoming)
            .into_iter()
            .filter(|&u| self.in_degree(u) == 0)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Dominated subtrees
    // -----------------------------------------------------------------------

    /// The vertices dominated by `v` when searching from `root`.
    ///
    /// A vertex is dominated by `v` if every path from `root` to it passes
    /// through `v`; `v` dominates itself. The result follows the search order
    /// from `root`. Empty if `v` cannot be reached from `root`.
    pub fn vertices_dominated_by(&self, v: Vertex, root: Vertex, order: TraversalOrder) -> Vec<Vertex> {
        let presorted = match order {
            TraversalOrder::BreadthFirst => self.breadth_first(root, Direction::Incoming),
            TraversalOrder::DepthFirst => self.depth_first(root, Direction::Incoming),
        };
        self.dominated_in(v, root, presorted)
    }

    /// Like [`vertices_dominated_by`](Self::vertices_dominated_by) in
    /// depth-first order, visiting children in the order given by `compare`.
    pub fn vertices_dominated_by_depth_first_sorted<F>(
        &self,
        v: Vertex,
        root: Vertex,
        compare: F,
    ) -> Vec<Vertex>
    where
        F: FnMut(&Vertex, &Vertex) -> Ordering,
    {
        let presorted = self.depth_first_sorted(root, Direction::Incoming, compare);
        self.dominated_in(v, root, presorted)
    }

    /// Filters the vertices reachable from `root` (in their given order) down
    /// to those dominated by `v`.
    fn dominated_in(&self, v: Vertex, root: Vertex, reachable: Vec<Vertex>) -> Vec<Vertex> {
        if !self.contains_vertex(v) || !reachable.contains(&v) {
            tracing::debug!(
                vertex = v.index(),
                root = root.index(),
                "vertex not reachable from root"
            );
            return Vec::new();
        }
        if v == root {
            return reachable;
        }

        // Everything still reachable from root once v is taken out.
        let mut bypass = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            for next in self.children(current) {
                if next != v && bypass.insert(next) {
                    queue.push_back(next);
                }
            }
        }

        reachable
            .into_iter()
            .filter(|u| !bypass.contains(u))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Display orders
    // -----------------------------------------------------------------------

    /// All vertices in breadth-first order.
    ///
    /// The roots of `reference` come first, then everything reachable from
    /// the first of them. Vertices on side paths are slotted in before the
    /// first already placed vertex they lead to. Without a reference (or
    /// with an unknown one) the first root is the reference.
    pub fn vertices_breadth_first(&self, reference: Option<Vertex>) -> Vec<Vertex> {
        let Some(reference) = self.reference_or_first_root(reference) else {
            return Vec::new();
        };

        let mut vertices = self.roots_of(reference);
        if vertices.len() == self.vertex_count() {
            return vertices;
        }

        let placed: HashSet<Vertex> = vertices.iter().copied().collect();
        let main: Vec<Vertex> = self
            .breadth_first(vertices[0], Direction::Incoming)
            .into_iter()
            .filter(|v| !placed.contains(v))
            .collect();
        vertices.extend(main);
        if vertices.len() == self.vertex_count() {
            return vertices;
        }

        for candidate in self.vertices() {
            if vertices.contains(&candidate) {
                continue;
            }
            let mut insert_at = vertices.len();
            let mut to_insert = Vec::new();
            for reached in self.breadth_first(candidate, Direction::Incoming) {
                match vertices.iter().position(|&p| p == reached) {
                    Some(found) => insert_at = insert_at.min(found),
                    None => to_insert.push(reached),
                }
            }
            for (offset, v) in to_insert.into_iter().enumerate() {
                vertices.insert(insert_at + offset, v);
            }
        }
        vertices
    }

    /// All vertices reachable from the first root of `reference`, in
    /// depth-first order with children visited in the order given by
    /// `compare`. The other roots of `reference` come right after the first.
    pub fn vertices_depth_first_sorted<F>(&self, reference: Option<Vertex>, compare: F) -> Vec<Vertex>
    where
        F: FnMut(&Vertex, &Vertex) -> Ordering,
    {
        let Some(reference) = self.reference_or_first_root(reference) else {
            return Vec::new();
        };

        let mut vertices = self.roots_of(reference);
        if vertices.len() == self.vertex_count() || vertices.is_empty() {
            return vertices;
        }

        let placed: HashSet<Vertex> = vertices.iter().copied().collect();
        let dfs = self.depth_first_sorted(vertices[0], Direction::Incoming, compare);
        vertices.extend(dfs.into_iter().filter(|v| !placed.contains(v)));
        vertices
    }

    fn reference_or_first_root(&self, reference: Option<Vertex>) -> Option<Vertex> {
        match reference {
            Some(v) if self.contains_vertex(v) => Some(v),
            Some(v) => {
                tracing::debug!(vertex = v.index(), "unknown reference vertex, using first root");
                self.roots().first().copied()
            }
            None => self.roots().first().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ```text
    ///      r
    ///     / \
    ///    a   b
    ///    |\ /
    ///    c d
    ///    |
    ///    e
    /// ```
    fn sample() -> (HistoryGraph<char, ()>, Vec<Vertex>) {
        let mut g = HistoryGraph::new();
        let vs: Vec<Vertex> = ['r', 'a', 'b', 'c', 'd', 'e']
            .into_iter()
            .map(|name| g.add_vertex(name))
            .collect();
        let [r, a, b, c, d, e] = [vs[0], vs[1], vs[2], vs[3], vs[4], vs[5]];
        g.add_edge(a, r);
        g.add_edge(b, r);
        g.add_edge(c, a);
        g.add_edge(d, a);
        g.add_edge(d, b);
        g.add_edge(e, c);
        (g, vs)
    }

    fn names(g: &HistoryGraph<char, ()>, vs: &[Vertex]) -> String {
        vs.iter().map(|&v| *g.properties(v).unwrap()).collect()
    }

    #[test]
    fn breadth_and_depth_first() {
        let (g, vs) = sample();
        assert_eq!(names(&g, &g.breadth_first(vs[0], Direction::Incoming)), "rabcde");
        assert_eq!(names(&g, &g.depth_first(vs[0], Direction::Incoming)), "racedb");
    }

    #[test]
    fn sorted_depth_first_uses_comparator() {
        let (g, vs) = sample();
        let reversed = |a: &Vertex, b: &Vertex| g.seq(*b).cmp(&g.seq(*a));
        assert_eq!(
            names(&g, &g.depth_first_sorted(vs[0], Direction::Incoming, reversed)),
            "rbdace"
        );
    }

    #[test]
    fn roots_of_and_leaves_from() {
        let (g, vs) = sample();
        assert_eq!(g.roots_of(vs[4]), vec![vs[0]]);
        assert_eq!(g.leaves_from(vs[1]), vec![vs[4], vs[5]]);
        assert_eq!(g.leaves_from(vs[5]), vec![vs[5]]);
        assert_eq!(g.roots_of(vs[0]), vec![vs[0]]);
    }

    #[test]
    fn dominated_vertices() {
        let (g, vs) = sample();
        // d is also reachable through b, so a only dominates a, c, e.
        assert_eq!(
            names(&g, &g.vertices_dominated_by(vs[1], vs[0], TraversalOrder::BreadthFirst)),
            "ace"
        );
        assert_eq!(
            names(&g, &g.vertices_dominated_by(vs[2], vs[0], TraversalOrder::DepthFirst)),
            "b"
        );
        assert_eq!(g.vertices_dominated_by(vs[0], vs[0], TraversalOrder::BreadthFirst).len(), 6);
        // b is not below c
        assert!(g.vertices_dominated_by(vs[2], vs[3], TraversalOrder::BreadthFirst).is_empty());
    }

    #[test]
    fn dominated_sorted_order() {
        let (g, vs) = sample();
        let reversed = |a: &Vertex, b: &Vertex| g.seq(*b).cmp(&g.seq(*a));
        assert_eq!(
            names(&g, &g.vertices_dominated_by_depth_first_sorted(vs[1], vs[0], reversed)),
            "ace"
        );
    }

    #[test]
    fn breadth_first_slots_in_side_roots() {
        let mut g: HistoryGraph<char, ()> = HistoryGraph::new();
        let main = g.add_vertex('m');
        let child = g.add_vertex('c');
        let side = g.add_vertex('s');
        let lone = g.add_vertex('l');
        g.add_edge(child, main);
        g.add_edge(child, side);

        // side is a second root of child; from main's point of view it is a
        // side path and goes in front of child.
        assert_eq!(names(&g, &g.vertices_breadth_first(Some(main))), "mscl");
        assert_eq!(names(&g, &g.vertices_breadth_first(Some(child))), "mscl");
        assert_eq!(g.vertices_breadth_first(None).len(), 4);
    }

    #[test]
    fn depth_first_sorted_display_order() {
        let (g, vs) = sample();
        let by_seq = |a: &Vertex, b: &Vertex| g.seq(*a).cmp(&g.seq(*b));
        assert_eq!(names(&g, &g.vertices_depth_first_sorted(Some(vs[5]), by_seq)), "racedb");
    }

    #[test]
    fn empty_graph_orders() {
        let g: HistoryGraph<(), ()> = HistoryGraph::new();
        assert!(g.vertices_breadth_first(None).is_empty());
        assert!(g.vertices_depth_first_sorted(None, |_, _| Ordering::Equal).is_empty());
    }
}
