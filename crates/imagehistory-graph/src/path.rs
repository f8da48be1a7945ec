//! Longest and shortest paths.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use petgraph::Direction;

use crate::graph::{HistoryGraph, Vertex};

/// Distances and predecessors of a single-source path search.
struct PathSearch {
    distances: HashMap<Vertex, usize>,
    predecessors: HashMap<Vertex, Vertex>,
}

impl PathSearch {
    /// Walks from `from` back to the search source, excluding the source.
    fn walk_back(&self, from: Vertex) -> Vec<Vertex> {
        let mut path = Vec::new();
        let mut current = from;
        while let Some(&previous) = self.predecessors.get(&current) {
            path.push(current);
            current = previous;
        }
        path
    }
}

impl<V, E> HistoryGraph<V, E> {
    /// The longest path from a root to a leaf that passes through `v`,
    /// ordered root first.
    ///
    /// When several roots (or leaves) are equally far away, the earliest
    /// inserted one is taken. Empty if `v` is not in the graph.
    pub fn longest_path_touching(&self, v: Vertex) -> Vec<Vertex> {
        self.longest_path_touching_by(v, |_, _| Ordering::Equal)
    }

    /// Like [`longest_path_touching`](Self::longest_path_touching), but
    /// candidates at equal distance are ordered with `compare` first. The
    /// sort is stable, so insertion order still decides between candidates
    /// `compare` considers equal.
    pub fn longest_path_touching_by<F>(&self, v: Vertex, mut compare: F) -> Vec<Vertex>
    where
        F: FnMut(&Vertex, &Vertex) -> Ordering,
    {
        if !self.contains_vertex(v) {
            tracing::debug!(vertex = v.index(), "longest path for unknown vertex");
            return Vec::new();
        }

        let topological = self.topological_sort();

        // Toward the roots: children must be settled before their parents.
        let up = self.longest_from(v, Direction::Outgoing, topological.iter().rev().copied());
        let mut path: Vec<Vertex> = match self.most_remote(&up, &mut compare) {
            Some(root) => up.walk_back(root),
            None => Vec::new(),
        };

        path.push(v);

        let down = self.longest_from(v, Direction::Incoming, topological.iter().copied());
        if let Some(leaf) = self.most_remote(&down, &mut compare) {
            let mut to_leaf = down.walk_back(leaf);
            to_leaf.reverse();
            path.extend(to_leaf);
        }
        path
    }

    /// Longest distances from `v` following `direction`, relaxing vertices
    /// in the given order.
    fn longest_from(
        &self,
        v: Vertex,
        direction: Direction,
        order: impl Iterator<Item = Vertex>,
    ) -> PathSearch {
        let mut search = PathSearch {
            distances: HashMap::from([(v, 0)]),
            predecessors: HashMap::new(),
        };
        for current in order {
            let Some(&distance) = search.distances.get(&current) else {
                continue;
            };
            for next in self.neighbors(current, direction) {
                let longer = search
                    .distances
                    .get(&next)
                    .map_or(true, |&known| distance + 1 > known);
                if longer {
                    search.distances.insert(next, distance + 1);
                    search.predecessors.insert(next, current);
                }
            }
        }
        search
    }

    /// The vertex farthest away in the search, at least one step.
    fn most_remote<F>(&self, search: &PathSearch, compare: &mut F) -> Option<Vertex>
    where
        F: FnMut(&Vertex, &Vertex) -> Ordering,
    {
        let max = search.distances.values().copied().max().filter(|&d| d >= 1)?;
        let mut candidates = self.sorted(
            search
                .distances
                .iter()
                .filter(|&(_, &d)| d == max)
                .map(|(&v, _)| v)
                .collect(),
        );
        candidates.sort_by(|a, b| compare(a, b));
        candidates.first().copied()
    }

    /// Breadth-first search from `v` following `direction`.
    fn shortest_from(&self, v: Vertex, direction: Direction) -> PathSearch {
        let mut search = PathSearch {
            distances: HashMap::from([(v, 0)]),
            predecessors: HashMap::new(),
        };
        let mut queue = VecDeque::from([v]);
        while let Some(current) = queue.pop_front() {
            let Some(&distance) = search.distances.get(&current) else {
                continue;
            };
            for next in self.neighbors(current, direction) {
                if !search.distances.contains_key(&next) {
                    search.distances.insert(next, distance + 1);
                    search.predecessors.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        search
    }

    /// The shortest directed path between `v1` and `v2`, in either
    /// direction.
    ///
    /// The result starts with `v1` and ends with `v2`. Empty if neither is
    /// reachable from the other.
    pub fn shortest_path(&self, v1: Vertex, v2: Vertex) -> Vec<Vertex> {
        if !self.contains_vertex(v1) || !self.contains_vertex(v2) {
            return Vec::new();
        }
        if v1 == v2 {
            return vec![v1];
        }

        let forward = self.shortest_from(v1, Direction::Outgoing);
        if forward.distances.contains_key(&v2) {
            let mut path = forward.walk_back(v2);
            path.push(v1);
            path.reverse();
            return path;
        }

        let backward = self.shortest_from(v2, Direction::Outgoing);
        if backward.distances.contains_key(&v1) {
            let mut path = backward.walk_back(v1);
            path.push(v2);
            return path;
        }
        Vec::new()
    }

    /// Shortest distance from `v` toward the leaves for every vertex.
    /// `None` marks vertices that cannot be reached.
    pub fn shortest_distances_from(&self, v: Vertex) -> HashMap<Vertex, Option<usize>> {
        if !self.contains_vertex(v) {
            return HashMap::new();
        }
        let search = self.shortest_from(v, Direction::Incoming);
        self.vertices()
            .into_iter()
            .map(|u| (u, search.distances.get(&u).copied()))
            .collect()
    }
}
