//! Single-source shortest paths over the graph view.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::graph::GraphView;

/// Priority-queue entry.
#[derive(Clone, Copy, Debug)]
struct SearchState {
    cost: f32,
    vertex: usize,
}

impl PartialEq for SearchState {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.vertex == other.vertex
    }
}

impl Eq for SearchState {}

impl Ord for SearchState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for SearchState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cost and predecessor for every vertex after one search.
#[derive(Clone, Debug)]
pub struct ShortestPaths {
    /// Travel cost from the source; infinity means unreachable.
    pub cost: Vec<f32>,
    /// Predecessor along the cheapest path; None at the source and for
    /// unreachable vertices.
    pub predecessor: Vec<Option<usize>>,
}

impl ShortestPaths {
    /// Vertex sequence from `start` to `goal`, or None if unreachable.
    pub fn trace(&self, start: usize, goal: usize) -> Option<Vec<usize>> {
        if !self.cost[goal].is_finite() {
            return None;
        }
        let mut path = Vec::new();
        let mut current = goal;
        while current != start {
            path.push(current);
            current = self.predecessor[current]?;
        }
        path.push(start);
        path.reverse();
        Some(path)
    }
}

/// Dijkstra over the implicit map graph from `start`.
///
/// Edge costs include a turning penalty against the direction of the
/// predecessor edge, looked up at relaxation time; at the source there is no
/// previous edge and the penalty is zero. All costs are nonnegative, so the
/// search needs no negative-cycle handling.
pub fn shortest_paths(graph: &GraphView<'_>, start: usize) -> ShortestPaths {
    let n = graph.num_vertices();
    let mut cost = vec![f32::INFINITY; n];
    let mut predecessor: Vec<Option<usize>> = vec![None; n];

    if start >= n {
        return ShortestPaths { cost, predecessor };
    }
    cost[start] = 0.0;

    let mut heap = BinaryHeap::new();
    heap.push(SearchState {
        cost: 0.0,
        vertex: start,
    });

    while let Some(SearchState { cost: c, vertex: v }) = heap.pop() {
        if c > cost[v] {
            continue;
        }
        let prev_direction = predecessor[v].map(|p| graph.direction(p, v));
        for u in graph.out_neighbors(v) {
            let edge = graph.edge_cost(v, u, prev_direction.as_ref());
            if !edge.is_finite() {
                continue;
            }
            let next = c + edge;
            if next < cost[u] {
                cost[u] = next;
                predecessor[u] = Some(v);
                heap.push(SearchState {
                    cost: next,
                    vertex: u,
                });
            }
        }
    }

    ShortestPaths { cost, predecessor }
}
