//! Minimum spanning trees and forests over k-NN graphs
//!
//! Kruskal's algorithm is the default: edges are sorted once by
//! `(weight, lower endpoint, higher endpoint)` and merged through a
//! union-find, which yields a minimum spanning forest when the graph is
//! disconnected. Prim's algorithm is provided as an independent builder with
//! the same tie-break, grown from the lowest unvisited index of each
//! component.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::knn_graph::{Edge, KnnGraph};

/// Algorithm used to extract the spanning tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanningTreeAlgorithm {
    #[default]
    Kruskal,
    Prim,
}

/// Minimum spanning forest: one tree per connected component of the source
/// graph, a single tree when the graph is connected.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanningForest {
    node_count: usize,
    edges: Vec<Edge>,
    component_roots: Vec<usize>,
    component_of: Vec<usize>,
}

impl SpanningForest {
    /// Wrap an acyclic edge set and label its components by lowest index.
    fn from_tree_edges(node_count: usize, edges: Vec<Edge>) -> Self {
        let mut uf = UnionFind::<usize>::new(node_count);
        for edge in &edges {
            uf.union(edge.a, edge.b);
        }

        let mut component_roots = Vec::new();
        let mut component_by_rep: Vec<Option<usize>> = vec![None; node_count];
        let mut component_of = Vec::with_capacity(node_count);
        for i in 0..node_count {
            let rep = uf.find_mut(i);
            let component = *component_by_rep[rep].get_or_insert_with(|| {
                component_roots.push(i);
                component_roots.len() - 1
            });
            component_of.push(component);
        }

        Self {
            node_count,
            edges,
            component_roots,
            component_of,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Tree edges in the order they were selected
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn component_count(&self) -> usize {
        self.component_roots.len()
    }

    /// Lowest point index of each component, ascending
    pub fn component_roots(&self) -> &[usize] {
        &self.component_roots
    }

    /// Component number of `node`, matching the position of its root in
    /// [`component_roots`](Self::component_roots)
    pub fn component_of(&self, node: usize) -> usize {
        self.component_of[node]
    }

    /// Number of nodes in each component
    pub fn component_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.component_count()];
        for &component in &self.component_of {
            sizes[component] += 1;
        }
        sizes
    }

    /// True when every node is reachable from every other
    pub fn is_spanning_tree(&self) -> bool {
        self.component_count() <= 1
    }

    pub fn total_weight(&self) -> f64 {
        self.edges.iter().map(|e| e.weight as f64).sum()
    }

    /// Neighbour lists per node, ascending by neighbour index
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); self.node_count];
        for edge in &self.edges {
            adjacency[edge.a].push(edge.b);
            adjacency[edge.b].push(edge.a);
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
        }
        adjacency
    }
}

/// Build the minimum spanning forest of `graph` with Kruskal's algorithm
pub fn build_mst(graph: &KnnGraph) -> SpanningForest {
    build_mst_with(graph, SpanningTreeAlgorithm::Kruskal)
}

/// Build the minimum spanning forest of `graph` with the chosen algorithm
pub fn build_mst_with(graph: &KnnGraph, algorithm: SpanningTreeAlgorithm) -> SpanningForest {
    let edges = match algorithm {
        SpanningTreeAlgorithm::Kruskal => kruskal(graph),
        SpanningTreeAlgorithm::Prim => prim(graph),
    };
    let forest = SpanningForest::from_tree_edges(graph.node_count(), edges);

    debug!(
        ?algorithm,
        nodes = forest.node_count(),
        edges = forest.edge_count(),
        components = forest.component_count(),
        total_weight = forest.total_weight(),
        "built minimum spanning forest"
    );

    forest
}

fn kruskal(graph: &KnnGraph) -> Vec<Edge> {
    let n = graph.node_count();
    let mut candidates = graph.edges().to_vec();
    candidates.sort_by(Edge::selection_order);

    let mut uf = UnionFind::<usize>::new(n);
    let mut edges = Vec::with_capacity(n.saturating_sub(1));
    for edge in candidates {
        if uf.union(edge.a, edge.b) {
            edges.push(edge);
            if edges.len() + 1 == n {
                break;
            }
        }
    }
    edges
}

/// Heap entry for Prim's frontier: an edge and the endpoint it would add
#[derive(Debug, Clone, Copy)]
struct Frontier {
    edge: Edge,
    to: usize,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.edge.selection_order(&other.edge).then(self.to.cmp(&other.to))
    }
}

fn prim(graph: &KnnGraph) -> Vec<Edge> {
    let n = graph.node_count();
    let mut incident: Vec<Vec<Edge>> = vec![Vec::new(); n];
    for edge in graph.edges() {
        incident[edge.a].push(*edge);
        incident[edge.b].push(*edge);
    }

    let mut in_tree = vec![false; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));
    let mut heap = BinaryHeap::new();

    let push_incident = |node: usize, in_tree: &[bool], heap: &mut BinaryHeap<Reverse<Frontier>>| {
        for edge in &incident[node] {
            let to = if edge.a == node { edge.b } else { edge.a };
            if !in_tree[to] {
                heap.push(Reverse(Frontier { edge: *edge, to }));
            }
        }
    };

    for start in 0..n {
        if in_tree[start] {
            continue;
        }
        in_tree[start] = true;
        push_incident(start, &in_tree, &mut heap);

        while let Some(Reverse(Frontier { edge, to })) = heap.pop() {
            if in_tree[to] {
                continue;
            }
            in_tree[to] = true;
            edges.push(edge);
            push_incident(to, &in_tree, &mut heap);
        }
    }
    edges
}
