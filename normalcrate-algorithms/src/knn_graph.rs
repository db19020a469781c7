//! Symmetric k-nearest-neighbour graphs over point indices

use std::cmp::Ordering;
use std::collections::BTreeMap;

use normalcrate_core::{Error, NearestNeighborSearch, Point3f, Result};
use rayon::prelude::*;
use tracing::debug;

use crate::distance::DistanceMatrix;
use crate::nearest_neighbor::BruteForceSearch;

/// Undirected weighted edge between two point indices, stored with `a < b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
    pub weight: f32,
}

impl Edge {
    /// Build an edge with its endpoints in ascending order
    pub fn new(i: usize, j: usize, weight: f32) -> Self {
        let (a, b) = if i <= j { (i, j) } else { (j, i) };
        Self { a, b, weight }
    }

    /// Selection order used by the spanning tree builders: lighter first,
    /// then the edge touching the lower index.
    pub fn selection_order(&self, other: &Self) -> Ordering {
        self.weight
            .total_cmp(&other.weight)
            .then(self.a.cmp(&other.a))
            .then(self.b.cmp(&other.b))
    }
}

/// Weighted undirected graph where each point is joined to its k nearest
/// neighbours, symmetrized so that `i ~ j` whenever either lists the other.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnGraph {
    node_count: usize,
    k: usize,
    edges: Vec<Edge>,
}

impl KnnGraph {
    /// Assemble a graph from each node's neighbour list.
    ///
    /// Edge weights are taken from the first listing of a pair; the reverse
    /// listing reuses it.
    fn from_neighbor_lists(node_count: usize, k: usize, lists: Vec<Vec<(usize, f32)>>) -> Self {
        let mut unique: BTreeMap<(usize, usize), f32> = BTreeMap::new();
        for (i, neighbors) in lists.into_iter().enumerate() {
            for (j, weight) in neighbors {
                let edge = Edge::new(i, j, weight);
                unique.entry((edge.a, edge.b)).or_insert(edge.weight);
            }
        }

        let edges: Vec<Edge> = unique
            .into_iter()
            .map(|((a, b), weight)| Edge { a, b, weight })
            .collect();

        debug!(nodes = node_count, k, edges = edges.len(), "built k-NN graph");

        Self { node_count, k, edges }
    }

    /// Build the k-NN graph from a precomputed distance matrix.
    pub fn from_distances(matrix: &DistanceMatrix, k: usize) -> Result<Self> {
        let n = matrix.len();
        validate_k(n, k)?;
        if n <= 1 {
            return Ok(Self { node_count: n, k, edges: Vec::new() });
        }

        let lists: Vec<Vec<(usize, f32)>> = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut row: Vec<(usize, f32)> = matrix
                    .row(i)
                    .iter()
                    .enumerate()
                    .filter(|&(j, _)| j != i)
                    .map(|(j, &d)| (j, d))
                    .collect();
                row.sort_by(|x, y| x.1.total_cmp(&y.1).then(x.0.cmp(&y.0)));
                row.truncate(k);
                row
            })
            .collect();

        Ok(Self::from_neighbor_lists(n, k, lists))
    }

    /// Complete graph over all pairs of a distance matrix.
    ///
    /// Its minimum spanning tree is the all-pairs Euclidean MST.
    pub fn complete(matrix: &DistanceMatrix) -> Self {
        let n = matrix.len();
        let mut edges = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for a in 0..n {
            for b in (a + 1)..n {
                edges.push(Edge { a, b, weight: matrix.get(a, b) });
            }
        }
        Self { node_count: n, k: n.saturating_sub(1), edges }
    }

    /// Build a graph directly from an edge list, e.g. one produced by an
    /// external neighbourhood query.
    pub fn from_edges(node_count: usize, edges: impl IntoIterator<Item = Edge>) -> Result<Self> {
        let mut unique: BTreeMap<(usize, usize), f32> = BTreeMap::new();
        for edge in edges {
            let edge = Edge::new(edge.a, edge.b, edge.weight);
            if edge.b >= node_count {
                return Err(Error::invalid_input(format!(
                    "edge ({}, {}) references a node outside 0..{}",
                    edge.a, edge.b, node_count
                )));
            }
            if edge.a == edge.b {
                return Err(Error::invalid_input(format!("self-loop on node {}", edge.a)));
            }
            if edge.weight.is_nan() || edge.weight < 0.0 {
                return Err(Error::invalid_input(format!(
                    "edge ({}, {}) has invalid weight {}",
                    edge.a, edge.b, edge.weight
                )));
            }
            unique.entry((edge.a, edge.b)).or_insert(edge.weight);
        }

        let edges = unique
            .into_iter()
            .map(|((a, b), weight)| Edge { a, b, weight })
            .collect();
        Ok(Self { node_count, k: 0, edges })
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Neighbour count the graph was built with
    pub fn k(&self) -> usize {
        self.k
    }

    /// Edges sorted by `(a, b)`
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges incident to each node
    pub fn degrees(&self) -> Vec<usize> {
        let mut degrees = vec![0; self.node_count];
        for edge in &self.edges {
            degrees[edge.a] += 1;
            degrees[edge.b] += 1;
        }
        degrees
    }
}

fn validate_k(n: usize, k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::invalid_input("k must be greater than 0"));
    }
    if n >= 2 && k >= n {
        return Err(Error::invalid_input(format!(
            "k = {} requires more than {} points",
            k, n
        )));
    }
    Ok(())
}

/// Reject points with a NaN or infinite coordinate
pub(crate) fn validate_points(points: &[Point3f]) -> Result<()> {
    match points.iter().position(|p| !p.coords.iter().all(|c| c.is_finite())) {
        Some(idx) => Err(Error::invalid_input(format!(
            "point {} has a non-finite coordinate",
            idx
        ))),
        None => Ok(()),
    }
}

/// Build the k-NN graph of `points` with exact distances.
///
/// # Example
/// ```rust
/// use normalcrate_core::Point3f;
/// use normalcrate_algorithms::build_knn_graph;
///
/// fn main() -> normalcrate_core::Result<()> {
///     let points = vec![
///         Point3f::new(0.0, 0.0, 0.0),
///         Point3f::new(1.0, 0.0, 0.0),
///         Point3f::new(5.0, 0.0, 0.0),
///     ];
///     let graph = build_knn_graph(&points, 1)?;
///     // 0 ~ 1 mutually, 2 picks 1
///     assert_eq!(graph.edge_count(), 2);
///     Ok(())
/// }
/// ```
pub fn build_knn_graph(points: &[Point3f], k: usize) -> Result<KnnGraph> {
    build_knn_graph_with(&BruteForceSearch::new(points), points, k)
}

/// Build the k-NN graph of `points` using `search`, which must index the
/// same points in the same order.
pub fn build_knn_graph_with<S>(search: &S, points: &[Point3f], k: usize) -> Result<KnnGraph>
where
    S: NearestNeighborSearch + Sync,
{
    let n = points.len();
    if search.len() != n {
        return Err(Error::invalid_input(format!(
            "search structure indexes {} points, cloud has {}",
            search.len(),
            n
        )));
    }
    validate_k(n, k)?;
    validate_points(points)?;
    if n <= 1 {
        return Ok(KnnGraph { node_count: n, k, edges: Vec::new() });
    }

    let lists: Vec<Vec<(usize, f32)>> = points
        .par_iter()
        .enumerate()
        .map(|(i, point)| {
            // +1 for the point itself, which may not come first when other
            // points coincide with it.
            let mut neighbors = search.find_k_nearest(point, k + 1);
            neighbors.retain(|&(idx, _)| idx != i);
            neighbors.truncate(k);
            neighbors
        })
        .collect();

    Ok(KnnGraph::from_neighbor_lists(n, k, lists))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{compute_distances, DistanceBackend};
    use crate::nearest_neighbor::KdTree;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn tetrahedron_corner() -> Vec<Point3f> {
        vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
            Point3f::new(0.0, 1.0, 0.0),
            Point3f::new(0.0, 0.0, 1.0),
        ]
    }

    #[test]
    fn test_invalid_k() {
        let points = tetrahedron_corner();
        assert!(matches!(build_knn_graph(&points, 0), Err(Error::InvalidInput(_))));
        assert!(matches!(build_knn_graph(&points, 4), Err(Error::InvalidInput(_))));
        assert!(build_knn_graph(&points, 3).is_ok());
    }

    #[test]
    fn test_empty_and_single_point() {
        let empty = build_knn_graph(&[], 10).unwrap();
        assert_eq!(empty.node_count(), 0);
        assert_eq!(empty.edge_count(), 0);

        let single = build_knn_graph(&[Point3f::origin()], 10).unwrap();
        assert_eq!(single.node_count(), 1);
        assert_eq!(single.edge_count(), 0);
    }

    #[test]
    fn test_tie_break_by_index() {
        // Points 1, 2, 3 are all at distance 1 from point 0.
        let graph = build_knn_graph(&tetrahedron_corner(), 2).unwrap();
        let from_zero: Vec<usize> = graph
            .edges()
            .iter()
            .filter(|e| e.a == 0)
            .map(|e| e.b)
            .collect();
        // 0 lists 1 and 2; 3 lists 0 (its nearest) which adds 0 ~ 3.
        assert_eq!(from_zero, vec![1, 2, 3]);
    }

    #[test]
    fn test_symmetrized_without_self_loops() {
        let mut rng = StdRng::seed_from_u64(3);
        let points: Vec<Point3f> = (0..80)
            .map(|_| Point3f::new(rng.gen(), rng.gen(), rng.gen()))
            .collect();
        let k = 5;
        let graph = build_knn_graph(&points, k).unwrap();

        assert!(graph.edges().iter().all(|e| e.a < e.b));
        assert!(graph.degrees().iter().all(|&d| d >= k));
        assert!(graph.edge_count() >= (points.len() * k + 1) / 2);

        let mut keys: Vec<(usize, usize)> = graph.edges().iter().map(|e| (e.a, e.b)).collect();
        keys.dedup();
        assert_eq!(keys.len(), graph.edge_count());
    }

    #[test]
    fn test_weights_are_pairwise_distances() {
        let points = tetrahedron_corner();
        let graph = build_knn_graph(&points, 3).unwrap();
        let matrix = compute_distances(&points, DistanceBackend::Exact);
        for edge in graph.edges() {
            assert!((edge.weight - matrix.get(edge.a, edge.b)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_matrix_search_and_index_paths_agree() {
        let mut rng = StdRng::seed_from_u64(11);
        let points: Vec<Point3f> = (0..120)
            .map(|_| Point3f::new(rng.gen(), rng.gen(), rng.gen()))
            .collect();
        let matrix = compute_distances(&points, DistanceBackend::Exact);

        let from_matrix = KnnGraph::from_distances(&matrix, 6).unwrap();
        let from_brute = build_knn_graph(&points, 6).unwrap();
        let from_kdtree = build_knn_graph_with(&KdTree::new(&points), &points, 6).unwrap();

        let keys = |g: &KnnGraph| g.edges().iter().map(|e| (e.a, e.b)).collect::<Vec<_>>();
        assert_eq!(keys(&from_matrix), keys(&from_brute));
        assert_eq!(keys(&from_kdtree), keys(&from_brute));
    }

    #[test]
    fn test_coincident_points_keep_zero_weight_edge() {
        let points = vec![
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(0.0, 0.0, 0.0),
            Point3f::new(1.0, 0.0, 0.0),
        ];
        let graph = build_knn_graph(&points, 1).unwrap();
        assert!(graph.edges().iter().any(|e| e.a == 0 && e.b == 1 && e.weight == 0.0));
    }

    #[test]
    fn test_kdtree_graph_on_plane_with_duplicates() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut points: Vec<Point3f> = (0..150)
            .map(|_| Point3f::new(rng.gen(), rng.gen(), 0.0))
            .collect();
        points.extend(vec![Point3f::new(0.25, 0.75, 0.0); 40]);

        let from_brute = build_knn_graph(&points, 5).unwrap();
        let from_kdtree = build_knn_graph_with(&KdTree::new(&points), &points, 5).unwrap();
        assert_eq!(from_kdtree, from_brute);

        // duplicates are joined to each other at zero weight
        assert!(from_kdtree
            .edges()
            .iter()
            .filter(|e| e.a >= 150)
            .all(|e| e.weight == 0.0 && e.b >= 150));
    }

    #[test]
    fn test_non_finite_point_rejected() {
        let mut points = tetrahedron_corner();
        points[2].x = f32::NAN;
        assert!(matches!(build_knn_graph(&points, 2), Err(Error::InvalidInput(_))));

        points[2].x = f32::INFINITY;
        let result = build_knn_graph_with(&KdTree::new(&points), &points, 2);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_search_length_mismatch() {
        let points = tetrahedron_corner();
        let search = BruteForceSearch::new(&points[..2]);
        assert!(build_knn_graph_with(&search, &points, 1).is_err());
    }

    #[test]
    fn test_complete_graph() {
        let matrix = compute_distances(&tetrahedron_corner(), DistanceBackend::Exact);
        let graph = KnnGraph::complete(&matrix);
        assert_eq!(graph.edge_count(), 6);
    }

    #[test]
    fn test_from_edges_rejects_bad_edges() {
        assert!(KnnGraph::from_edges(2, [Edge::new(0, 2, 1.0)]).is_err());
        assert!(KnnGraph::from_edges(2, [Edge::new(1, 1, 1.0)]).is_err());
        assert!(KnnGraph::from_edges(2, [Edge::new(0, 1, f32::NAN)]).is_err());
        let graph = KnnGraph::from_edges(2, [Edge::new(1, 0, 1.0), Edge::new(0, 1, 2.0)]).unwrap();
        assert_eq!(graph.edges(), &[Edge { a: 0, b: 1, weight: 1.0 }]);
    }
}
