//! Sign-consistent normal orientation over a spanning forest
//!
//! Starting from a root whose normal is taken as correct, a breadth-first
//! walk over the tree compares each newly reached node with the node it was
//! reached from and negates the new node's normal when the two point into
//! opposite half-spaces. Each node is fixed exactly once; the walk order is
//! FIFO with neighbours visited by ascending index, so the outcome depends
//! only on the tree and the root.

use std::collections::VecDeque;

use normalcrate_core::{Error, Result, Vector3f};
use tracing::debug;

use crate::spanning_tree::SpanningForest;

/// Normals shorter than this cannot be oriented
pub const MIN_NORMAL_LENGTH: f32 = 1e-6;

/// Outcome of orienting one component
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Propagation {
    /// Root the component was oriented from
    pub root: usize,
    /// Nodes in the order they were fixed, root first
    pub order: Vec<usize>,
    /// Nodes whose normal was negated, in the order they were fixed
    pub flipped: Vec<usize>,
}

/// Outcome of orienting every component of a forest
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrientationSummary {
    pub components: Vec<Propagation>,
}

impl OrientationSummary {
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Total number of negated normals
    pub fn flipped_count(&self) -> usize {
        self.components.iter().map(|c| c.flipped.len()).sum()
    }
}

fn validate(forest: &SpanningForest, normals: &[Vector3f], root: usize) -> Result<()> {
    if forest.node_count() != normals.len() {
        return Err(Error::invalid_input(format!(
            "spanning forest covers {} nodes but {} normals were given",
            forest.node_count(),
            normals.len()
        )));
    }
    if root >= normals.len() {
        return Err(Error::invalid_input(format!(
            "root {} is out of range for {} points",
            root,
            normals.len()
        )));
    }
    if let Some((idx, normal)) = normals
        .iter()
        .enumerate()
        .find(|(_, n)| !n.iter().all(|c| c.is_finite()) || n.norm() < MIN_NORMAL_LENGTH)
    {
        return Err(Error::invalid_input(format!(
            "normal {} ({}, {}, {}) is degenerate",
            idx, normal.x, normal.y, normal.z
        )));
    }
    Ok(())
}

/// Walk one component from `root`, reusing preallocated traversal state.
fn walk(
    adjacency: &[Vec<usize>],
    normals: &mut [Vector3f],
    root: usize,
    fixed: &mut [bool],
    frontier: &mut VecDeque<usize>,
) -> Propagation {
    let mut propagation = Propagation {
        root,
        ..Default::default()
    };

    fixed[root] = true;
    frontier.push_back(root);

    while let Some(current) = frontier.pop_front() {
        propagation.order.push(current);
        let reference = normals[current];

        for &neighbor in &adjacency[current] {
            if fixed[neighbor] {
                continue;
            }
            if reference.dot(&normals[neighbor]) < 0.0 {
                normals[neighbor] = -normals[neighbor];
                propagation.flipped.push(neighbor);
            }
            fixed[neighbor] = true;
            frontier.push_back(neighbor);
        }
    }

    propagation
}

/// Orient the component of `forest` that contains `root`.
///
/// The root's normal is never changed. Nodes in other components are left
/// untouched. Nothing is modified when an error is returned.
///
/// # Example
/// ```rust
/// use normalcrate_core::{Point3f, Vector3f};
/// use normalcrate_algorithms::{build_knn_graph, build_mst, propagate_orientation};
///
/// fn main() -> normalcrate_core::Result<()> {
///     let points = vec![
///         Point3f::new(0.0, 0.0, 0.0),
///         Point3f::new(1.0, 0.0, 0.0),
///         Point3f::new(2.0, 0.0, 0.0),
///     ];
///     let mut normals = vec![Vector3f::z(), -Vector3f::z(), Vector3f::z()];
///
///     let forest = build_mst(&build_knn_graph(&points, 1)?);
///     let result = propagate_orientation(&forest, &mut normals, 0)?;
///
///     assert_eq!(result.flipped, vec![1]);
///     assert!(normals.iter().all(|n| n.z > 0.0));
///     Ok(())
/// }
/// ```
pub fn propagate_orientation(
    forest: &SpanningForest,
    normals: &mut [Vector3f],
    root: usize,
) -> Result<Propagation> {
    validate(forest, normals, root)?;

    let adjacency = forest.adjacency();
    let mut fixed = vec![false; normals.len()];
    let mut frontier = VecDeque::with_capacity(normals.len());

    let propagation = walk(&adjacency, normals, root, &mut fixed, &mut frontier);
    debug!(
        root,
        visited = propagation.order.len(),
        flipped = propagation.flipped.len(),
        "propagated normal orientation"
    );
    Ok(propagation)
}

/// Orient every component of `forest`.
///
/// The component containing `root` is walked from `root`; every other
/// component is walked from its lowest index. Components are oriented
/// independently of each other. An empty forest with no normals is accepted
/// and yields an empty summary.
pub fn orient_forest(
    forest: &SpanningForest,
    normals: &mut [Vector3f],
    root: usize,
) -> Result<OrientationSummary> {
    if normals.is_empty() && forest.node_count() == 0 {
        return Ok(OrientationSummary::default());
    }
    validate(forest, normals, root)?;

    let adjacency = forest.adjacency();
    let mut fixed = vec![false; normals.len()];
    let mut frontier = VecDeque::with_capacity(normals.len());

    let root_component = forest.component_of(root);
    let roots = std::iter::once(root).chain(
        forest
            .component_roots()
            .iter()
            .enumerate()
            .filter(|&(component, _)| component != root_component)
            .map(|(_, &r)| r),
    );

    let mut summary = OrientationSummary::default();
    for r in roots {
        summary
            .components
            .push(walk(&adjacency, normals, r, &mut fixed, &mut frontier));
    }

    debug!(
        root,
        components = summary.component_count(),
        flipped = summary.flipped_count(),
        "oriented spanning forest"
    );
    Ok(summary)
}

/// True when every tree edge joins normals with a non-negative dot product.
/// A normal slice that does not match the forest is never consistent.
pub fn is_consistent(forest: &SpanningForest, normals: &[Vector3f]) -> bool {
    forest.node_count() == normals.len()
        && forest
            .edges()
            .iter()
            .all(|edge| normals[edge.a].dot(&normals[edge.b]) >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knn_graph::{Edge, KnnGraph};
    use crate::spanning_tree::build_mst;

    fn path_forest(n: usize) -> SpanningForest {
        let edges = (1..n).map(|i| Edge::new(i - 1, i, 1.0));
        build_mst(&KnnGraph::from_edges(n, edges).unwrap())
    }

    fn star_forest(n: usize) -> SpanningForest {
        let edges = (1..n).map(|i| Edge::new(0, i, i as f32));
        build_mst(&KnnGraph::from_edges(n, edges).unwrap())
    }

    #[test]
    fn test_root_is_never_flipped() {
        let forest = path_forest(3);
        let mut normals = vec![-Vector3f::z(), Vector3f::z(), Vector3f::z()];
        let result = propagate_orientation(&forest, &mut normals, 0).unwrap();
        assert_eq!(normals, vec![-Vector3f::z(); 3]);
        assert_eq!(result.flipped, vec![1, 2]);
    }

    #[test]
    fn test_alternating_path() {
        let forest = path_forest(5);
        let mut normals: Vec<Vector3f> = (0..5)
            .map(|i| if i % 2 == 0 { Vector3f::x() } else { -Vector3f::x() })
            .collect();
        let result = propagate_orientation(&forest, &mut normals, 2).unwrap();
        assert!(normals.iter().all(|n| *n == Vector3f::x()));
        assert_eq!(result.order, vec![2, 1, 3, 0, 4]);
        assert_eq!(result.flipped, vec![1, 3]);
    }

    #[test]
    fn test_each_node_enqueued_once() {
        let forest = star_forest(6);
        let mut normals = vec![Vector3f::y(); 6];
        let result = propagate_orientation(&forest, &mut normals, 3).unwrap();

        let mut seen = result.order.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), result.order.len());
        assert_eq!(result.order, vec![3, 0, 1, 2, 4, 5]);
    }

    #[test]
    fn test_orthogonal_normal_is_not_flipped() {
        let forest = path_forest(2);
        let mut normals = vec![Vector3f::x(), Vector3f::y()];
        let result = propagate_orientation(&forest, &mut normals, 0).unwrap();
        assert!(result.flipped.is_empty());
    }

    #[test]
    fn test_magnitude_preserved() {
        let forest = path_forest(2);
        let original = Vector3f::new(-0.3, -0.4, -0.5);
        let mut normals = vec![Vector3f::new(0.3, 0.4, 0.5), original];
        propagate_orientation(&forest, &mut normals, 0).unwrap();
        assert_eq!(normals[1], -original);
        assert_eq!(normals[1].norm(), original.norm());
    }

    #[test]
    fn test_idempotent() {
        let forest = path_forest(6);
        let mut normals: Vec<Vector3f> = (0..6)
            .map(|i| if i % 3 == 0 { Vector3f::z() } else { -Vector3f::z() })
            .collect();
        propagate_orientation(&forest, &mut normals, 0).unwrap();
        let first = normals.clone();
        let second = propagate_orientation(&forest, &mut normals, 0).unwrap();
        assert!(second.flipped.is_empty());
        assert_eq!(normals, first);
    }

    #[test]
    fn test_invalid_root() {
        let forest = path_forest(3);
        let mut normals = vec![Vector3f::z(); 3];
        assert!(matches!(
            propagate_orientation(&forest, &mut normals, 3),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let forest = path_forest(3);
        let mut normals = vec![Vector3f::z(); 4];
        assert!(propagate_orientation(&forest, &mut normals, 0).is_err());
    }

    #[test]
    fn test_consistency_requires_matching_lengths() {
        let forest = path_forest(3);
        assert!(is_consistent(&forest, &[Vector3f::z(); 3]));
        assert!(!is_consistent(&forest, &[Vector3f::z(); 2]));
        assert!(!is_consistent(&forest, &[]));
    }

    #[test]
    fn test_degenerate_normal_rejected_without_changes() {
        let forest = path_forest(3);
        let mut normals = vec![Vector3f::z(), -Vector3f::z(), Vector3f::zeros()];
        let before = normals.clone();
        assert!(matches!(
            propagate_orientation(&forest, &mut normals, 0),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(normals, before);

        let mut nan = vec![Vector3f::z(), Vector3f::new(f32::NAN, 0.0, 1.0), Vector3f::z()];
        assert!(propagate_orientation(&forest, &mut nan, 0).is_err());
    }

    #[test]
    fn test_other_components_untouched_by_single_propagation() {
        let graph = KnnGraph::from_edges(4, [Edge::new(0, 1, 1.0), Edge::new(2, 3, 1.0)]).unwrap();
        let forest = build_mst(&graph);
        let mut normals = vec![Vector3f::z(), -Vector3f::z(), Vector3f::z(), -Vector3f::z()];
        propagate_orientation(&forest, &mut normals, 0).unwrap();
        assert_eq!(normals[3], -Vector3f::z());
    }

    #[test]
    fn test_orient_forest_roots() {
        let graph = KnnGraph::from_edges(
            5,
            [Edge::new(0, 1, 1.0), Edge::new(2, 3, 1.0), Edge::new(3, 4, 1.0)],
        )
        .unwrap();
        let forest = build_mst(&graph);
        let mut normals = vec![Vector3f::z(), -Vector3f::z(), Vector3f::z(), -Vector3f::z(), -Vector3f::z()];

        let summary = orient_forest(&forest, &mut normals, 3).unwrap();
        let roots: Vec<usize> = summary.components.iter().map(|c| c.root).collect();
        assert_eq!(roots, vec![3, 0]);
        assert_eq!(summary.flipped_count(), 2);
        assert!(is_consistent(&forest, &normals));
        // root 3 keeps its sign, so its component points down
        assert_eq!(normals[2], -Vector3f::z());
        assert_eq!(normals[1], Vector3f::z());
    }

    #[test]
    fn test_orient_forest_empty() {
        let forest = build_mst(&KnnGraph::from_edges(0, []).unwrap());
        let summary = orient_forest(&forest, &mut [], 0).unwrap();
        assert_eq!(summary.component_count(), 0);
    }

    #[test]
    fn test_single_node_untouched() {
        let forest = build_mst(&KnnGraph::from_edges(1, []).unwrap());
        let mut normals = vec![-Vector3f::x()];
        let summary = orient_forest(&forest, &mut normals, 0).unwrap();
        assert_eq!(summary.component_count(), 1);
        assert_eq!(normals[0], -Vector3f::x());
    }
}
