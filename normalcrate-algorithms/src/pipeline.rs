//! End-to-end consistent normal orientation
//!
//! k-NN graph → minimum spanning forest → breadth-first sign propagation.

use normalcrate_core::{Error, NormalPoint3f, Point3f, PointCloud, Result, Vector3f};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::distance::DistanceBackend;
use crate::knn_graph::{build_knn_graph_with, validate_points, KnnGraph};
use crate::nearest_neighbor::{BruteForceSearch, KdTree};
use crate::orientation::orient_forest;
use crate::spanning_tree::{build_mst_with, SpanningForest, SpanningTreeAlgorithm};

/// Parameters of the orientation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Neighbours per point in the k-NN graph
    pub k_neighbors: usize,
    /// Neighbourhood search strategy
    pub backend: DistanceBackend,
    /// Point whose normal is taken as correctly oriented
    pub root: usize,
    pub spanning_tree: SpanningTreeAlgorithm,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 10,
            backend: DistanceBackend::Exact,
            root: 0,
            spanning_tree: SpanningTreeAlgorithm::Kruskal,
        }
    }
}

impl OrientationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }

    pub fn with_backend(mut self, backend: DistanceBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_root(mut self, root: usize) -> Self {
        self.root = root;
        self
    }

    pub fn with_spanning_tree(mut self, algorithm: SpanningTreeAlgorithm) -> Self {
        self.spanning_tree = algorithm;
        self
    }

    /// Check the parameters against a cloud of `point_count` points.
    ///
    /// Clouds of zero or one point accept any positive `k` and any root for
    /// an empty cloud, since there is nothing to connect.
    pub fn validate(&self, point_count: usize) -> Result<()> {
        if self.k_neighbors == 0 {
            return Err(Error::invalid_input("k_neighbors must be greater than 0"));
        }
        if point_count >= 2 && self.k_neighbors >= point_count {
            return Err(Error::invalid_input(format!(
                "k_neighbors = {} must be below the point count {}",
                self.k_neighbors, point_count
            )));
        }
        if point_count > 0 && self.root >= point_count {
            return Err(Error::invalid_input(format!(
                "root {} is out of range for {} points",
                self.root, point_count
            )));
        }
        Ok(())
    }
}

/// Diagnostics of one pipeline run
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct OrientationReport {
    pub points: usize,
    pub graph_edges: usize,
    pub tree_edges: usize,
    /// Connected components of the k-NN graph; more than one means each was
    /// oriented independently
    pub components: usize,
    pub flipped: usize,
    pub tree_weight: f64,
}

impl OrientationReport {
    pub fn is_connected(&self) -> bool {
        self.components <= 1
    }
}

/// Build the k-NN graph for `points` with the configured backend
pub fn knn_graph_for(points: &[Point3f], config: &OrientationConfig) -> Result<KnnGraph> {
    match config.backend {
        DistanceBackend::Exact => {
            build_knn_graph_with(&BruteForceSearch::new(points), points, config.k_neighbors)
        }
        DistanceBackend::Indexed => {
            build_knn_graph_with(&KdTree::new(points), points, config.k_neighbors)
        }
    }
}

/// Build the spanning forest the pipeline propagates over
pub fn spanning_forest_for(points: &[Point3f], config: &OrientationConfig) -> Result<SpanningForest> {
    config.validate(points.len())?;
    let graph = knn_graph_for(points, config)?;
    Ok(build_mst_with(&graph, config.spanning_tree))
}

/// Make `normals` sign-consistent across the surface sampled by `points`.
///
/// `normals[i]` belongs to `points[i]`. Only polarities change. When the
/// neighbourhood graph falls apart into several components each one is
/// oriented on its own and the count is reported. On error `normals` is left
/// as it was.
///
/// # Example
/// ```rust
/// use normalcrate_core::{Point3f, Vector3f};
/// use normalcrate_algorithms::{orient_normals, OrientationConfig};
///
/// fn main() -> normalcrate_core::Result<()> {
///     let points = vec![
///         Point3f::new(0.0, 0.0, 0.0),
///         Point3f::new(1.0, 0.0, 0.0),
///         Point3f::new(0.0, 1.0, 0.0),
///         Point3f::new(0.0, 0.0, 1.0),
///     ];
///     let mut normals = vec![Vector3f::z(), -Vector3f::z(), Vector3f::z(), Vector3f::z()];
///
///     let config = OrientationConfig::default().with_k_neighbors(2);
///     let report = orient_normals(&points, &mut normals, &config)?;
///
///     assert_eq!(report.flipped, 1);
///     assert!(normals.iter().all(|n| *n == Vector3f::z()));
///     Ok(())
/// }
/// ```
pub fn orient_normals(
    points: &[Point3f],
    normals: &mut [Vector3f],
    config: &OrientationConfig,
) -> Result<OrientationReport> {
    if points.len() != normals.len() {
        return Err(Error::invalid_input(format!(
            "{} points but {} normals",
            points.len(),
            normals.len()
        )));
    }
    validate_points(points)?;
    config.validate(points.len())?;

    if points.is_empty() {
        return Ok(OrientationReport::default());
    }

    let graph = knn_graph_for(points, config)?;
    let forest = build_mst_with(&graph, config.spanning_tree);

    if !forest.is_spanning_tree() {
        info!(
            components = forest.component_count(),
            points = points.len(),
            k = config.k_neighbors,
            "k-NN graph is disconnected, orienting each component independently"
        );
    }

    let summary = orient_forest(&forest, normals, config.root)?;

    let report = OrientationReport {
        points: points.len(),
        graph_edges: graph.edge_count(),
        tree_edges: forest.edge_count(),
        components: forest.component_count(),
        flipped: summary.flipped_count(),
        tree_weight: forest.total_weight(),
    };
    debug!(?report, "normal orientation finished");
    Ok(report)
}

/// Extension trait orienting the normals stored in a point cloud
pub trait PointCloudOrientation {
    /// Flip stored normals so they agree along the cloud's spanning tree
    ///
    /// # Example
    /// ```rust
    /// use normalcrate_core::{NormalPoint3f, Point3f, PointCloud, Vector3f};
    /// use normalcrate_algorithms::{OrientationConfig, PointCloudOrientation};
    ///
    /// let mut cloud = PointCloud::from_points(vec![
    ///     NormalPoint3f::new(Point3f::new(0.0, 0.0, 0.0), Vector3f::z()),
    ///     NormalPoint3f::new(Point3f::new(1.0, 0.0, 0.0), -Vector3f::z()),
    /// ]);
    ///
    /// let config = OrientationConfig::default().with_k_neighbors(1);
    /// cloud.orient_normals_consistent(&config).unwrap();
    /// assert_eq!(cloud[1].normal, Vector3f::z());
    /// ```
    fn orient_normals_consistent(&mut self, config: &OrientationConfig) -> Result<OrientationReport>;
}

impl PointCloudOrientation for PointCloud<NormalPoint3f> {
    fn orient_normals_consistent(&mut self, config: &OrientationConfig) -> Result<OrientationReport> {
        let positions = self.positions();
        let mut normals = self.normals();
        let report = orient_normals(&positions, &mut normals, config)?;

        for (point, normal) in self.iter_mut().zip(normals) {
            point.normal = normal;
        }
        Ok(report)
    }
}
