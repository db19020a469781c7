//! Pairwise distance computation
//!
//! Builds the dense N×N Euclidean distance matrix of a point set, either by
//! direct evaluation of every pair or through a kd-tree queried once per
//! point. Both backends produce the same matrix up to floating point
//! rounding; the indexed one exists so the two search strategies can be
//! compared on the same workload.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use normalcrate_core::{Point3f, PointCloud, Result};
use serde::{Deserialize, Serialize};

use crate::nearest_neighbor::KdTree;

/// How pairwise distances and neighbourhoods are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceBackend {
    /// Direct evaluation of every pair
    #[default]
    Exact,
    /// Queries through a kd-tree built once over the points
    Indexed,
}

/// Symmetric matrix of pairwise Euclidean distances with a zero diagonal
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    distances: Array2<f32>,
}

impl DistanceMatrix {
    /// Number of points the matrix covers
    pub fn len(&self) -> usize {
        self.distances.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distance between points `i` and `j`
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.distances[[i, j]]
    }

    /// All distances from point `i`, indexed by the other point
    pub fn row(&self, i: usize) -> ndarray::ArrayView1<'_, f32> {
        self.distances.row(i)
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.distances
    }
}

/// Compute the pairwise distance matrix of `points`.
///
/// An empty slice yields an empty 0×0 matrix.
///
/// # Example
/// ```rust
/// use normalcrate_core::Point3f;
/// use normalcrate_algorithms::{compute_distances, DistanceBackend};
///
/// let points = vec![Point3f::new(0.0, 0.0, 0.0), Point3f::new(3.0, 4.0, 0.0)];
/// let matrix = compute_distances(&points, DistanceBackend::Indexed);
/// assert_eq!(matrix.get(0, 1), 5.0);
/// assert_eq!(matrix.get(1, 1), 0.0);
/// ```
pub fn compute_distances(points: &[Point3f], backend: DistanceBackend) -> DistanceMatrix {
    let n = points.len();
    let mut distances = Array2::<f32>::zeros((n, n));
    if n == 0 {
        return DistanceMatrix { distances };
    }

    match backend {
        DistanceBackend::Exact => {
            distances
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(i, mut row)| {
                    for (j, slot) in row.iter_mut().enumerate() {
                        if i != j {
                            *slot = (points[i] - points[j]).norm();
                        }
                    }
                });
        }
        DistanceBackend::Indexed => {
            let kdtree = KdTree::new(points);
            distances
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(i, mut row)| {
                    let mut squared = vec![0.0f32; n];
                    kdtree.squared_distances_to_all(&points[i], &mut squared);
                    for (j, (slot, d)) in row.iter_mut().zip(squared).enumerate() {
                        if i != j {
                            *slot = d.sqrt();
                        }
                    }
                });
        }
    }

    DistanceMatrix { distances }
}

/// Compute the distance matrix of externally loaded coordinate rows.
///
/// Fails with `InvalidInput` when a row does not hold exactly three finite
/// values.
pub fn compute_distances_from_rows<R: AsRef<[f32]>>(
    rows: &[R],
    backend: DistanceBackend,
) -> Result<DistanceMatrix> {
    let cloud = PointCloud::<Point3f>::try_from_rows(rows)?;
    Ok(compute_distances(&cloud.points, backend))
}
