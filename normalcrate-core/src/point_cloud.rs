//! Point cloud data structures and functionality

use crate::error::{Error, Result};
use crate::point::*;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// A generic point cloud container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloud<T> {
    pub points: Vec<T>,
}

/// A point cloud with 3D points
pub type PointCloud3f = PointCloud<Point3f>;

/// A point cloud with normal vectors
pub type NormalPointCloud3f = PointCloud<NormalPoint3f>;

impl<T> PointCloud<T> {
    /// Create a new empty point cloud
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
        }
    }

    /// Create a point cloud from a vector of points
    pub fn from_points(points: Vec<T>) -> Self {
        Self { points }
    }

    /// Get the number of points in the cloud
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get an iterator over the points
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.points.iter()
    }

    /// Get a mutable iterator over the points
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.points.iter_mut()
    }
}

impl PointCloud<Point3f> {
    /// Build a cloud from externally loaded coordinate rows.
    ///
    /// Every row must hold exactly three finite values; the row position
    /// becomes the point index.
    ///
    /// # Example
    /// ```rust
    /// use normalcrate_core::PointCloud3f;
    ///
    /// let rows = vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]];
    /// let cloud = PointCloud3f::try_from_rows(&rows).unwrap();
    /// assert_eq!(cloud.len(), 2);
    ///
    /// assert!(PointCloud3f::try_from_rows(&[vec![1.0, 2.0]]).is_err());
    /// ```
    pub fn try_from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let points = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| match row.as_ref() {
                &[x, y, z] if x.is_finite() && y.is_finite() && z.is_finite() => {
                    Ok(Point3f::new(x, y, z))
                }
                &[_, _, _] => Err(Error::invalid_input(format!(
                    "row {} contains a non-finite coordinate",
                    idx
                ))),
                other => Err(Error::invalid_input(format!(
                    "row {} has {} coordinates, expected 3",
                    idx,
                    other.len()
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_points(points))
    }
}

impl PointCloud<NormalPoint3f> {
    /// Pair positions with normals index by index
    pub fn from_positions_and_normals(positions: &[Point3f], normals: &[Vector3f]) -> Result<Self> {
        if positions.len() != normals.len() {
            return Err(Error::invalid_input(format!(
                "{} positions but {} normals",
                positions.len(),
                normals.len()
            )));
        }

        Ok(positions
            .iter()
            .zip(normals)
            .map(|(&position, &normal)| NormalPoint3f::new(position, normal))
            .collect())
    }

    /// Copy of the point positions, in index order
    pub fn positions(&self) -> Vec<Point3f> {
        self.points.iter().map(|p| p.position).collect()
    }

    /// Copy of the normals, in index order
    pub fn normals(&self) -> Vec<Vector3f> {
        self.points.iter().map(|p| p.normal).collect()
    }
}

impl<T> Default for PointCloud<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for PointCloud<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl<T> IntoIterator for PointCloud<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a PointCloud<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl<T> FromIterator<T> for PointCloud<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            points: Vec::from_iter(iter),
        }
    }
}
