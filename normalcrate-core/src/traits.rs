//! Core traits for normalcrate

use crate::point::Point3f;

/// Trait for nearest neighbor search functionality
///
/// Results are `(index, distance)` pairs sorted by ascending distance, with
/// equal distances ordered by ascending index so that every backend returns
/// the same neighbours for the same query.
pub trait NearestNeighborSearch {
    /// Find the k nearest neighbors to a query point
    fn find_k_nearest(&self, query: &Point3f, k: usize) -> Vec<(usize, f32)>;

    /// Find all neighbors within a given radius
    fn find_radius_neighbors(&self, query: &Point3f, radius: f32) -> Vec<(usize, f32)>;

    /// Number of indexed points
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
