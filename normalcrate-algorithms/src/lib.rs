//! # normalcrate algorithms
//!
//! Consistent normal orientation for point clouds.
//!
//! The pipeline computes pairwise distances (directly or through a kd-tree),
//! joins every point to its k nearest neighbours, reduces that graph to a
//! minimum spanning forest and propagates normal polarity breadth-first
//! along the forest so that neighbouring normals agree.

pub mod distance;
pub mod nearest_neighbor;
pub mod knn_graph;
pub mod spanning_tree;
pub mod orientation;
pub mod pipeline;

// Re-export commonly used items
pub use distance::*;
pub use nearest_neighbor::*;
pub use knn_graph::*;
pub use spanning_tree::*;
pub use orientation::*;
pub use pipeline::*;
