//! Core data structures and traits for normalcrate
//!
//! This crate provides the fundamental types shared by the normal orientation
//! pipeline: points, point clouds, the nearest neighbour search trait and the
//! common error type.

pub mod point;
pub mod point_cloud;
pub mod traits;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};

// Type aliases for easier imports
pub type Point = Point3f;
pub type Normal = Vector3f;
