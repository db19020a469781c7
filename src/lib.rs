//! # normalcrate
//!
//! Consistent normal orientation for 3D point clouds.
//!
//! This is the umbrella crate that re-exports the workspace members. Use the
//! individual crates for finer control over dependencies.
//!
//! ## Quick Start
//!
//! ```rust
//! use normalcrate::prelude::*;
//!
//! let points = vec![
//!     Point3f::new(0.0, 0.0, 0.0),
//!     Point3f::new(1.0, 0.0, 0.0),
//!     Point3f::new(0.0, 1.0, 0.0),
//! ];
//! let mut normals = vec![Vector3f::z(), -Vector3f::z(), Vector3f::z()];
//!
//! let config = OrientationConfig::default().with_k_neighbors(2);
//! let report = orient_normals(&points, &mut normals, &config).unwrap();
//! assert_eq!(report.flipped, 1);
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Enables core and algorithms
//! - `algorithms`: Distance, k-NN graph, spanning tree and orientation

// Re-export core functionality
pub use normalcrate_core::*;

// Re-export sub-crates
#[cfg(feature = "algorithms")]
pub use normalcrate_algorithms as algorithms;

/// Convenient imports for common use cases
pub mod prelude {
    pub use normalcrate_core::*;

    #[cfg(feature = "algorithms")]
    pub use normalcrate_algorithms::*;
}
