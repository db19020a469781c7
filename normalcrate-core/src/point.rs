//! Point types and related functionality

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use bytemuck::{Pod, Zeroable};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A point with normal vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct NormalPoint3f {
    pub position: Point3f,
    pub normal: Vector3f,
}

unsafe impl Pod for NormalPoint3f {}
unsafe impl Zeroable for NormalPoint3f {}

impl NormalPoint3f {
    pub fn new(position: Point3f, normal: Vector3f) -> Self {
        Self { position, normal }
    }

    /// Reverse the polarity of the normal, leaving its magnitude untouched
    pub fn flip_normal(&mut self) {
        self.normal = -self.normal;
    }
}

impl Default for NormalPoint3f {
    fn default() -> Self {
        Self {
            position: Point3f::origin(),
            normal: Vector3f::new(0.0, 0.0, 1.0),
        }
    }
}

impl From<NormalPoint3f> for Point3f {
    fn from(point: NormalPoint3f) -> Self {
        point.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_point_layout_is_six_floats() {
        let points = [
            NormalPoint3f::new(Point3f::new(1.0, 2.0, 3.0), Vector3f::new(0.0, 0.0, 1.0)),
            NormalPoint3f::default(),
        ];
        let floats: &[f32] = bytemuck::cast_slice(&points);
        assert_eq!(floats.len(), 12);
        assert_eq!(&floats[..6], &[1.0, 2.0, 3.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_flip_normal_is_exact_negation() {
        let mut point = NormalPoint3f::new(Point3f::origin(), Vector3f::new(0.6, -0.8, 0.0));
        point.flip_normal();
        assert_eq!(point.normal, Vector3f::new(-0.6, 0.8, -0.0));
        assert_eq!(point.normal.norm(), Vector3f::new(0.6, -0.8, 0.0).norm());
    }
}
