//! Spacing type for physical distances between voxels.

use nalgebra::Matrix4;
use super::Vector;

/// Spacing between adjacent voxels along each axis.
///
/// Type alias to Vector for semantic clarity.
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Create uniform spacing (same value for all dimensions).
    pub fn uniform(value: f64) -> Self {
        Self::new([value; D])
    }

    /// Get the minimum spacing value.
    pub fn min_spacing(&self) -> f64 {
        self.0.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    /// Get the maximum spacing value.
    pub fn max_spacing(&self) -> f64 {
        self.0.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }
}

impl Spacing<3> {
    /// Voxel sizes encoded in a voxel-to-world affine (column norms of its
    /// linear part).
    pub fn from_affine(affine: &Matrix4<f64>) -> Self {
        let linear = affine.fixed_view::<3, 3>(0, 0);
        Self::new([
            linear.column(0).norm(),
            linear.column(1).norm(),
            linear.column(2).norm(),
        ])
    }
}
