//! Volume type: a 3-D voxel array with its voxel-to-world affine.

use nalgebra::Matrix4;
use ndarray::Array3;
use crate::spatial::{Point, Spacing};
use super::Voxel;

/// A 3-D scalar image with physical metadata.
///
/// The affine maps homogeneous voxel indices `(i, j, k, 1)` to world
/// coordinates (usually millimetres).
///
/// # Examples
/// ```rust
/// use nalgebra::Matrix4;
/// use ndarray::Array3;
/// use voxreg_core::Volume;
///
/// let volume = Volume::new(Array3::<i16>::zeros((10, 10, 10)), Matrix4::identity());
/// assert_eq!(volume.shape(), [10, 10, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct Volume<T> {
    data: Array3<T>,
    affine: Matrix4<f64>,
}

impl<T: Voxel> Volume<T> {
    /// Create a volume from voxel data and a voxel-to-world affine.
    pub fn new(data: Array3<T>, affine: Matrix4<f64>) -> Self {
        Self { data, affine }
    }

    /// Create a volume whose voxel and world coordinates coincide.
    pub fn with_identity_affine(data: Array3<T>) -> Self {
        Self::new(data, Matrix4::identity())
    }

    /// Get the voxel data.
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    /// Get the voxel-to-world affine.
    pub fn affine(&self) -> &Matrix4<f64> {
        &self.affine
    }

    /// Get the volume shape.
    pub fn shape(&self) -> [usize; 3] {
        let (a, b, c) = self.data.dim();
        [a, b, c]
    }

    /// Total number of voxels.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the volume holds no voxel at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Physical voxel size along each axis.
    pub fn spacing(&self) -> Spacing<3> {
        Spacing::from_affine(&self.affine)
    }

    /// World-to-voxel affine, if the voxel-to-world affine is invertible.
    pub fn inverse_affine(&self) -> Option<Matrix4<f64>> {
        self.affine.try_inverse()
    }

    /// Map a continuous voxel index to world coordinates.
    pub fn index_to_world(&self, index: &Point<3>) -> Point<3> {
        index.transformed_by(&self.affine)
    }

    /// Map a world point to a continuous voxel index.
    ///
    /// Returns `None` when the affine is singular.
    pub fn world_to_index(&self, point: &Point<3>) -> Option<Point<3>> {
        self.inverse_affine().map(|inv| point.transformed_by(&inv))
    }

    /// Widen every voxel to `f64`, keeping the affine.
    pub fn to_f64(&self) -> Volume<f64> {
        Volume::new(self.data.mapv(|v| v.to_f64()), self.affine)
    }
}
