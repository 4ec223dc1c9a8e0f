//! Point type for representing spatial coordinates.
//!
//! Points represent positions either in voxel index space or in world
//! (physical) space; the surrounding API says which.

use nalgebra::{Matrix4, Point as NaPoint};
use serde::{Deserialize, Serialize};
use super::Vector;

/// A point in D-dimensional space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<const D: usize>(pub NaPoint<f64, D>);

impl<const D: usize> Point<D> {
    /// Create a new point from coordinates.
    pub fn new(coords: [f64; D]) -> Self {
        Self(NaPoint::from(coords))
    }

    /// Create a point at the origin (all coordinates zero).
    pub fn origin() -> Self {
        Self(NaPoint::origin())
    }

    /// Coordinates as a plain array.
    pub fn to_array(&self) -> [f64; D] {
        let mut out = [0.0; D];
        for (dst, src) in out.iter_mut().zip(self.0.coords.iter()) {
            *dst = *src;
        }
        out
    }

    /// Get the inner nalgebra point.
    pub fn inner(&self) -> &NaPoint<f64, D> {
        &self.0
    }
}

impl Point<3> {
    /// Map the point through a homogeneous 4x4 matrix.
    pub fn transformed_by(&self, matrix: &Matrix4<f64>) -> Self {
        Self(matrix.transform_point(&self.0))
    }
}

impl<const D: usize> Default for Point<D> {
    fn default() -> Self {
        Self::origin()
    }
}

impl<const D: usize> std::ops::Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Point<D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const D: usize> std::ops::Sub for Point<D> {
    type Output = Vector<D>;

    fn sub(self, other: Self) -> Self::Output {
        Vector(self.0 - other.0)
    }
}

impl<const D: usize> std::ops::Add<Vector<D>> for Point<D> {
    type Output = Self;

    fn add(self, other: Vector<D>) -> Self::Output {
        Self(self.0 + other.0)
    }
}
