//! Affine transform implementation.
//!
//! This module provides a 12-parameter affine transform built from
//! translation, rotation, anisotropic scaling and shearing.

use nalgebra::{DVector, Matrix3, Matrix4};
use serde::{Deserialize, Serialize};
use crate::spatial::Point;
use super::trait_::{centered_matrix, copy_parameters, euler_rotation, ParameterKind, Transform};

/// Affine Transform (Linear transformation + Translation).
///
/// Parameters, in order:
/// * `[0..3]` translation in world units
/// * `[3..6]` Euler angles in radians
/// * `[6..9]` log scale factors (0 means unit scale)
/// * `[9..12]` shears `(xy, xz, yz)`
///
/// The linear part is `A = R * K * S` with `S = diag(exp(s))` and `K` the
/// unit upper-triangular shear matrix, applied about a fixed center:
/// T(x) = A(x - c) + c + t
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    params: [f64; 12],
    center: Point<3>,
}

impl AffineTransform {
    /// Create an affine transform from its raw parameter array.
    pub fn new(params: [f64; 12], center: Point<3>) -> Self {
        Self { params, center }
    }

    /// Identity transform about the world origin.
    pub fn identity() -> Self {
        Self::new([0.0; 12], Point::origin())
    }

    /// Replace the fixed center.
    pub fn with_center(mut self, center: Point<3>) -> Self {
        self.center = center;
        self
    }

    /// Get the center of rotation/scaling.
    pub fn center(&self) -> &Point<3> {
        &self.center
    }

    /// Linear (3x3) part of the transform.
    pub fn linear(&self) -> Matrix3<f64> {
        let p = &self.params;
        let rotation = euler_rotation(&[p[3], p[4], p[5]]);
        let scaling = Matrix3::from_diagonal(&nalgebra::Vector3::new(
            p[6].exp(),
            p[7].exp(),
            p[8].exp(),
        ));
        let shear = Matrix3::new(
            1.0, p[9], p[10],
            0.0, 1.0, p[11],
            0.0, 0.0, 1.0,
        );
        rotation * shear * scaling
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform for AffineTransform {
    fn parameters(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.params)
    }

    fn set_parameters(&mut self, params: &DVector<f64>) {
        copy_parameters(&mut self.params, params);
    }

    fn parameter_kinds(&self) -> Vec<ParameterKind> {
        [
            ParameterKind::Translation,
            ParameterKind::Rotation,
            ParameterKind::Scaling,
            ParameterKind::Shearing,
        ]
        .iter()
        .flat_map(|kind| std::iter::repeat(*kind).take(3))
        .collect()
    }

    fn matrix(&self) -> Matrix4<f64> {
        let t = [self.params[0], self.params[1], self.params[2]];
        centered_matrix(&self.linear(), &t, &self.center)
    }
}
