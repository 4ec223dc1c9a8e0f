//! Rigid transform implementation.
//!
//! This module provides a rigid transform (rotation + translation).

use nalgebra::{DVector, Matrix4};
use serde::{Deserialize, Serialize};
use crate::spatial::Point;
use super::trait_::{centered_matrix, copy_parameters, euler_rotation, ParameterKind, Transform};

/// Rigid Transform (Rotation + Translation).
///
/// Parameters are `[tx, ty, tz, rx, ry, rz]`: a translation in world units
/// followed by Euler angles in radians (R = Rz * Ry * Rx). Rotation happens
/// about a fixed center: T(x) = R(x - c) + c + t
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    params: [f64; 6],
    center: Point<3>,
}

impl RigidTransform {
    /// Create a new rigid transform.
    ///
    /// # Arguments
    /// * `translation` - Translation vector in world units
    /// * `rotation` - Euler angles (x, y, z) in radians
    /// * `center` - Fixed center of rotation
    pub fn new(translation: [f64; 3], rotation: [f64; 3], center: Point<3>) -> Self {
        let mut params = [0.0; 6];
        params[..3].copy_from_slice(&translation);
        params[3..].copy_from_slice(&rotation);
        Self { params, center }
    }

    /// Identity transform rotating about the world origin.
    pub fn identity() -> Self {
        Self::new([0.0; 3], [0.0; 3], Point::origin())
    }

    /// Replace the center of rotation.
    pub fn with_center(mut self, center: Point<3>) -> Self {
        self.center = center;
        self
    }

    /// Get the translation vector.
    pub fn translation(&self) -> [f64; 3] {
        [self.params[0], self.params[1], self.params[2]]
    }

    /// Get the rotation angles.
    pub fn rotation(&self) -> [f64; 3] {
        [self.params[3], self.params[4], self.params[5]]
    }

    /// Get the center of rotation.
    pub fn center(&self) -> &Point<3> {
        &self.center
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform for RigidTransform {
    fn parameters(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.params)
    }

    fn set_parameters(&mut self, params: &DVector<f64>) {
        copy_parameters(&mut self.params, params);
    }

    fn parameter_kinds(&self) -> Vec<ParameterKind> {
        let mut kinds = vec![ParameterKind::Translation; 3];
        kinds.extend([ParameterKind::Rotation; 3]);
        kinds
    }

    fn matrix(&self) -> Matrix4<f64> {
        let r = euler_rotation(&self.rotation());
        centered_matrix(&r, &self.translation(), &self.center)
    }
}
