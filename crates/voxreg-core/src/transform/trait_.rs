//! Transform trait for parametric spatial transformations.

use nalgebra::{DVector, Matrix4};
use serde::{Deserialize, Serialize};
use crate::spatial::Point;

/// Physical class of a transform parameter.
///
/// Finite-difference schemes pick a step size per class, since a unit of
/// rotation and a unit of translation move voxels by very different amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Displacement in world units (mm).
    Translation,
    /// Angle in radians.
    Rotation,
    /// Log scale factor.
    Scaling,
    /// Dimensionless shear coefficient.
    Shearing,
}

/// Transform trait for parametric world-to-world transformations.
///
/// A transform maps points of the "from" world space to the "to" world
/// space and is fully described by a flat parameter vector. Only affine
/// (matrix-representable) transforms are supported.
pub trait Transform: Clone {
    /// Current parameter vector.
    fn parameters(&self) -> DVector<f64>;

    /// Overwrite the parameter vector.
    ///
    /// Extra trailing values are ignored, missing ones leave the current
    /// values untouched.
    fn set_parameters(&mut self, params: &DVector<f64>);

    /// Physical class of each parameter, in parameter order.
    fn parameter_kinds(&self) -> Vec<ParameterKind>;

    /// Homogeneous 4x4 matrix of the transform.
    fn matrix(&self) -> Matrix4<f64>;

    /// Number of free parameters.
    fn num_parameters(&self) -> usize {
        self.parameter_kinds().len()
    }

    /// Apply the transform to a single point.
    fn transform_point(&self, point: &Point<3>) -> Point<3> {
        point.transformed_by(&self.matrix())
    }

    /// Clone the transform with a different parameter vector.
    fn with_parameters(&self, params: &DVector<f64>) -> Self {
        let mut out = self.clone();
        out.set_parameters(params);
        out
    }
}

/// Copy `src` into `dst` element-wise over the common length.
pub(crate) fn copy_parameters(dst: &mut [f64], src: &DVector<f64>) {
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d = *s;
    }
}

/// Rotation matrix from Euler angles (x, y, z) composed as Rz * Ry * Rx.
pub(crate) fn euler_rotation(angles: &[f64; 3]) -> nalgebra::Matrix3<f64> {
    let (sx, cx) = angles[0].sin_cos();
    let (sy, cy) = angles[1].sin_cos();
    let (sz, cz) = angles[2].sin_cos();

    nalgebra::Matrix3::new(
        cz * cy, cz * sy * sx - sz * cx, cz * sy * cx + sz * sx,
        sz * cy, sz * sy * sx + cz * cx, sz * sy * cx - cz * sx,
        -sy, cy * sx, cy * cx,
    )
}

/// Homogeneous matrix of `x -> A(x - c) + c + t`.
pub(crate) fn centered_matrix(
    linear: &nalgebra::Matrix3<f64>,
    translation: &[f64; 3],
    center: &Point<3>,
) -> Matrix4<f64> {
    let c = center.inner().coords;
    let t = nalgebra::Vector3::from(*translation);
    let offset = c + t - linear * c;

    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(linear);
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(&offset);
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euler_rotation_z_quarter_turn() {
        let r = euler_rotation(&[0.0, 0.0, std::f64::consts::FRAC_PI_2]);
        let v = r * nalgebra::Vector3::new(1.0, 0.0, 0.0);
        assert!((v[0]).abs() < 1e-12);
        assert!((v[1] - 1.0).abs() < 1e-12);
        assert!((v[2]).abs() < 1e-12);
    }

    #[test]
    fn test_euler_rotation_is_orthonormal() {
        let r = euler_rotation(&[0.3, -0.7, 1.1]);
        let should_be_identity = r.transpose() * r;
        assert!((should_be_identity - nalgebra::Matrix3::identity()).norm() < 1e-12);
        assert!((r.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_centered_matrix_fixes_center_without_translation() {
        let linear = euler_rotation(&[0.2, 0.4, -0.3]);
        let center = Point::new([5.0, -2.0, 7.0]);
        let m = centered_matrix(&linear, &[0.0, 0.0, 0.0], &center);
        let mapped = center.transformed_by(&m);
        for axis in 0..3 {
            assert!((mapped[axis] - center[axis]).abs() < 1e-12);
        }
    }
}
