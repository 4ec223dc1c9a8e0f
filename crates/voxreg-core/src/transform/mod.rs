//! Parametric world-to-world transforms.
//!
//! This module provides the Transform trait consumed by the registration
//! engine and the rigid and affine parameterizations.

pub mod trait_;
pub mod rigid;
pub mod affine;

pub use trait_::{ParameterKind, Transform};
pub use rigid::RigidTransform;
pub use affine::AffineTransform;
