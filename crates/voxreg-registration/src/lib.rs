//! Joint-histogram similarity engine for 3-D image registration.
//!
//! Raw volumes are clamped into dense integer labels, the "from" labels are
//! sampled over a field of view, the "to" labels are padded with an outside
//! sentinel, and for any parametric transform a joint histogram is
//! accumulated from which a similarity measure is derived.

pub mod clamp;
pub mod error;
pub mod fov;
pub mod histogram;
pub mod padded;
pub mod registration;
pub mod similarity;
pub mod validation;

pub use clamp::{clamp, ClampedVolume};
pub use error::{RegistrationError, Result};
pub use fov::{sample_fov, Fov, FovSpec};
pub use histogram::{JointHistogram, JointHistogramBuilder};
pub use padded::{PaddedVolume, OUTSIDE};
pub use registration::{
    Exploration, GradientSteps, HistogramRegistration, RegistrationConfig,
};
pub use similarity::{evaluate, renormalize, Renormalization, SimilarityKind};
