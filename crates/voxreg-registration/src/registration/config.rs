//! Registration configuration.

use serde::{Deserialize, Serialize};
use voxreg_core::ParameterKind;

use crate::error::Result;
use crate::fov::FovSpec;
use crate::similarity::{Renormalization, SimilarityKind};
use crate::validation::{
    validate_bins, validate_npoints, validate_sigma, validate_spacing, validate_step,
};

/// Default FOV sample budget (64^3 voxels).
pub const DEFAULT_NPOINTS: usize = 64 * 64 * 64;

/// Default number of intensity bins.
pub const DEFAULT_BINS: usize = 256;

/// Finite-difference step per parameter class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientSteps {
    /// Translation step (mm).
    pub translation: f64,
    /// Rotation step (radians).
    pub rotation: f64,
    /// Log-scale step.
    pub scaling: f64,
    /// Shear step.
    pub shearing: f64,
}

impl Default for GradientSteps {
    fn default() -> Self {
        Self {
            translation: 0.1,
            rotation: 0.01,
            scaling: 1e-3,
            shearing: 1e-3,
        }
    }
}

impl GradientSteps {
    /// Step used for a parameter of the given class.
    pub fn step(&self, kind: ParameterKind) -> f64 {
        match kind {
            ParameterKind::Translation => self.translation,
            ParameterKind::Rotation => self.rotation,
            ParameterKind::Scaling => self.scaling,
            ParameterKind::Shearing => self.shearing,
        }
    }

    fn validate(&self) -> Result<()> {
        validate_step("Translation", self.translation)?;
        validate_step("Rotation", self.rotation)?;
        validate_step("Scaling", self.scaling)?;
        validate_step("Shearing", self.shearing)?;
        Ok(())
    }
}

/// Configuration of a [`HistogramRegistration`](super::HistogramRegistration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Bins of the "from" volume.
    pub from_bins: usize,
    /// Bins of the "to" volume, same as `from_bins` when unset.
    pub to_bins: Option<usize>,
    /// Similarity measure.
    pub similarity: SimilarityKind,
    /// Optional log-likelihood renormalization.
    pub renormalize: Option<Renormalization>,
    /// Field of view of the "from" volume.
    pub fov: FovSpec,
    /// Pre-smoothing of the "from" volume (mm, 0 disables).
    pub from_sigma: f64,
    /// Pre-smoothing of the "to" volume (mm, 0 disables).
    pub to_sigma: f64,
    /// Finite-difference steps.
    pub steps: GradientSteps,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            from_bins: DEFAULT_BINS,
            to_bins: None,
            similarity: SimilarityKind::Crl1,
            renormalize: None,
            fov: FovSpec::new().with_npoints(DEFAULT_NPOINTS),
            from_sigma: 0.0,
            to_sigma: 0.0,
            steps: GradientSteps::default(),
        }
    }
}

impl RegistrationConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the same bin count for both volumes.
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.from_bins = bins;
        self.to_bins = None;
        self
    }

    /// Use different bin counts for the two volumes.
    pub fn with_bin_pair(mut self, from_bins: usize, to_bins: usize) -> Self {
        self.from_bins = from_bins;
        self.to_bins = Some(to_bins);
        self
    }

    /// Set the similarity measure.
    pub fn with_similarity(mut self, similarity: SimilarityKind) -> Self {
        self.similarity = similarity;
        self
    }

    /// Set the renormalization mode.
    pub fn with_renormalization(mut self, mode: Renormalization) -> Self {
        self.renormalize = Some(mode);
        self
    }

    /// Set the field of view.
    pub fn with_fov(mut self, fov: FovSpec) -> Self {
        self.fov = fov;
        self
    }

    /// Sample the full volume with the given stride.
    pub fn with_spacing(mut self, spacing: [i64; 3]) -> Self {
        self.fov = FovSpec::new().with_spacing(spacing);
        self
    }

    /// Set the pre-smoothing of both volumes.
    pub fn with_sigma(mut self, from_sigma: f64, to_sigma: f64) -> Self {
        self.from_sigma = from_sigma;
        self.to_sigma = to_sigma;
        self
    }

    /// Set the finite-difference steps.
    pub fn with_steps(mut self, steps: GradientSteps) -> Self {
        self.steps = steps;
        self
    }

    /// Bins of the "to" volume.
    pub fn to_bins(&self) -> usize {
        self.to_bins.unwrap_or(self.from_bins)
    }

    /// Check every option that does not depend on the volumes.
    pub fn validate(&self) -> Result<()> {
        validate_bins(self.from_bins)?;
        validate_bins(self.to_bins())?;
        validate_sigma(self.from_sigma)?;
        validate_sigma(self.to_sigma)?;
        if let Some(spacing) = &self.fov.spacing {
            validate_spacing(spacing)?;
        }
        if let Some(npoints) = self.fov.npoints {
            validate_npoints(npoints)?;
        }
        self.steps.validate()
    }
}
