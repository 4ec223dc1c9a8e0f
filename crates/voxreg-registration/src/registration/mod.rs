//! Histogram registration: the objective an external optimizer drives.
//!
//! A [`HistogramRegistration`] owns the clamped "from" volume, the padded
//! "to" volume and the resolved FOV. Given a world-to-world [`Transform`] it
//! evaluates the configured similarity, and its finite-difference gradient
//! and Hessian with respect to the transform parameters.

mod config;
mod explore;

pub use config::{GradientSteps, RegistrationConfig, DEFAULT_BINS, DEFAULT_NPOINTS};
pub use explore::Exploration;

use burn_ndarray::NdArray;
use nalgebra::{DMatrix, DVector, Matrix4};
use ndarray::Array3;
use tracing::{debug, info, warn};
use voxreg_core::filter::GaussianFilter;
use voxreg_core::{Transform, Volume, Voxel};

use crate::clamp::{clamp, ClampedVolume};
use crate::error::{RegistrationError, Result};
use crate::fov::{sample_fov, Fov, FovSpec};
use crate::histogram::{JointHistogram, JointHistogramBuilder};
use crate::padded::PaddedVolume;
use crate::similarity::{evaluate, Renormalization, SimilarityKind};
use crate::validation::{validate_axis, validate_mask_shape};

/// Backend used for Gaussian pre-smoothing.
type SmoothingBackend = NdArray<f32>;

/// Joint-histogram similarity between a "from" and a "to" volume.
#[derive(Debug, Clone)]
pub struct HistogramRegistration {
    from: ClampedVolume,
    to: PaddedVolume,
    from_affine: Matrix4<f64>,
    to_inverse: Matrix4<f64>,
    fov: Fov,
    builder: JointHistogramBuilder,
    similarity: SimilarityKind,
    renormalize: Option<Renormalization>,
    steps: GradientSteps,
}

impl HistogramRegistration {
    /// Set up a registration without masks.
    ///
    /// # Errors
    /// Any invalid configuration, including FOV geometry and mask shapes,
    /// is reported before a voxel is smoothed or clamped. A singular "to"
    /// affine is a `TransformError`.
    pub fn new<A: Voxel, B: Voxel>(
        from: &Volume<A>,
        to: &Volume<B>,
        config: RegistrationConfig,
    ) -> Result<Self> {
        Self::with_masks(from, to, None, None, config)
    }

    /// Set up a registration restricted to masked voxels.
    ///
    /// The "from" mask restricts both the intensity range used for clamping
    /// and the FOV samples. The "to" mask restricts the clamping range and
    /// turns unmasked voxels into the outside sentinel.
    pub fn with_masks<A: Voxel, B: Voxel>(
        from: &Volume<A>,
        to: &Volume<B>,
        from_mask: Option<&Array3<bool>>,
        to_mask: Option<&Array3<bool>>,
        config: RegistrationConfig,
    ) -> Result<Self> {
        config.validate()?;
        config.fov.validate_for(from.shape())?;
        if let Some(mask) = from_mask {
            let (a, b, c) = mask.dim();
            validate_mask_shape([a, b, c], from.shape())?;
        }
        if let Some(mask) = to_mask {
            let (a, b, c) = mask.dim();
            validate_mask_shape([a, b, c], to.shape())?;
        }
        let to_inverse = to.inverse_affine().ok_or_else(|| {
            RegistrationError::transform("The \"to\" voxel-to-world affine is singular")
        })?;

        let from_labels = prepare(from, config.from_sigma, config.from_bins, from_mask)?;
        let to_labels = prepare(to, config.to_sigma, config.to_bins(), to_mask)?;
        let padded = PaddedVolume::new(&to_labels);
        let fov = sample_fov(&from_labels, &config.fov)?;
        let builder = JointHistogramBuilder::new(from_labels.bins(), padded.bins());

        info!(
            "Histogram registration: from {:?} ({} bins), to {:?} ({} bins), {} samples, similarity {}",
            from_labels.shape(),
            from_labels.bins(),
            to_labels.shape(),
            to_labels.bins(),
            fov.len(),
            config.similarity
        );

        Ok(Self {
            from: from_labels,
            to: padded,
            from_affine: *from.affine(),
            to_inverse,
            fov,
            builder,
            similarity: config.similarity,
            renormalize: config.renormalize,
            steps: config.steps,
        })
    }

    /// Clamped "from" labels.
    pub fn from_labels(&self) -> &ClampedVolume {
        &self.from
    }

    /// Padded "to" labels.
    pub fn padded_to(&self) -> &PaddedVolume {
        &self.to
    }

    /// Current field of view.
    pub fn fov(&self) -> &Fov {
        &self.fov
    }

    /// `(bins_from, bins_to)`, the joint histogram shape.
    pub fn bins(&self) -> (usize, usize) {
        self.builder.shape()
    }

    /// Current measure and renormalization.
    pub fn similarity(&self) -> (SimilarityKind, Option<Renormalization>) {
        (self.similarity, self.renormalize)
    }

    /// Finite-difference steps.
    pub fn steps(&self) -> &GradientSteps {
        &self.steps
    }

    /// Replace the field of view. On error the previous FOV is kept.
    pub fn set_fov(&mut self, spec: FovSpec) -> Result<()> {
        self.fov = sample_fov(&self.from, &spec)?;
        Ok(())
    }

    /// Replace the similarity measure.
    pub fn set_similarity(&mut self, kind: SimilarityKind, renormalize: Option<Renormalization>) {
        debug!("Similarity set to {} (renormalize {:?})", kind, renormalize);
        self.similarity = kind;
        self.renormalize = renormalize;
    }

    /// Matrix mapping "from" voxel indices to "to" voxel indices.
    pub fn voxel_map<T: Transform>(&self, transform: &T) -> Matrix4<f64> {
        self.to_inverse * transform.matrix() * self.from_affine
    }

    /// Joint histogram of the FOV under `transform`.
    pub fn joint_histogram<T: Transform>(&self, transform: &T) -> JointHistogram {
        self.builder
            .build(&self.fov, &self.voxel_map(transform), &self.to)
    }

    /// Similarity under `transform`.
    pub fn eval<T: Transform>(&self, transform: &T) -> f64 {
        let hist = self.joint_histogram(transform);
        if hist.is_empty() && !self.fov.is_empty() {
            warn!("Joint histogram is empty: every sample maps outside the \"to\" volume");
        }
        evaluate(&hist, self.similarity, self.renormalize)
    }

    /// Central-difference gradient with respect to the transform parameters.
    pub fn eval_gradient<T: Transform>(&self, transform: &T) -> DVector<f64> {
        let params = transform.parameters();
        let steps = self.parameter_steps(transform);
        let f = |p: &DVector<f64>| self.eval(&transform.with_parameters(p));

        DVector::from_fn(params.len(), |k, _| {
            let h = steps[k];
            let plus = f(&shifted(&params, &[(k, h)]));
            let minus = f(&shifted(&params, &[(k, -h)]));
            (plus - minus) / (2.0 * h)
        })
    }

    /// Finite-difference Hessian with respect to the transform parameters.
    ///
    /// Diagonal terms use the five-point stencil, cross terms the four-point
    /// mixed stencil. The result is symmetric by construction.
    pub fn eval_hessian<T: Transform>(&self, transform: &T) -> DMatrix<f64> {
        let params = transform.parameters();
        let n = params.len();
        let steps = self.parameter_steps(transform);
        let f = |p: &DVector<f64>| self.eval(&transform.with_parameters(p));
        let center = f(&params);

        let mut hessian = DMatrix::zeros(n, n);
        for i in 0..n {
            let h = steps[i];
            let f2p = f(&shifted(&params, &[(i, 2.0 * h)]));
            let f1p = f(&shifted(&params, &[(i, h)]));
            let f1m = f(&shifted(&params, &[(i, -h)]));
            let f2m = f(&shifted(&params, &[(i, -2.0 * h)]));
            hessian[(i, i)] = (-f2p + 16.0 * f1p - 30.0 * center + 16.0 * f1m - f2m) / (12.0 * h * h);

            for j in 0..i {
                let k = steps[j];
                let fpp = f(&shifted(&params, &[(i, h), (j, k)]));
                let fpm = f(&shifted(&params, &[(i, h), (j, -k)]));
                let fmp = f(&shifted(&params, &[(i, -h), (j, k)]));
                let fmm = f(&shifted(&params, &[(i, -h), (j, -k)]));
                let value = (fpp - fpm - fmp + fmm) / (4.0 * h * k);
                hessian[(i, j)] = value;
                hessian[(j, i)] = value;
            }
        }
        hessian
    }

    /// Grid exploration around `transform`.
    ///
    /// Each `(axis, values)` pair lists candidate values for one parameter.
    ///
    /// # Errors
    /// `InvalidConfiguration` if an axis is not a parameter of `transform`.
    pub fn explore<T: Transform>(
        &self,
        transform: &T,
        grid: &[(usize, Vec<f64>)],
    ) -> Result<Exploration<'_, T>> {
        let n = transform.num_parameters();
        for (axis, _) in grid {
            validate_axis(*axis, n)?;
        }
        Ok(Exploration::new(self, transform.clone(), grid))
    }

    fn parameter_steps<T: Transform>(&self, transform: &T) -> Vec<f64> {
        transform
            .parameter_kinds()
            .into_iter()
            .map(|kind| self.steps.step(kind))
            .collect()
    }
}

/// Copy of `params` with the listed components offset.
fn shifted(params: &DVector<f64>, offsets: &[(usize, f64)]) -> DVector<f64> {
    let mut out = params.clone();
    for &(k, delta) in offsets {
        out[k] += delta;
    }
    out
}

/// Optionally smooth, then clamp a volume.
fn prepare<T: Voxel>(
    volume: &Volume<T>,
    sigma: f64,
    bins: usize,
    mask: Option<&Array3<bool>>,
) -> Result<ClampedVolume> {
    if sigma > 0.0 {
        let smoothed = GaussianFilter::<SmoothingBackend>::isotropic(sigma).apply(volume)?;
        debug!("Smoothed {:?} volume with sigma {}", smoothed.shape(), sigma);
        clamp(smoothed.data(), bins, mask)
    } else {
        clamp(volume.data(), bins, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxreg_core::{AffineTransform, RigidTransform};

    fn pattern(shape: (usize, usize, usize)) -> Volume<u8> {
        Volume::with_identity_affine(Array3::from_shape_fn(shape, |(i, j, k)| {
            ((i * i + 3 * j + 5 * k) % 13) as u8
        }))
    }

    fn full_fov() -> RegistrationConfig {
        RegistrationConfig::new().with_fov(FovSpec::new())
    }

    #[test]
    fn test_identity_similarity() {
        let volume = pattern((8, 9, 10));
        let mut reg = HistogramRegistration::new(&volume, &volume, full_fov()).unwrap();
        let t = RigidTransform::identity();

        for (kind, expected) in [
            (SimilarityKind::Cc, 1.0),
            (SimilarityKind::Cr, 1.0),
            (SimilarityKind::Crl1, 1.0),
            (SimilarityKind::Nmi, 2.0),
        ] {
            reg.set_similarity(kind, None);
            assert!((reg.eval(&t) - expected).abs() < 1e-9, "{kind}");
        }
        assert_eq!(reg.joint_histogram(&t).off_diagonal_mass(), 0.0);
    }

    #[test]
    fn test_singular_to_affine() {
        let volume = pattern((4, 4, 4));
        let singular = Volume::new(volume.data().clone(), Matrix4::zeros());
        let err = HistogramRegistration::new(&volume, &singular, full_fov()).unwrap_err();
        assert!(matches!(err, RegistrationError::TransformError(_)));
    }

    #[test]
    fn test_fov_geometry_checked_before_volumes() {
        let volume = pattern((4, 4, 4));
        let singular = Volume::new(volume.data().clone(), Matrix4::zeros());
        let config = full_fov()
            .with_fov(FovSpec::new().with_corner([0, 9, 0]))
            .with_sigma(2.0, 2.0);
        let err = HistogramRegistration::new(&volume, &singular, config).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));

        let mask = Array3::from_elem((4, 4, 5), true);
        let err = HistogramRegistration::with_masks(&volume, &singular, None, Some(&mask), full_fov())
            .unwrap_err();
        assert!(matches!(err, RegistrationError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_custom_steps_are_kept() {
        let volume = pattern((4, 4, 4));
        let steps = GradientSteps {
            translation: 0.5,
            ..GradientSteps::default()
        };
        let reg = HistogramRegistration::new(&volume, &volume, full_fov().with_steps(steps.clone()))
            .unwrap();
        assert_eq!(reg.steps(), &steps);
    }

    #[test]
    fn test_set_fov_failure_keeps_previous() {
        let volume = pattern((6, 6, 6));
        let mut reg = HistogramRegistration::new(&volume, &volume, full_fov()).unwrap();
        assert!(reg.set_fov(FovSpec::new().with_spacing([1, 0, 1])).is_err());
        assert_eq!(reg.fov().len(), 216);
    }

    #[test]
    fn test_gradient_dimensions() {
        let volume = pattern((8, 8, 8));
        let reg = HistogramRegistration::new(&volume, &volume, full_fov()).unwrap();
        assert_eq!(reg.eval_gradient(&RigidTransform::identity()).len(), 6);
        let hessian = reg.eval_hessian(&AffineTransform::identity());
        assert_eq!(hessian.shape(), (12, 12));
        assert_eq!(hessian, hessian.transpose());
    }

    #[test]
    fn test_explore_rejects_bad_axis() {
        let volume = pattern((4, 4, 4));
        let reg = HistogramRegistration::new(&volume, &volume, full_fov()).unwrap();
        let result = reg.explore(&RigidTransform::identity(), &[(6, vec![0.0])]);
        assert!(matches!(result, Err(RegistrationError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_explore_grid_order() {
        let volume = pattern((6, 6, 6));
        let reg = HistogramRegistration::new(&volume, &volume, full_fov()).unwrap();
        let t = RigidTransform::identity();
        let exploration = reg
            .explore(&t, &[(0, vec![-1.0, 0.0]), (2, vec![0.5, 1.0, 1.5])])
            .unwrap();
        assert_eq!(exploration.len(), 6);
        assert_eq!(exploration.grid_size(), 6);

        let (values, params) = exploration.clone().unzip_all();
        assert_eq!(values.len(), 6);
        assert_eq!(params[1].as_slice(), &[-1.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(params[3].as_slice(), &[0.0, 0.0, 0.5, 0.0, 0.0, 0.0]);

        let mut replay = exploration;
        let first = replay.next().map(|(v, _)| v);
        assert_eq!(first, values.first().copied());
        assert_eq!(replay.len(), 5);
        assert_eq!(replay.grid_size(), 6);
        let rest: Vec<f64> = replay.map(|(v, _)| v).collect();
        assert_eq!(rest, values[1..].to_vec());
    }
}
