//! Intensity clamping: quantize raw voxel intensities into dense integer labels.
//!
//! Labels are the unit of every joint histogram, so clamping fixes the
//! histogram size along one axis. The mapping is deterministic and
//! monotonic, and the maximum in-range intensity always lands on the last
//! label so that `bins == max(label) + 1`. Non-finite voxels carry no data
//! and are labelled [`OUTSIDE`].

use ndarray::Array3;
use tracing::debug;
use voxreg_core::Voxel;

use crate::error::{RegistrationError, Result};
use crate::padded::OUTSIDE;
use crate::validation::{validate_bins, validate_mask_shape};

/// A label volume produced by [`clamp`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClampedVolume {
    labels: Array3<i16>,
    bins: usize,
    mask: Option<Array3<bool>>,
}

impl ClampedVolume {
    /// Label array, every value in `[0, bins - 1]` except [`OUTSIDE`] for
    /// non-finite voxels.
    pub fn labels(&self) -> &Array3<i16> {
        &self.labels
    }

    /// Number of labels in use.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Mask the volume was clamped with, if any.
    pub fn mask(&self) -> Option<&Array3<bool>> {
        self.mask.as_ref()
    }

    /// Shape of the label array.
    pub fn shape(&self) -> [usize; 3] {
        let (a, b, c) = self.labels.dim();
        [a, b, c]
    }

    /// Whether the voxel at `index` carries data: finite and inside the mask.
    pub fn in_mask(&self, index: [usize; 3]) -> bool {
        self.labels[index] != OUTSIDE && self.mask.as_ref().map_or(true, |m| m[index])
    }

    /// Largest label present.
    pub fn max_label(&self) -> i16 {
        self.labels.iter().copied().max().unwrap_or(0)
    }
}

/// Quantize `data` into at most `bins` labels.
///
/// The intensity range is taken over the masked voxels only; voxels outside
/// the mask are still labelled, saturating into `[0, bins - 1]`.
///
/// Integer data whose range fits in `bins` is only shifted (`x - min`) and
/// the bin count shrinks to the range. Anything else is scaled into equal
/// width bins with `round((bins - 1) * (x - min) / (max - min))`. Constant
/// data collapses to a single label. NaN and infinite voxels get
/// [`OUTSIDE`] whatever the branch.
///
/// # Errors
/// * `InvalidConfiguration` for `bins` outside `[1, i16::MAX]` or a mask
///   without any true voxel.
/// * `ShapeMismatch` when the mask and data shapes differ.
pub fn clamp<T: Voxel>(
    data: &Array3<T>,
    bins: usize,
    mask: Option<&Array3<bool>>,
) -> Result<ClampedVolume> {
    validate_bins(bins)?;
    let shape = {
        let (a, b, c) = data.dim();
        [a, b, c]
    };
    if let Some(m) = mask {
        let (a, b, c) = m.dim();
        validate_mask_shape([a, b, c], shape)?;
    }

    let (dmin, dmax) = intensity_range(data, mask).ok_or_else(|| {
        RegistrationError::invalid_configuration("Cannot clamp: no finite voxel inside the mask")
    })?;

    let range = dmax - dmin;
    let (labels, bins) = if range <= 0.0 {
        (data.mapv(|v| if v.to_f64().is_finite() { 0 } else { OUTSIDE }), 1)
    } else if T::IS_INTEGER && range + 1.0 <= bins as f64 {
        let top = range;
        let labels = data.mapv(|v| (v.to_f64() - dmin).clamp(0.0, top) as i16);
        (labels, range as usize + 1)
    } else {
        let top = (bins - 1) as f64;
        let scale = top / range;
        let labels = data.mapv(|v| {
            let x = v.to_f64();
            if !x.is_finite() {
                OUTSIDE
            } else if x >= dmax {
                top as i16
            } else {
                ((x - dmin) * scale).round().clamp(0.0, top) as i16
            }
        });
        (labels, bins)
    };

    debug!(
        "Clamped {:?} volume: range [{}, {}] -> {} bins",
        shape, dmin, dmax, bins
    );

    Ok(ClampedVolume {
        labels,
        bins,
        mask: mask.cloned(),
    })
}

/// Finite intensity range over the masked voxels.
fn intensity_range<T: Voxel>(data: &Array3<T>, mask: Option<&Array3<bool>>) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    let mut update = |v: T| {
        let x = v.to_f64();
        if x.is_finite() {
            lo = lo.min(x);
            hi = hi.max(x);
        }
    };

    match mask {
        Some(m) => data
            .iter()
            .zip(m.iter())
            .filter(|(_, inside)| **inside)
            .for_each(|(&v, _)| update(v)),
        None => data.iter().for_each(|&v| update(v)),
    }

    (lo <= hi).then_some((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn ramp<T: Voxel>(values: Vec<T>) -> Array3<T> {
        let n = values.len();
        Array::from_shape_vec((1, 1, n), values).unwrap()
    }

    #[test]
    fn test_small_integer_range_is_shifted() {
        let data = ramp(vec![10u8, 12, 11, 15]);
        let clamped = clamp(&data, 256, None).unwrap();
        assert_eq!(clamped.bins(), 6);
        assert_eq!(clamped.labels().iter().copied().collect::<Vec<_>>(), vec![0, 2, 1, 5]);
        assert_eq!(clamped.max_label() as usize + 1, clamped.bins());
    }

    #[test]
    fn test_wide_integer_range_is_scaled() {
        let data = ramp(vec![-1000i16, 0, 1000]);
        let clamped = clamp(&data, 11, None).unwrap();
        assert_eq!(clamped.bins(), 11);
        assert_eq!(clamped.labels().iter().copied().collect::<Vec<_>>(), vec![0, 5, 10]);
    }

    #[test]
    fn test_float_data_uses_requested_bins() {
        let data = ramp(vec![0.0f64, 0.25, 0.5, 1.0]);
        let clamped = clamp(&data, 5, None).unwrap();
        assert_eq!(clamped.bins(), 5);
        assert_eq!(clamped.labels().iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_monotonic() {
        let data = ramp((0..200).map(|i| (i as f64 * 0.37).sin() * 50.0).collect::<Vec<_>>());
        let clamped = clamp(&data, 17, None).unwrap();
        let mut pairs: Vec<_> = data.iter().zip(clamped.labels().iter()).collect();
        pairs.sort_by(|a, b| a.0.partial_cmp(b.0).unwrap());
        assert!(pairs.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(clamped.max_label(), 16);
    }

    #[test]
    fn test_constant_data_gives_single_bin() {
        let data = Array3::from_elem((3, 3, 3), 7.5f32);
        let clamped = clamp(&data, 256, None).unwrap();
        assert_eq!(clamped.bins(), 1);
        assert!(clamped.labels().iter().all(|&l| l == 0));
    }

    #[test]
    fn test_mask_restricts_range_and_saturates_outside() {
        let data = ramp(vec![0.0f64, 10.0, 20.0, 100.0]);
        let mask = ramp(vec![false, true, true, false]);
        let clamped = clamp(&data, 3, Some(&mask)).unwrap();
        assert_eq!(clamped.labels().iter().copied().collect::<Vec<_>>(), vec![0, 0, 2, 2]);
        assert!(clamped.in_mask([0, 0, 1]));
        assert!(!clamped.in_mask([0, 0, 3]));
    }

    #[test]
    fn test_non_finite_voxels_carry_no_data() {
        let data = ramp(vec![0.0f64, 10.0, f64::NAN, 5.0, f64::INFINITY]);
        let clamped = clamp(&data, 11, None).unwrap();
        assert_eq!(
            clamped.labels().iter().copied().collect::<Vec<_>>(),
            vec![0, 10, OUTSIDE, 5, OUTSIDE]
        );
        assert_eq!(clamped.max_label(), 10);
        assert!(clamped.in_mask([0, 0, 0]));
        assert!(!clamped.in_mask([0, 0, 2]));
        assert!(!clamped.in_mask([0, 0, 4]));

        let constant = ramp(vec![2.0f32, f32::NAN, 2.0]);
        let clamped = clamp(&constant, 8, None).unwrap();
        assert_eq!(clamped.labels().iter().copied().collect::<Vec<_>>(), vec![0, OUTSIDE, 0]);
    }

    #[test]
    fn test_invalid_bins() {
        let data = ramp(vec![0u8, 1]);
        assert!(matches!(
            clamp(&data, 0, None),
            Err(RegistrationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_empty_mask_rejected() {
        let data = ramp(vec![0u8, 1]);
        let mask = ramp(vec![false, false]);
        assert!(matches!(
            clamp(&data, 4, Some(&mask)),
            Err(RegistrationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_mask_shape_mismatch() {
        let data = ramp(vec![0u8, 1]);
        let mask = ramp(vec![true, true, true]);
        assert!(matches!(
            clamp(&data, 4, Some(&mask)),
            Err(RegistrationError::ShapeMismatch { .. })
        ));
    }
}
