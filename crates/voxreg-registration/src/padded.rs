//! Sentinel-padded label volume used as the interpolation target.

use ndarray::{s, Array3, ArrayView3};

use crate::clamp::ClampedVolume;

/// Label marking voxels outside the target volume or its mask.
pub const OUTSIDE: i16 = -1;

/// A clamped label volume wrapped in a one-voxel shell of [`OUTSIDE`].
///
/// Padded coordinates are offset by one from the source volume: source
/// voxel `(i, j, k)` lives at `(i + 1, j + 1, k + 1)`. Voxels excluded by
/// the source mask are also set to [`OUTSIDE`] (non-finite voxels already
/// are), so the interpolator only has one rule for "no data here".
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedVolume {
    labels: Array3<i16>,
    bins: usize,
}

impl PaddedVolume {
    /// Pad a clamped volume.
    pub fn new(source: &ClampedVolume) -> Self {
        let [a, b, c] = source.shape();
        let mut labels = Array3::from_elem((a + 2, b + 2, c + 2), OUTSIDE);
        let mut interior = labels.slice_mut(s![1..a + 1, 1..b + 1, 1..c + 1]);
        interior.assign(source.labels());

        if let Some(mask) = source.mask() {
            interior.zip_mut_with(mask, |label, &inside| {
                if !inside {
                    *label = OUTSIDE;
                }
            });
        }

        Self {
            labels,
            bins: source.bins(),
        }
    }

    /// Padded label array.
    pub fn labels(&self) -> &Array3<i16> {
        &self.labels
    }

    /// Number of labels of the source volume.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Padded shape (source shape + 2 on every axis).
    pub fn shape(&self) -> [usize; 3] {
        let (a, b, c) = self.labels.dim();
        [a, b, c]
    }

    /// View of the source-sized interior.
    pub fn interior(&self) -> ArrayView3<'_, i16> {
        let [a, b, c] = self.shape();
        self.labels.slice(s![1..a - 1, 1..b - 1, 1..c - 1])
    }

    /// Label at a padded coordinate, `None` outside the padded grid.
    #[inline]
    pub fn get(&self, i: isize, j: isize, k: isize) -> Option<i16> {
        if i < 0 || j < 0 || k < 0 {
            return None;
        }
        self.labels.get((i as usize, j as usize, k as usize)).copied()
    }
}
