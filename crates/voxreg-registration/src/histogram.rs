//! Joint histogram accumulation with trilinear partial-volume weighting.
//!
//! Each "from" sample is mapped into the padded "to" label field, the eight
//! bracketing labels are trilinearly interpolated as continuous values, and
//! the unit mass of the sample is split between the two bins around the
//! interpolated label. Smooth changes of the transform therefore produce
//! smooth changes of the histogram, which finite differences rely on.

use nalgebra::{Matrix4, Vector4};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;

use crate::fov::Fov;
use crate::padded::{PaddedVolume, OUTSIDE};

/// Samples per rayon work item.
const CHUNK_SIZE: usize = 4096;

/// Coordinates this close to an integer are treated as lying on the grid.
const SNAP_TOLERANCE: f64 = 1e-9;

/// A joint histogram of shape `(bins_from, bins_to)`.
#[derive(Debug, Clone, PartialEq)]
pub struct JointHistogram {
    counts: Array2<f64>,
}

impl JointHistogram {
    /// Empty histogram.
    pub fn zeros(bins_from: usize, bins_to: usize) -> Self {
        Self {
            counts: Array2::zeros((bins_from, bins_to)),
        }
    }

    /// Wrap an existing count array.
    pub fn from_counts(counts: Array2<f64>) -> Self {
        Self { counts }
    }

    /// Raw (unnormalized) counts.
    pub fn counts(&self) -> &Array2<f64> {
        &self.counts
    }

    /// `(bins_from, bins_to)`.
    pub fn shape(&self) -> (usize, usize) {
        self.counts.dim()
    }

    /// Total mass.
    pub fn total(&self) -> f64 {
        self.counts.sum()
    }

    /// Whether no mass was accumulated.
    pub fn is_empty(&self) -> bool {
        self.total() <= 0.0
    }

    /// Marginal counts of the "from" labels.
    pub fn from_marginal(&self) -> Array1<f64> {
        self.counts.sum_axis(Axis(1))
    }

    /// Marginal counts of the "to" labels.
    pub fn to_marginal(&self) -> Array1<f64> {
        self.counts.sum_axis(Axis(0))
    }

    /// Mass lying off the diagonal.
    pub fn off_diagonal_mass(&self) -> f64 {
        self.counts
            .indexed_iter()
            .filter(|((i, j), _)| i != j)
            .map(|(_, &v)| v)
            .sum()
    }
}

/// Accumulates joint histograms of "from" samples against a padded "to" volume.
#[derive(Debug, Clone)]
pub struct JointHistogramBuilder {
    bins_from: usize,
    bins_to: usize,
    parallel_threshold: usize,
}

impl JointHistogramBuilder {
    /// Create a builder for histograms of shape `(bins_from, bins_to)`.
    pub fn new(bins_from: usize, bins_to: usize) -> Self {
        Self {
            bins_from,
            bins_to,
            parallel_threshold: 2 * CHUNK_SIZE,
        }
    }

    /// Sample count from which accumulation runs on the rayon pool.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Histogram shape.
    pub fn shape(&self) -> (usize, usize) {
        (self.bins_from, self.bins_to)
    }

    /// Build the histogram of a FOV.
    ///
    /// `voxel_map` maps "from" voxel indices to continuous "to" voxel
    /// indices (not padded).
    pub fn build(&self, fov: &Fov, voxel_map: &Matrix4<f64>, to: &PaddedVolume) -> JointHistogram {
        self.build_from_samples(fov.labels(), fov.coords(), voxel_map, to)
    }

    /// Build the histogram of explicit samples.
    ///
    /// Samples with a negative or out-of-range "from" label are skipped, as
    /// are samples whose interpolation touches the sentinel or leaves the
    /// padded grid with a non-zero weight.
    pub fn build_from_samples(
        &self,
        labels: &[i16],
        coords: &[[usize; 3]],
        voxel_map: &Matrix4<f64>,
        to: &PaddedVolume,
    ) -> JointHistogram {
        let n = labels.len().min(coords.len());
        let (labels, coords) = (&labels[..n], &coords[..n]);

        let counts = if n < self.parallel_threshold {
            let mut counts = Array2::zeros(self.shape());
            for (&label, &coord) in labels.iter().zip(coords) {
                self.accumulate(&mut counts, label, coord, voxel_map, to);
            }
            counts
        } else {
            labels
                .par_chunks(CHUNK_SIZE)
                .zip(coords.par_chunks(CHUNK_SIZE))
                .fold(
                    || Array2::zeros(self.shape()),
                    |mut local, (labels, coords)| {
                        for (&label, &coord) in labels.iter().zip(coords) {
                            self.accumulate(&mut local, label, coord, voxel_map, to);
                        }
                        local
                    },
                )
                .reduce(
                    || Array2::zeros(self.shape()),
                    |mut a, b| {
                        a += &b;
                        a
                    },
                )
        };

        JointHistogram::from_counts(counts)
    }

    #[inline]
    fn accumulate(
        &self,
        counts: &mut Array2<f64>,
        label: i16,
        coord: [usize; 3],
        voxel_map: &Matrix4<f64>,
        to: &PaddedVolume,
    ) {
        if label < 0 || label as usize >= self.bins_from || self.bins_to == 0 {
            return;
        }

        let p = voxel_map * Vector4::new(coord[0] as f64, coord[1] as f64, coord[2] as f64, 1.0);
        let position = [p.x + 1.0, p.y + 1.0, p.z + 1.0];

        let Some(value) = interpolate(to, position) else {
            return;
        };

        let row = label as usize;
        let top = self.bins_to - 1;
        let floor = value.floor();
        let bin = floor as usize;
        if bin >= top {
            counts[[row, top]] += 1.0;
            return;
        }

        let frac = value - floor;
        counts[[row, bin]] += 1.0 - frac;
        if frac > 0.0 {
            counts[[row, bin + 1]] += frac;
        }
    }
}

/// Trilinearly interpolate labels at a padded coordinate.
///
/// Returns `None` if any neighbour with non-zero weight is outside the grid
/// or carries [`OUTSIDE`]. Neighbours with zero weight are never read.
/// Positions within [`SNAP_TOLERANCE`] of a voxel centre are snapped onto it,
/// so rounding in composed affines cannot leak mass into a neighbour.
fn interpolate(to: &PaddedVolume, position: [f64; 3]) -> Option<f64> {
    let shape = to.shape();
    let mut base = [0isize; 3];
    let mut frac = [0.0f64; 3];
    for axis in 0..3 {
        let x = snap(position[axis]);
        if !x.is_finite() || x < 0.0 || x > (shape[axis] - 1) as f64 {
            return None;
        }
        let f = x.floor();
        base[axis] = f as isize;
        frac[axis] = x - f;
    }

    let mut value = 0.0;
    for corner in 0..8usize {
        let mut weight = 1.0;
        let mut index = base;
        for axis in 0..3 {
            if (corner >> axis) & 1 == 1 {
                weight *= frac[axis];
                index[axis] += 1;
            } else {
                weight *= 1.0 - frac[axis];
            }
        }
        if weight == 0.0 {
            continue;
        }

        let label = to.get(index[0], index[1], index[2])?;
        if label == OUTSIDE {
            return None;
        }
        value += weight * label as f64;
    }
    Some(value)
}

#[inline]
fn snap(x: f64) -> f64 {
    let nearest = x.round();
    if (x - nearest).abs() < SNAP_TOLERANCE {
        nearest
    } else {
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clamp::clamp;
    use crate::fov::{sample_fov, FovSpec};
    use ndarray::Array3;

    fn labels(shape: (usize, usize, usize)) -> Array3<u8> {
        Array3::from_shape_fn(shape, |(i, j, k)| ((3 * i + 5 * j + 7 * k) % 11) as u8)
    }

    fn translation(t: [f64; 3]) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m[(0, 3)] = t[0];
        m[(1, 3)] = t[1];
        m[(2, 3)] = t[2];
        m
    }

    #[test]
    fn test_identity_is_diagonal() {
        let clamped = clamp(&labels((6, 7, 8)), 256, None).unwrap();
        let padded = PaddedVolume::new(&clamped);
        let fov = sample_fov(&clamped, &FovSpec::new()).unwrap();
        let builder = JointHistogramBuilder::new(clamped.bins(), padded.bins());

        let hist = builder.build(&fov, &Matrix4::identity(), &padded);
        assert_eq!(hist.off_diagonal_mass(), 0.0);
        assert_eq!(hist.total(), fov.len() as f64);
    }

    #[test]
    fn test_half_voxel_shift_splits_mass() {
        let data = Array3::from_shape_fn((1, 1, 4), |(_, _, k)| k as u8);
        let clamped = clamp(&data, 256, None).unwrap();
        let padded = PaddedVolume::new(&clamped);
        let builder = JointHistogramBuilder::new(clamped.bins(), padded.bins());

        let hist = builder.build_from_samples(&[0], &[[0, 0, 0]], &translation([0.0, 0.0, 0.25]), &padded);
        assert!((hist.counts()[[0, 0]] - 0.75).abs() < 1e-12);
        assert!((hist.counts()[[0, 1]] - 0.25).abs() < 1e-12);
        assert!((hist.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_samples_touching_the_shell_are_excluded() {
        let clamped = clamp(&labels((4, 4, 4)), 256, None).unwrap();
        let padded = PaddedVolume::new(&clamped);
        let builder = JointHistogramBuilder::new(clamped.bins(), padded.bins());

        let hist = builder.build_from_samples(&[0], &[[3, 3, 3]], &translation([0.5, 0.0, 0.0]), &padded);
        assert!(hist.is_empty());

        let hist = builder.build_from_samples(&[0], &[[0, 0, 0]], &translation([-100.0, 0.0, 0.0]), &padded);
        assert!(hist.is_empty());
    }

    #[test]
    fn test_near_integer_positions_snap_onto_voxels() {
        let clamped = clamp(&labels((4, 4, 4)), 256, None).unwrap();
        let padded = PaddedVolume::new(&clamped);
        let builder = JointHistogramBuilder::new(clamped.bins(), padded.bins());
        let fov = sample_fov(&clamped, &FovSpec::new()).unwrap();

        let mut map = Matrix4::identity();
        map[(0, 0)] = 1.0 - 1e-15;
        map[(1, 2)] = 2.2e-16;
        map[(2, 3)] = -1e-12;
        let hist = builder.build(&fov, &map, &padded);
        assert_eq!(hist.off_diagonal_mass(), 0.0);
        assert_eq!(hist.total(), fov.len() as f64);
    }

    #[test]
    fn test_non_finite_voxels_add_no_mass() {
        let mut from = labels((3, 3, 3)).mapv(f64::from);
        from[[0, 1, 2]] = f64::NAN;
        let mut to = labels((3, 3, 3)).mapv(f64::from);
        to[[2, 2, 2]] = f64::INFINITY;

        let from = clamp(&from, 256, None).unwrap();
        let to = clamp(&to, 256, None).unwrap();
        let padded = PaddedVolume::new(&to);
        let fov = sample_fov(&from, &FovSpec::new()).unwrap();
        let builder = JointHistogramBuilder::new(from.bins(), padded.bins());

        let hist = builder.build(&fov, &Matrix4::identity(), &padded);
        assert_eq!(hist.total(), 25.0);
        assert_eq!(hist.off_diagonal_mass(), 0.0);

        let hist = builder.build_from_samples(&[0], &[[2, 2, 2]], &Matrix4::identity(), &padded);
        assert!(hist.is_empty());
    }

    #[test]
    fn test_negative_from_label_is_skipped() {
        let clamped = clamp(&labels((2, 2, 2)), 256, None).unwrap();
        let padded = PaddedVolume::new(&clamped);
        let builder = JointHistogramBuilder::new(clamped.bins(), padded.bins());
        let hist = builder.build_from_samples(&[-1], &[[0, 0, 0]], &Matrix4::identity(), &padded);
        assert!(hist.is_empty());
    }

    #[test]
    fn test_non_finite_map_contributes_nothing() {
        let clamped = clamp(&labels((2, 2, 2)), 256, None).unwrap();
        let padded = PaddedVolume::new(&clamped);
        let builder = JointHistogramBuilder::new(clamped.bins(), padded.bins());
        let hist = builder.build_from_samples(&[0], &[[0, 0, 0]], &translation([f64::NAN, 0.0, 0.0]), &padded);
        assert!(hist.is_empty());
    }

    #[test]
    fn test_parallel_matches_serial() {
        let clamped = clamp(&labels((20, 20, 20)), 256, None).unwrap();
        let padded = PaddedVolume::new(&clamped);
        let fov = sample_fov(&clamped, &FovSpec::new()).unwrap();
        let map = translation([0.3, -0.2, 0.45]);

        let serial = JointHistogramBuilder::new(clamped.bins(), padded.bins())
            .with_parallel_threshold(usize::MAX)
            .build(&fov, &map, &padded);
        let parallel = JointHistogramBuilder::new(clamped.bins(), padded.bins())
            .with_parallel_threshold(0)
            .build(&fov, &map, &padded);

        assert_eq!(serial.shape(), parallel.shape());
        for (a, b) in serial.counts().iter().zip(parallel.counts().iter()) {
            assert!((a - b).abs() < 1e-9);
        }
        assert!(serial.total() <= fov.len() as f64 + 1e-9);
    }

    #[test]
    fn test_marginals() {
        let counts = ndarray::arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let hist = JointHistogram::from_counts(counts);
        assert_eq!(hist.from_marginal().to_vec(), vec![3.0, 7.0]);
        assert_eq!(hist.to_marginal().to_vec(), vec![4.0, 6.0]);
        assert_eq!(hist.total(), 10.0);
    }
}
