//! Field-of-view selection: which "from" voxels feed the joint histogram.

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tracing::debug;
use voxreg_core::image::{block_indices, block_shape};

use crate::clamp::ClampedVolume;
use crate::error::{RegistrationError, Result};
use crate::padded::OUTSIDE;
use crate::validation::{validate_corner, validate_mask_shape, validate_npoints, validate_spacing};

/// Requested field of view.
///
/// Precedence: `mask` selects exactly its true voxels and ignores the other
/// options. Otherwise the volume is cropped to `corner..corner + size` and
/// visited with stride `spacing`, or with the smallest stride that keeps at
/// most `npoints` samples when only `npoints` is given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FovSpec {
    /// Target sample count.
    pub npoints: Option<usize>,
    /// Decimation stride per axis.
    pub spacing: Option<[i64; 3]>,
    /// First voxel of the crop box.
    pub corner: Option<[usize; 3]>,
    /// Extent of the crop box.
    pub size: Option<[usize; 3]>,
    /// Explicit sample mask, same shape as the "from" volume.
    pub mask: Option<Array3<bool>>,
}

impl FovSpec {
    /// Full volume, stride 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target sample count.
    pub fn with_npoints(mut self, npoints: usize) -> Self {
        self.npoints = Some(npoints);
        self
    }

    /// Set the decimation stride.
    pub fn with_spacing(mut self, spacing: [i64; 3]) -> Self {
        self.spacing = Some(spacing);
        self
    }

    /// Set the crop corner.
    pub fn with_corner(mut self, corner: [usize; 3]) -> Self {
        self.corner = Some(corner);
        self
    }

    /// Set the crop extent.
    pub fn with_size(mut self, size: [usize; 3]) -> Self {
        self.size = Some(size);
        self
    }

    /// Select samples with an explicit mask.
    pub fn with_mask(mut self, mask: Array3<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Check the mask shape or crop box against a volume shape, without
    /// sampling anything.
    pub fn validate_for(&self, shape: [usize; 3]) -> Result<()> {
        match &self.mask {
            Some(mask) => {
                let (a, b, c) = mask.dim();
                validate_mask_shape([a, b, c], shape)
            }
            None => self.crop(shape).map(|_| ()),
        }
    }

    /// Crop corner and clipped extent.
    fn crop(&self, shape: [usize; 3]) -> Result<([usize; 3], [usize; 3])> {
        let corner = self.corner.unwrap_or([0, 0, 0]);
        validate_corner(&corner, &shape)?;
        let size = self.size.unwrap_or(shape);
        let mut extent = [0; 3];
        for axis in 0..3 {
            extent[axis] = corner[axis].saturating_add(size[axis]).min(shape[axis]) - corner[axis];
        }
        if extent.contains(&0) {
            return Err(RegistrationError::invalid_configuration(format!(
                "FOV size {:?} selects no voxel",
                size
            )));
        }
        Ok((corner, extent))
    }
}

/// A resolved field of view.
#[derive(Debug, Clone, PartialEq)]
pub struct Fov {
    coords: Vec<[usize; 3]>,
    labels: Vec<i16>,
    shape: [usize; 3],
    corner: [usize; 3],
    spacing: [usize; 3],
}

impl Fov {
    /// Sample voxel coordinates in the "from" volume, C order.
    pub fn coords(&self) -> &[[usize; 3]] {
        &self.coords
    }

    /// "From" labels at the sample coordinates.
    pub fn labels(&self) -> &[i16] {
        &self.labels
    }

    /// Logical block shape. Mask-selected FOVs report `[count, 1, 1]`.
    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    /// First voxel of the sampled block.
    pub fn corner(&self) -> [usize; 3] {
        self.corner
    }

    /// Stride used along each axis.
    pub fn spacing(&self) -> [usize; 3] {
        self.spacing
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Whether no voxel was selected.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

/// Resolve `spec` against a clamped "from" volume.
///
/// # Errors
/// `InvalidConfiguration` for a non-positive spacing component, a zero
/// `npoints`, a crop corner outside the volume, an empty crop or an empty
/// sample mask. `ShapeMismatch` when the sample mask does not match the
/// volume.
pub fn sample_fov(from: &ClampedVolume, spec: &FovSpec) -> Result<Fov> {
    if let Some(mask) = &spec.mask {
        return masked_fov(from, mask);
    }

    let (corner, extent) = spec.crop(from.shape())?;

    let spacing = match (spec.spacing, spec.npoints) {
        (Some(spacing), _) => {
            validate_spacing(&spacing)?;
            spacing.map(|s| s as usize)
        }
        (None, Some(npoints)) => {
            validate_npoints(npoints)?;
            ideal_spacing(from, corner, extent, npoints)
        }
        (None, None) => [1, 1, 1],
    };

    let coords: Vec<[usize; 3]> = block_indices(corner, extent, spacing)
        .filter(|&idx| from.in_mask(idx))
        .collect();
    let labels = coords.iter().map(|&idx| from.labels()[idx]).collect();
    let shape = block_shape(extent, spacing);

    debug!(
        "FOV: corner {:?}, extent {:?}, spacing {:?} -> shape {:?}, {} samples",
        corner,
        extent,
        spacing,
        shape,
        coords.len()
    );

    Ok(Fov {
        coords,
        labels,
        shape,
        corner,
        spacing,
    })
}

fn masked_fov(from: &ClampedVolume, mask: &Array3<bool>) -> Result<Fov> {
    let (a, b, c) = mask.dim();
    validate_mask_shape([a, b, c], from.shape())?;

    let coords: Vec<[usize; 3]> = mask
        .indexed_iter()
        .filter(|(_, inside)| **inside)
        .map(|((i, j, k), _)| [i, j, k])
        .filter(|&idx| from.labels()[idx] != OUTSIDE)
        .collect();
    if coords.is_empty() {
        return Err(RegistrationError::invalid_configuration(
            "FOV mask selects no voxel",
        ));
    }
    let labels = coords.iter().map(|&idx| from.labels()[idx]).collect();

    debug!("FOV: mask selects {} samples", coords.len());

    Ok(Fov {
        shape: [coords.len(), 1, 1],
        coords,
        labels,
        corner: [0, 0, 0],
        spacing: [1, 1, 1],
    })
}

/// Smallest stride keeping at most `npoints` in-mask samples.
///
/// Starts from stride 1 and repeatedly coarsens the axis with the most
/// samples (lowest axis on ties), so the result is fully deterministic.
fn ideal_spacing(
    from: &ClampedVolume,
    corner: [usize; 3],
    extent: [usize; 3],
    npoints: usize,
) -> [usize; 3] {
    let mut spacing = [1usize; 3];
    loop {
        let dims = block_shape(extent, spacing);
        let count = match from.mask() {
            None => dims.iter().product(),
            Some(_) => block_indices(corner, extent, spacing)
                .filter(|&idx| from.in_mask(idx))
                .count(),
        };
        if count <= npoints {
            return spacing;
        }

        let mut axis = 0;
        for candidate in 1..3 {
            if dims[candidate] > dims[axis] {
                axis = candidate;
            }
        }
        if dims[axis] <= 1 {
            return spacing;
        }
        spacing[axis] += 1;
    }
}
