//! Validation utilities for registration configuration.
//!
//! Every check runs before any volume is clamped or any histogram is built,
//! so a bad configuration costs nothing but the error.

use crate::error::{RegistrationError, Result};

/// Largest bin count representable by the `i16` label arrays.
pub const MAX_BINS: usize = i16::MAX as usize;

/// Validate a histogram bin count.
pub fn validate_bins(bins: usize) -> Result<()> {
    if bins < 1 {
        return Err(RegistrationError::invalid_configuration(
            "Number of bins must be at least 1",
        ));
    }

    if bins > MAX_BINS {
        return Err(RegistrationError::invalid_configuration(format!(
            "Number of bins must not exceed {}, got {}",
            MAX_BINS, bins
        )));
    }

    Ok(())
}

/// Validate a pre-smoothing bandwidth. Zero disables smoothing.
pub fn validate_sigma(sigma: f64) -> Result<()> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "Smoothing sigma must be non-negative, got {}",
            sigma
        )));
    }
    Ok(())
}

/// Validate a FOV decimation step.
pub fn validate_spacing(spacing: &[i64; 3]) -> Result<()> {
    if let Some(axis) = spacing.iter().position(|&s| s <= 0) {
        return Err(RegistrationError::invalid_configuration(format!(
            "Spacing must be positive along every axis, got {} on axis {}",
            spacing[axis], axis
        )));
    }
    Ok(())
}

/// Validate a requested FOV sample count.
pub fn validate_npoints(npoints: usize) -> Result<()> {
    if npoints == 0 {
        return Err(RegistrationError::invalid_configuration(
            "Number of FOV points must be positive",
        ));
    }
    Ok(())
}

/// Validate a FOV crop corner against the volume shape.
pub fn validate_corner(corner: &[usize; 3], shape: &[usize; 3]) -> Result<()> {
    for axis in 0..3 {
        if corner[axis] >= shape[axis] {
            return Err(RegistrationError::invalid_configuration(format!(
                "FOV corner {:?} lies outside volume of shape {:?}",
                corner, shape
            )));
        }
    }
    Ok(())
}

/// Validate a parameter index used by grid exploration.
pub fn validate_axis(axis: usize, num_parameters: usize) -> Result<()> {
    if axis >= num_parameters {
        return Err(RegistrationError::invalid_configuration(format!(
            "Parameter axis {} out of range for a transform with {} parameters",
            axis, num_parameters
        )));
    }
    Ok(())
}

/// Validate a finite-difference step.
pub fn validate_step(name: &str, step: f64) -> Result<()> {
    if !step.is_finite() || step <= 0.0 {
        return Err(RegistrationError::invalid_configuration(format!(
            "{} step must be positive, got {}",
            name, step
        )));
    }
    Ok(())
}

/// Validate that a mask has the shape of the volume it annotates.
pub fn validate_mask_shape(mask: [usize; 3], volume: [usize; 3]) -> Result<()> {
    if mask != volume {
        return Err(RegistrationError::shape_mismatch(volume, mask));
    }
    Ok(())
}
