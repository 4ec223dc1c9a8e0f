//! Error types for registration operations.
//!
//! Configuration problems are reported synchronously when a registration is
//! built or reconfigured. Degenerate data never errors: it yields zero-valued
//! similarities and derivatives.

use thiserror::Error;

/// Main error type for registration operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Invalid configuration (bins, spacing, sigma, similarity name, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Shape mismatch between an array and the volume it annotates.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Error in transform or affine algebra.
    #[error("Transform error: {0}")]
    TransformError(String),

    /// Error while pre-smoothing a volume.
    #[error("Filter error: {0}")]
    FilterError(String),
}

/// Result type for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

impl RegistrationError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a transform error.
    pub fn transform(msg: impl Into<String>) -> Self {
        Self::TransformError(msg.into())
    }

    /// Create a filter error.
    pub fn filter(msg: impl Into<String>) -> Self {
        Self::FilterError(msg.into())
    }

    /// Create a shape mismatch error from two volume shapes.
    pub fn shape_mismatch(expected: [usize; 3], actual: [usize; 3]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

impl From<voxreg_core::filter::FilterError> for RegistrationError {
    fn from(err: voxreg_core::filter::FilterError) -> Self {
        Self::filter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RegistrationError::invalid_configuration("bins must be positive");
        assert!(matches!(err, RegistrationError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RegistrationError::invalid_configuration("test error");
        assert_eq!(err.to_string(), "Invalid configuration: test error");
    }

    #[test]
    fn test_shape_mismatch() {
        let err = RegistrationError::shape_mismatch([10, 10, 10], [5, 5, 5]);
        let err_str = err.to_string();
        assert!(err_str.contains("expected"));
        assert!(err_str.contains("got"));
    }
}
