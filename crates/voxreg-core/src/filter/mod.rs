pub mod gaussian;

pub use gaussian::{FilterError, GaussianFilter};
