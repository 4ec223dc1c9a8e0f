pub mod image;
pub mod spatial;
pub mod transform;
pub mod filter;

pub use image::{Volume, Voxel};
pub use spatial::{Point, Spacing, Vector};
pub use transform::{AffineTransform, ParameterKind, RigidTransform, Transform};
