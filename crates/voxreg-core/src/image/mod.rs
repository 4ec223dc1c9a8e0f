//! Volume types and voxel grids.
//!
//! This module provides the Volume type (a voxel array plus its
//! voxel-to-world affine) and helpers to enumerate voxel blocks.

pub mod voxel;
pub mod volume;
pub mod grid;

pub use voxel::Voxel;
pub use volume::Volume;
pub use grid::{block_indices, block_shape, generate_grid};
