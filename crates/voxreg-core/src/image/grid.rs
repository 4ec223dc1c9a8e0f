//! Voxel index enumeration for full volumes and decimated sub-blocks.

/// Number of samples along each axis of a block of `extent` voxels visited
/// with stride `step` (`ceil(extent / step)`).
pub fn block_shape(extent: [usize; 3], step: [usize; 3]) -> [usize; 3] {
    let mut shape = [0; 3];
    for axis in 0..3 {
        let s = step[axis].max(1);
        shape[axis] = extent[axis].div_ceil(s);
    }
    shape
}

/// Enumerate voxel indices of the block starting at `corner`, spanning
/// `extent` voxels per axis and visited with stride `step`.
///
/// Indices are produced in C order (last axis fastest), matching the
/// memory order of a standard-layout `ndarray::Array3`.
pub fn block_indices(
    corner: [usize; 3],
    extent: [usize; 3],
    step: [usize; 3],
) -> impl Iterator<Item = [usize; 3]> {
    let shape = block_shape(extent, step);
    let step = step.map(|s| s.max(1));
    (0..shape[0]).flat_map(move |a| {
        (0..shape[1]).flat_map(move |b| {
            (0..shape[2]).map(move |c| {
                [
                    corner[0] + a * step[0],
                    corner[1] + b * step[1],
                    corner[2] + c * step[2],
                ]
            })
        })
    })
}

/// Generate every voxel index of a volume of the given shape.
pub fn generate_grid(shape: [usize; 3]) -> Vec<[usize; 3]> {
    block_indices([0, 0, 0], shape, [1, 1, 1]).collect()
}
