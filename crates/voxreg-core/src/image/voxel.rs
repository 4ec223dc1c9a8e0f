//! Scalar voxel types accepted by the registration core.

/// A scalar voxel value.
///
/// Implemented for the primitive numeric types and `bool`. Integer types
/// report `IS_INTEGER` so that intensity clamping can keep small integer
/// ranges unscaled.
pub trait Voxel: Copy + Send + Sync + 'static {
    /// Whether the type only holds integral values.
    const IS_INTEGER: bool;

    /// Widen the value to double precision.
    fn to_f64(self) -> f64;
}

macro_rules! impl_voxel {
    ($is_integer:expr => $($t:ty),*) => {
        $(
            impl Voxel for $t {
                const IS_INTEGER: bool = $is_integer;

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_voxel!(true => u8, i8, u16, i16, u32, i32, u64, i64);
impl_voxel!(false => f32, f64);

impl Voxel for bool {
    const IS_INTEGER: bool = true;

    #[inline]
    fn to_f64(self) -> f64 {
        if self { 1.0 } else { 0.0 }
    }
}
