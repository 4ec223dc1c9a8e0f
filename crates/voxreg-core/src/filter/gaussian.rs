use burn::tensor::{Shape, Tensor, TensorData};
use burn::tensor::backend::Backend;
use burn::tensor::ops::ConvOptions;
use ndarray::Array3;
use crate::image::{Volume, Voxel};
use crate::spatial::Spacing;

/// Failure to bring smoothed samples back from the tensor backend.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// The backend returned data of an unexpected element type.
    #[error("Backend data error: {0}")]
    Data(String),

    /// The returned sample count does not match the volume shape.
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Gaussian smoothing filter.
///
/// Applies a Gaussian smoothing filter to a volume using separable 1D
/// convolutions on a burn backend. Sigmas are expressed in physical units
/// and converted to voxels with the volume spacing.
pub struct GaussianFilter<B: Backend> {
    sigmas: Vec<f64>,
    max_kernel_width: usize,
    device: B::Device,
}

impl<B: Backend> GaussianFilter<B> {
    /// Create a new Gaussian filter with the given standard deviation (in physical units).
    ///
    /// # Arguments
    /// * `sigmas` - Standard deviation per axis; a single value applies to every axis.
    pub fn new(sigmas: Vec<f64>) -> Self {
        Self {
            sigmas,
            max_kernel_width: 33,
            device: Default::default(),
        }
    }

    /// Isotropic filter.
    pub fn isotropic(sigma: f64) -> Self {
        Self::new(vec![sigma])
    }

    /// Set the maximum kernel width (radius * 2 + 1).
    pub fn with_max_kernel_width(mut self, width: usize) -> Self {
        self.max_kernel_width = width.max(1);
        self
    }

    /// Apply the filter to a volume, producing single-precision intensities.
    ///
    /// Fails only if the backend cannot hand the smoothed samples back as `f32`.
    pub fn apply<T: Voxel>(&self, volume: &Volume<T>) -> Result<Volume<f32>, FilterError> {
        let shape = volume.shape();
        let values: Vec<f32> = volume.data().iter().map(|v| v.to_f64() as f32).collect();
        let tensor = Tensor::<B, 1>::from_data(
            TensorData::new(values, Shape::new([values_len(shape)])),
            &self.device,
        )
        .reshape(shape);

        let smoothed = self.apply_tensor(tensor, &volume.spacing());
        let data = smoothed
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| FilterError::Data(format!("{:?}", e)))?;
        let array = Array3::from_shape_vec((shape[0], shape[1], shape[2]), data)?;

        Ok(Volume::new(array, *volume.affine()))
    }

    /// Apply the filter to a tensor directly.
    ///
    /// # Arguments
    /// * `input` - Input tensor
    /// * `spacing` - Physical spacing of the data (used to determine kernel size)
    pub fn apply_tensor(&self, input: Tensor<B, 3>, spacing: &Spacing<3>) -> Tensor<B, 3> {
        let mut data = input;
        let dims = data.dims();

        for d in 0..3 {
            let sigma = self.sigmas.get(d).or(self.sigmas.first()).copied().unwrap_or(0.0);
            if sigma <= 1e-6 || dims[d] < 2 {
                continue;
            }

            let pixel_sigma = sigma / spacing[d];
            let radius = (3.0 * pixel_sigma).ceil() as usize;
            let width = (2 * radius + 1).min(self.max_kernel_width);
            let actual_radius = (width - 1) / 2;
            if actual_radius == 0 {
                continue;
            }

            let kernel = generate_kernel(pixel_sigma, actual_radius);
            let kernel_tensor = Tensor::<B, 1>::from_floats(kernel.as_slice(), &self.device);

            data = self.convolve_1d(data, kernel_tensor, d);
        }
        data
    }

    fn convolve_1d(&self, input: Tensor<B, 3>, kernel: Tensor<B, 1>, dim: usize) -> Tensor<B, 3> {
        let dims = input.dims();

        // Move the filtered axis last
        let mut permute_indices = [0isize; 3];
        let mut idx = 0;
        for i in 0..3 {
            if i != dim {
                permute_indices[idx] = i as isize;
                idx += 1;
            }
        }
        permute_indices[2] = dim as isize;
        let permuted = input.permute(permute_indices);

        let length = dims[dim];
        let batch_size: usize = (0..3).filter(|&i| i != dim).map(|i| dims[i]).product();

        // [Batch, Channels=1, Length] against [Out=1, In=1, KernelSize]
        let reshaped = permuted.reshape([batch_size, 1, length]);
        let kernel_size = kernel.dims()[0];
        let kernel = kernel.reshape([1, 1, kernel_size]);

        let options = ConvOptions::new([1], [kernel_size / 2], [1], 1);
        let convolved = burn::tensor::module::conv1d(reshaped, kernel, None, options);

        let mut permuted_shape = [0usize; 3];
        for (slot, &axis) in permuted_shape.iter_mut().zip(permute_indices.iter()) {
            *slot = dims[axis as usize];
        }
        let restored = convolved.reshape(permuted_shape);

        let mut inverse = [0isize; 3];
        for (new_pos, &old_pos) in permute_indices.iter().enumerate() {
            inverse[old_pos as usize] = new_pos as isize;
        }
        restored.permute(inverse)
    }
}

fn values_len(shape: [usize; 3]) -> usize {
    shape.iter().product()
}

/// Normalized, truncated Gaussian kernel of the given radius.
fn generate_kernel(sigma: f64, radius: usize) -> Vec<f32> {
    let two_sigma2 = 2.0 * sigma * sigma;
    let raw: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma2).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|v| (v / sum) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use nalgebra::Matrix4;

    type B = NdArray<f32>;

    #[test]
    fn test_kernel_is_normalized_and_symmetric() {
        let kernel = generate_kernel(1.5, 4);
        assert_eq!(kernel.len(), 9);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        for i in 0..4 {
            assert!((kernel[i] - kernel[8 - i]).abs() < 1e-7);
        }
        assert!(kernel[4] > kernel[3]);
    }

    #[test]
    fn test_zero_sigma_is_identity() {
        let data = Array3::from_shape_fn((4, 5, 6), |(i, j, k)| (i * 30 + j * 6 + k) as i16);
        let volume = Volume::new(data.clone(), Matrix4::identity());
        let smoothed = GaussianFilter::<B>::isotropic(0.0).apply(&volume).unwrap();
        for (a, b) in data.iter().zip(smoothed.data().iter()) {
            assert_eq!(*a as f32, *b);
        }
    }

    #[test]
    fn test_smoothing_spreads_impulse() {
        let mut data = Array3::<f32>::zeros((9, 9, 9));
        data[[4, 4, 4]] = 1000.0;
        let volume = Volume::new(data, Matrix4::identity());
        let smoothed = GaussianFilter::<B>::isotropic(1.0).apply(&volume).unwrap();

        let s = smoothed.data();
        assert_eq!(smoothed.shape(), [9, 9, 9]);
        assert!(s[[4, 4, 4]] < 1000.0);
        assert!(s[[4, 4, 5]] > 0.0);
        assert!((s[[4, 4, 3]] - s[[4, 4, 5]]).abs() < 1e-3);
        assert!((s[[3, 4, 4]] - s[[4, 4, 3]]).abs() < 1e-3);

        // Mass is preserved away from the borders
        let total: f32 = s.iter().sum();
        assert!((total - 1000.0).abs() < 1.0);
    }

    #[test]
    fn test_max_kernel_width_limits_support() {
        let mut data = Array3::<f32>::zeros((9, 9, 9));
        data[[4, 4, 4]] = 1000.0;
        let volume = Volume::new(data, Matrix4::identity());

        let narrow = GaussianFilter::<B>::isotropic(1.0)
            .with_max_kernel_width(3)
            .apply(&volume)
            .unwrap();
        assert!(narrow.data()[[4, 4, 5]] > 0.0);
        assert_eq!(narrow.data()[[4, 4, 6]], 0.0);

        let wide = GaussianFilter::<B>::isotropic(1.0).apply(&volume).unwrap();
        assert!(wide.data()[[4, 4, 6]] > 0.0);
    }
}
