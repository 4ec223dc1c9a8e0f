use nalgebra::{Matrix3, Matrix4};
use ndarray::Array3;
use proptest::prelude::*;
use voxreg_core::spatial::Point;
use voxreg_core::Volume;

fn make_affine(angle_x: f64, angle_y: f64, angle_z: f64, spacing: [f64; 3], origin: [f64; 3]) -> Matrix4<f64> {
    let (sx, cx) = angle_x.sin_cos();
    let (sy, cy) = angle_y.sin_cos();
    let (sz, cz) = angle_z.sin_cos();

    let rz = Matrix3::new(cz, -sz, 0.0, sz, cz, 0.0, 0.0, 0.0, 1.0);
    let ry = Matrix3::new(cy, 0.0, sy, 0.0, 1.0, 0.0, -sy, 0.0, cy);
    let rx = Matrix3::new(1.0, 0.0, 0.0, 0.0, cx, -sx, 0.0, sx, cx);
    let linear = rx * ry * rz * Matrix3::from_diagonal(&nalgebra::Vector3::from(spacing));

    let mut affine = Matrix4::identity();
    affine.fixed_view_mut::<3, 3>(0, 0).copy_from(&linear);
    affine[(0, 3)] = origin[0];
    affine[(1, 3)] = origin[1];
    affine[(2, 3)] = origin[2];
    affine
}

proptest! {
    #[test]
    fn test_coordinate_roundtrip(
        ox in -100.0f64..100.0, oy in -100.0f64..100.0, oz in -100.0f64..100.0,
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14,
        px in -50.0f64..50.0, py in -50.0f64..50.0, pz in -50.0f64..50.0
    ) {
        let affine = make_affine(ax, ay, az, [sx, sy, sz], [ox, oy, oz]);
        let volume = Volume::new(Array3::<u8>::zeros((2, 2, 2)), affine);
        let point = Point::new([px, py, pz]);

        let index = volume.world_to_index(&point).unwrap();
        let recovered = volume.index_to_world(&index);

        prop_assert!((point[0] - recovered[0]).abs() < 1e-6, "X mismatch: {} vs {}", point[0], recovered[0]);
        prop_assert!((point[1] - recovered[1]).abs() < 1e-6, "Y mismatch: {} vs {}", point[1], recovered[1]);
        prop_assert!((point[2] - recovered[2]).abs() < 1e-6, "Z mismatch: {} vs {}", point[2], recovered[2]);
    }

    #[test]
    fn test_spacing_recovered_from_rotated_affine(
        sx in 0.1f64..5.0, sy in 0.1f64..5.0, sz in 0.1f64..5.0,
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14
    ) {
        let affine = make_affine(ax, ay, az, [sx, sy, sz], [0.0, 0.0, 0.0]);
        let volume = Volume::new(Array3::<f32>::zeros((2, 2, 2)), affine);
        let spacing = volume.spacing();

        prop_assert!((spacing[0] - sx).abs() < 1e-9);
        prop_assert!((spacing[1] - sy).abs() < 1e-9);
        prop_assert!((spacing[2] - sz).abs() < 1e-9);
    }
}
