use isobar_codec::{default_quantum, ErrorBoundCodec};
use isobar_grid::{DType, Grid, Shape};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn pair_strategy() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..600).prop_flat_map(|n| {
        (
            prop::collection::vec(-1e4f64..1e4, n),
            prop::collection::vec(-1e4f64..1e4, n),
        )
    })
}

// Property 1: every cell lands within ε, whatever the approximation is
proptest! {
    #[test]
    fn prop_bound_holds_for_any_approx(
        (original, approx) in pair_strategy(),
        eps_exp in -8i32..2,
        block_size in 1usize..300,
    ) {
        let eps = 10f64.powi(eps_exp);
        let n = original.len();
        let original = Grid::from_f64(&[n], &original).unwrap();
        let approx = Grid::from_f64(&[n], &approx).unwrap();
        let codec = ErrorBoundCodec::new(block_size).unwrap();

        let stream = codec.compress(&original, &approx, eps, default_quantum(eps)).unwrap();
        let out = codec.decompress(&approx, &stream).unwrap();
        let max_err = out.max_abs_diff(&original).unwrap();
        prop_assert!(max_err <= eps, "max error {} exceeds ε {}", max_err, eps);
    }
}

// Property 2: f32 grids keep the bound after rounding to f32
proptest! {
    #[test]
    fn prop_bound_holds_for_f32(
        (original, approx) in pair_strategy(),
        eps_exp in -7i32..1,
    ) {
        let eps = 10f64.powi(eps_exp);
        let shape = Shape::new(&[original.len()]).unwrap();
        let original = Grid::from_values(shape.clone(), DType::F32, original).unwrap();
        let approx = Grid::from_values(shape, DType::F32, approx).unwrap();
        let codec = ErrorBoundCodec::new(64).unwrap();

        let stream = codec.compress(&original, &approx, eps, default_quantum(eps)).unwrap();
        let out = codec.decompress(&approx, &stream).unwrap();
        prop_assert!(out.max_abs_diff(&original).unwrap() <= eps);
        prop_assert_eq!(out.dtype(), DType::F32);
    }
}

// Property 3: ε = 0 reproduces the input bit for bit
proptest! {
    #[test]
    fn prop_lossless((original, approx) in pair_strategy()) {
        let n = original.len();
        let original = Grid::from_f64(&[n], &original).unwrap();
        let approx = Grid::from_f64(&[n], &approx).unwrap();
        let codec = ErrorBoundCodec::new(128).unwrap();

        let stream = codec.compress(&original, &approx, 0.0, 0.0).unwrap();
        let out = codec.decompress(&approx, &stream).unwrap();
        prop_assert!(out.bit_eq(&original));
    }
}

#[test]
fn test_outlier_recovered_via_escape() {
    let eps = 1e-6;
    let original = Grid::from_f64(&[3], &[1e30, 2.0, -1e30]).unwrap();
    let approx = Grid::from_f64(&[3], &[0.0, 2.0, 0.0]).unwrap();
    let codec = ErrorBoundCodec::default();

    let stream = codec.compress(&original, &approx, eps, default_quantum(eps)).unwrap();
    assert_eq!(stream.stats().escapes, 2);

    let out = codec.decompress(&approx, &stream).unwrap();
    assert_eq!(out.values()[0].to_bits(), 1e30f64.to_bits());
    assert_eq!(out.values()[2].to_bits(), (-1e30f64).to_bits());
    assert_eq!(out.values()[1], 2.0);
}

#[test]
fn test_better_approximation_packs_smaller() {
    let mut rng = StdRng::seed_from_u64(7);
    let n = 20_000;
    let data: Vec<f64> = (0..n).map(|i| (i as f64 * 0.01).cos() * 10.0 + rng.gen_range(-0.01..0.01)).collect();
    let original = Grid::from_f64(&[n], &data).unwrap();

    let close: Vec<f64> = (0..n).map(|i| (i as f64 * 0.01).cos() * 10.0).collect();
    let close = Grid::from_f64(&[n], &close).unwrap();
    let zeros = Grid::from_f64(&[n], &vec![0.0; n]).unwrap();

    let codec = ErrorBoundCodec::default();
    let eps = 1e-3;
    let good = codec.compress(&original, &close, eps, default_quantum(eps)).unwrap();
    let poor = codec.compress(&original, &zeros, eps, default_quantum(eps)).unwrap();
    assert!(good.stats().payload_bytes < poor.stats().payload_bytes);
    assert!(good.stats().mean_bit_width <= 5.0);
}

#[test]
fn test_parallel_encoding_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(11);
    let n = 50_000;
    let original: Vec<f64> = (0..n).map(|_| rng.gen_range(-100.0..100.0)).collect();
    let approx: Vec<f64> = original.iter().map(|v| v + rng.gen_range(-1.0..1.0)).collect();
    let original = Grid::from_f64(&[n], &original).unwrap();
    let approx = Grid::from_f64(&[n], &approx).unwrap();

    let codec = ErrorBoundCodec::new(1000).unwrap();
    let a = codec.compress(&original, &approx, 0.01, default_quantum(0.01)).unwrap();
    let b = codec.compress(&original, &approx, 0.01, default_quantum(0.01)).unwrap();
    assert_eq!(a, b);
}
