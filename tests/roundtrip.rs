//! End-to-end losslessness of the analysis/synthesis chain: stereo
//! decorrelation, preemphasis, coefficient estimation, quantization and
//! integer prediction, then the whole path run backwards.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use retort::lpc::{
    predict, quantize_coefficients, synthesize, LpcCalculator, LpcCalculatorConfig, WindowType,
};
use retort::preemphasis::PreemphasisFilter;
use retort::stereo;

const ORDER: usize = 8;
const PRECISION: u32 = 12;
const BLOCK: usize = 1024;

/// Correlated stereo material: a wandering AR tone shared by both channels
/// plus independent noise per channel, quantized to 16-bit-ish integers.
fn synthetic_stereo(num_samples: usize, seed: u64) -> (Vec<i32>, Vec<i32>) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut left = Vec::with_capacity(num_samples);
    let mut right = Vec::with_capacity(num_samples);
    let mut shared = 0.0f64;
    for _ in 0..num_samples {
        shared = 0.97 * shared + 400.0 * (rng.gen::<f64>() - 0.5);
        let l = shared + 30.0 * (rng.gen::<f64>() - 0.5);
        let r = 0.9 * shared + 30.0 * (rng.gen::<f64>() - 0.5);
        left.push(l.round() as i32);
        right.push(r.round() as i32);
    }
    (left, right)
}

/// Encodes one channel: preemphasis, estimation on the filtered samples,
/// quantization, integer prediction. Returns everything the decoder needs.
fn encode_channel(
    lpcc: &mut LpcCalculator,
    samples: &[i32],
) -> (Vec<i32>, Vec<i32>, u32, i32) {
    let mut preem = PreemphasisFilter::new();
    preem.fit_coefficient(samples).unwrap();
    let preem_coef = preem.coefficient();

    let mut filtered = samples.to_vec();
    preem.preemphasis(&mut filtered);

    let analysis: Vec<f64> = filtered.iter().map(|&s| s as f64).collect();
    let mut coef = vec![0.0f64; ORDER];
    lpcc.coefficients(&analysis, &mut coef, WindowType::Sine).unwrap();

    let mut quantized = vec![0i32; ORDER];
    let shift = quantize_coefficients(&coef, PRECISION, &mut quantized).unwrap();

    let mut residual = vec![0i32; filtered.len()];
    predict(&filtered, &quantized, shift, &mut residual).unwrap();

    (residual, quantized, shift, preem_coef)
}

/// Decodes one channel back from its residual stream.
fn decode_channel(residual: &[i32], coef: &[i32], shift: u32, preem_coef: i32) -> Vec<i32> {
    let mut samples = residual.to_vec();
    synthesize(&mut samples, coef, shift).unwrap();

    let mut preem = PreemphasisFilter::new();
    preem.set_coefficient(preem_coef);
    preem.deemphasis(&mut samples);
    samples
}

#[test]
fn stereo_encode_decode_chain_is_lossless() {
    let (orig_left, orig_right) = synthetic_stereo(BLOCK, 0xc0de);

    let mut left = orig_left.clone();
    let mut right = orig_right.clone();
    stereo::lr_to_ms(&mut left, &mut right).unwrap();

    let mut lpcc =
        LpcCalculator::new(&LpcCalculatorConfig { max_order: ORDER, max_num_samples: BLOCK })
            .unwrap();

    let (mid_residual, mid_coef, mid_shift, mid_preem) = encode_channel(&mut lpcc, &left);
    let (side_residual, side_coef, side_shift, side_preem) = encode_channel(&mut lpcc, &right);

    // the residual stream should be cheaper to code than the raw channel
    let raw_energy: i64 = left.iter().map(|&s| (s as i64).abs()).sum();
    let residual_energy: i64 = mid_residual.iter().map(|&s| (s as i64).abs()).sum();
    assert!(residual_energy < raw_energy);

    let mut mid = decode_channel(&mid_residual, &mid_coef, mid_shift, mid_preem);
    let mut side = decode_channel(&side_residual, &side_coef, side_shift, side_preem);
    stereo::ms_to_lr(&mut mid, &mut side).unwrap();

    assert_eq!(mid, orig_left);
    assert_eq!(side, orig_right);
}

#[test]
fn every_estimator_round_trips_through_quantization() {
    let (samples, _) = synthetic_stereo(BLOCK, 42);
    let analysis: Vec<f64> = samples.iter().map(|&s| s as f64).collect();

    let mut lpcc =
        LpcCalculator::new(&LpcCalculatorConfig { max_order: ORDER, max_num_samples: BLOCK })
            .unwrap();

    let mut coef = vec![0.0f64; ORDER];
    let mut estimates = Vec::new();

    lpcc.coefficients(&analysis, &mut coef, WindowType::Welch).unwrap();
    estimates.push(coef.clone());
    lpcc.coefficients_burg(&analysis, &mut coef, WindowType::Welch).unwrap();
    estimates.push(coef.clone());
    lpcc.coefficients_l1(&analysis, &mut coef, 8, WindowType::Welch).unwrap();
    estimates.push(coef.clone());

    for estimate in &estimates {
        let mut quantized = vec![0i32; ORDER];
        let shift = quantize_coefficients(estimate, PRECISION, &mut quantized).unwrap();

        let mut buffer = vec![0i32; samples.len()];
        predict(&samples, &quantized, shift, &mut buffer).unwrap();
        synthesize(&mut buffer, &quantized, shift).unwrap();

        assert_eq!(buffer, samples);
    }
}

#[test]
fn code_length_estimate_is_in_a_sane_range() {
    let (samples, _) = synthetic_stereo(4096, 7);
    // the code length estimator expects unit-amplitude samples and scales
    // back up with bits_per_sample itself
    let analysis: Vec<f64> = samples.iter().map(|&s| s as f64 / 32768.0).collect();

    let mut lpcc =
        LpcCalculator::new(&LpcCalculatorConfig { max_order: ORDER, max_num_samples: 4096 })
            .unwrap();

    let bits = lpcc.estimate_code_length(&analysis, 16, ORDER, WindowType::Sine).unwrap();
    assert!(bits > 0.0 && bits < 16.0, "estimated {} bits per sample", bits);
}
