//! Quantization of double-precision LPC coefficients into the signed
//! fixed-point form consumed by the integer predictor.

use tracing::warn;

use crate::{errors, Result};

/// Exponent part of `frexp`: for a positive normal `x` returns `e` such
/// that `x = m * 2^e` with `m` in `[1/2, 1)`.
#[inline(always)]
fn frexp_exponent(x: f64) -> i32 {
    debug_assert!(x.is_normal() && x > 0.0);
    ((x.to_bits() >> 52) & 0x7ff) as i32 - 1022
}

#[test]
fn test_frexp_exponent() {
    assert_eq!(frexp_exponent(0.5), 0);
    assert_eq!(frexp_exponent(0.7), 0);
    assert_eq!(frexp_exponent(1.0), 1);
    assert_eq!(frexp_exponent(0.25), -1);
    assert_eq!(frexp_exponent(96.0), 7);
}

/// Quantizes `coef` into `quantized` with `precision` bits per coefficient
/// (sign included) and returns the right-shift of the fixed-point format.
///
/// The shift is chosen from the largest coefficient magnitude so that it
/// lands in `[1/2, 1)` of the representable range. Rounding errors are fed
/// back tail-to-head: the low-energy tail of the prediction kernel absorbs
/// the accumulated error so that the head taps, which carry the impulse
/// response's energy, stay as close to their real values as possible.
/// Values falling outside the representable range saturate to
/// `[-2^(precision-1), 2^(precision-1) - 1]`.
///
/// Coefficients too small to represent at all yield all zeros with a shift
/// equal to `precision`.
pub fn quantize_coefficients(
    coef: &[f64],
    precision: u32,
    quantized: &mut [i32],
) -> Result<u32> {
    if precision == 0 || precision > 31 {
        return errors::invalid_argument_error("coefficient precision must be in 1..=31 bits");
    }
    if coef.len() != quantized.len() {
        return errors::invalid_argument_error("coefficient slices must have equal length");
    }

    let qmax = 1i32 << (precision - 1);

    let max = coef.iter().fold(0.0f64, |max, &c| max.max(c.abs()));
    if max <= 2f64.powi(-(precision as i32 - 1)) {
        for q in quantized.iter_mut() {
            *q = 0;
        }
        return Ok(precision);
    }

    let ndigit = frexp_exponent(max);
    // drop the sign bit; the remaining bits bound the shift
    let magnitude_bits = precision as i32 - 1;
    if ndigit >= magnitude_bits {
        return errors::failed_to_calculate_error("coefficient magnitude exceeds precision");
    }
    let shift = (magnitude_bits - ndigit) as u32;

    let scale = 2f64.powi(shift as i32);
    let mut qerror = 0.0f64;
    for (q, &c) in quantized.iter_mut().zip(coef).rev() {
        // fold the error of the previously quantized taps into this one
        qerror += c * scale;
        let mut qtmp = qerror.round() as i32;
        if qtmp >= qmax {
            warn!("quantizer saturated coefficient at +{}", qmax - 1);
            qtmp = qmax - 1;
        } else if qtmp < -qmax {
            warn!("quantizer saturated coefficient at {}", -qmax);
            qtmp = -qmax;
        }
        qerror -= qtmp as f64;
        *q = qtmp;
    }

    Ok(shift)
}

#[test]
fn test_quantize_head_takes_no_tail_error() {
    let coef = [0.7f64, 0.2, 0.05];
    let mut quantized = [0i32; 3];

    let shift = quantize_coefficients(&coef, 8, &mut quantized).unwrap();

    assert_eq!(shift, 7);
    // the head coefficient must come out as a direct rounding, with no
    // error leaked in from the tail
    assert_eq!(quantized[0], (0.7f64 * 128.0).round() as i32);
}

#[test]
fn test_quantize_small_coefficients_zero_out() {
    let coef = [1e-4f64, -2e-4, 5e-5];
    let mut quantized = [7i32; 3];

    let shift = quantize_coefficients(&coef, 8, &mut quantized).unwrap();

    assert_eq!(shift, 8);
    assert_eq!(quantized, [0, 0, 0]);
}

#[test]
fn test_quantize_range_bound() {
    // 0.999 maximum: shift lands the values right below the positive cap
    let coef = [0.999f64, -0.999, 0.5, -0.5];
    let mut quantized = [0i32; 4];

    let precision = 6u32;
    quantize_coefficients(&coef, precision, &mut quantized).unwrap();

    let qmax = 1i32 << (precision - 1);
    for &q in &quantized {
        assert!(q < qmax && q >= -qmax, "q = {}", q);
    }
}

#[test]
fn test_quantize_rejects_bad_arguments() {
    let coef = [0.5f64; 2];
    let mut quantized = [0i32; 2];
    assert!(quantize_coefficients(&coef, 0, &mut quantized).is_err());
    assert!(quantize_coefficients(&coef, 32, &mut quantized).is_err());

    let mut short = [0i32; 1];
    assert!(quantize_coefficients(&coef, 8, &mut short).is_err());
}

#[test]
fn test_quantize_error_feedback_preserves_sum() {
    // error feedback keeps the quantized kernel's total gain close to the
    // real one even when every tap rounds the same way
    let coef = [0.3f64; 8];
    let mut quantized = [0i32; 8];

    let shift = quantize_coefficients(&coef, 10, &mut quantized).unwrap();

    let scale = f64::from(1u32 << shift);
    let real_sum: f64 = coef.iter().sum();
    let quantized_sum: f64 = quantized.iter().map(|&q| q as f64 / scale).sum();
    assert!((real_sum - quantized_sum).abs() <= 1.0 / scale);
}
