//! Integer-domain LPC prediction and synthesis.
//!
//! The two passes are exact mirrors: [`predict`] folds the fixed-point
//! prediction into a residual stream on encode, [`synthesize`] subtracts
//! the same prediction from the residual stream on decode. Both use the
//! identical tap schedule and rounding, so for any valid input
//! `synthesize(predict(x)) == x` bit for bit.
//!
//! [`predict`]: fn.predict.html
//! [`synthesize`]: fn.synthesize.html

use std::cmp;

use crate::{errors, Result};

fn check_shift(shift: u32) -> Result<()> {
    // a zero shift has no half-bit to round with
    if shift == 0 {
        return errors::invalid_argument_error("coefficient shift must be positive");
    }
    Ok(())
}

/// Sum of `taps` prediction taps over the samples preceding `n`, with the
/// rounding bias already folded in.
///
/// The bias `1 << (shift - 1)` rounds non-negative predictions to nearest
/// half-up and skews negative ones toward zero; decode exactness requires
/// this exact behaviour, so it is not a plain arithmetic rounding. The sum
/// is accumulated in 64 bits: 32-bit samples against wide coefficients
/// overflow 32-bit intermediates long before they overflow the output.
#[inline(always)]
fn prediction(data: &[i32], n: usize, coef: &[i32], taps: usize, shift: u32) -> i32 {
    let window = &data[n - taps..n];
    let sum = coef[..taps]
        .iter()
        .zip(window.iter().rev())
        .map(|(&c, &s)| c as i64 * s as i64)
        .fold(1i64 << (shift - 1), |acc, term| acc + term);
    (sum >> shift) as i32
}

/// Runs the forward predictor over `data`, producing the residual stream.
///
/// The prediction order is `coef.len()`. `residual[0]` is the first sample
/// unchanged; samples `1..order` are predicted from however much history
/// exists (a ramp-up with partial tap counts, not zero-padded history);
/// later samples use the full tap set. The prediction is *added*: the
/// estimators produce coefficients for the polynomial
/// `x[n] + sum(a_i * x[n-i-1])`, so the residual comes out as
/// `data[n] + (prediction >> shift)`.
pub fn predict(data: &[i32], coef: &[i32], shift: u32, residual: &mut [i32]) -> Result<()> {
    check_shift(shift)?;
    if residual.len() != data.len() {
        return errors::invalid_argument_error("residual buffer must match the input length");
    }

    residual.copy_from_slice(data);

    let order = coef.len();
    for n in 1..cmp::min(order, data.len()) {
        residual[n] += prediction(data, n, coef, n, shift);
    }
    for n in cmp::max(order, 1)..data.len() {
        residual[n] += prediction(data, n, coef, order, shift);
    }

    Ok(())
}

/// Runs the inverse filter over `data` in place, reconstructing the
/// samples a residual stream came from.
///
/// Mirror image of [`predict`]: the same ramp-up schedule and rounding
/// bias, with the prediction subtracted. Each reconstructed sample
/// immediately serves as history for the next one.
///
/// [`predict`]: fn.predict.html
pub fn synthesize(data: &mut [i32], coef: &[i32], shift: u32) -> Result<()> {
    check_shift(shift)?;

    let order = coef.len();
    for n in 1..cmp::min(order, data.len()) {
        data[n] -= prediction(data, n, coef, n, shift);
    }
    for n in cmp::max(order, 1)..data.len() {
        data[n] -= prediction(data, n, coef, order, shift);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_known_values() {
        // Q14-ish coefficients: 0.25 and -0.0625 after the shift
        let data = [100i32, 200, 300, 400, 500];
        let coef = [0x4000i32, -0x1000];
        let mut residual = [0i32; 5];

        predict(&data, &coef, 14, &mut residual).unwrap();

        // first sample passes through; the second sees one tap only
        assert_eq!(residual, [100, 300, 475, 650, 825]);
    }

    #[test]
    fn test_predict_synthesize_identity() {
        let data = [100i32, 200, 300, 400, 500];
        let coef = [0x4000i32, -0x1000];
        let mut buffer = [0i32; 5];

        predict(&data, &coef, 14, &mut buffer).unwrap();
        synthesize(&mut buffer, &coef, 14).unwrap();

        assert_eq!(buffer, data);
    }

    #[test]
    fn test_identity_with_negative_predictions() {
        // negative samples exercise the biased shift's skew toward zero
        let data = [-5i32, 17, -4096, 4095, -1, 0, 12345, -12345, 7];
        let coef = [-19543i32, 16001, -3072];
        let mut buffer = [0i32; 9];

        predict(&data, &coef, 12, &mut buffer).unwrap();
        synthesize(&mut buffer, &coef, 12).unwrap();

        assert_eq!(buffer, data);
    }

    #[test]
    fn test_identity_when_order_exceeds_block() {
        let data = [42i32, -17];
        let coef = [100i32, -200, 300, -400];
        let mut buffer = [0i32; 2];

        predict(&data, &coef, 8, &mut buffer).unwrap();
        synthesize(&mut buffer, &coef, 8).unwrap();

        assert_eq!(buffer, data);
    }

    #[test]
    fn test_zero_order_is_pass_through() {
        let data = [9i32, -8, 7];
        let mut residual = [0i32; 3];

        predict(&data, &[], 4, &mut residual).unwrap();
        assert_eq!(residual, data);
    }

    #[test]
    fn test_zero_shift_is_rejected() {
        let data = [1i32, 2, 3];
        let coef = [1i32];
        let mut residual = [0i32; 3];

        assert!(predict(&data, &coef, 0, &mut residual).is_err());
        assert!(synthesize(&mut residual, &coef, 0).is_err());
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let data = [1i32, 2, 3];
        let coef = [1i32];
        let mut residual = [0i32; 2];

        assert!(predict(&data, &coef, 4, &mut residual).is_err());
    }
}
