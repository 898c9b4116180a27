//! The `preemphasis` module implements the first-order fixed-point
//! preemphasis/deemphasis pair applied around the predictor.
//!
//! Preemphasis is a mild high-pass whitening step: each sample has a scaled
//! copy of its predecessor subtracted before coding, which flattens the
//! spectrum of strongly low-passed material and helps the predictor. The
//! coefficient is fitted per block from the lag-one autocorrelation and kept
//! in Q[`COEF_SHIFT`] fixed point so that the decoder can undo the filter
//! bit-exactly.

use tracing::debug;

use super::{errors, Result};

/// Fixed-point position of the preemphasis coefficient (Q5).
pub const COEF_SHIFT: u32 = 5;

/// First-order preemphasis filter state.
///
/// `prev` is the last input sample seen by the forward filter, which is also
/// the last output sample of the inverse filter; it carries across blocks.
/// The filter must see blocks in stream order, and `coef` must not change
/// between a forward pass and the inverse pass that undoes it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreemphasisFilter {
    prev: i32,
    coef: i32,
}

impl PreemphasisFilter {
    /// Creates a filter with zeroed state and a zero coefficient.
    pub fn new() -> PreemphasisFilter {
        PreemphasisFilter { prev: 0, coef: 0 }
    }

    /// Returns the current fixed-point coefficient.
    pub fn coefficient(&self) -> i32 {
        self.coef
    }

    /// Restores a coefficient read back from the stream.
    pub fn set_coefficient(&mut self, coef: i32) {
        self.coef = coef;
    }

    /// Fits the coefficient to a block of samples.
    ///
    /// The lag-one autocorrelation normalized by signal power gives the
    /// optimal first-order predictor; it is rounded into Q[`COEF_SHIFT`] and
    /// saturated just below +1.0. A nearly silent block, or one whose
    /// neighbouring samples anti-correlate (an oscillating signal that
    /// preemphasis would only amplify), fits a zero coefficient instead.
    pub fn fit_coefficient(&mut self, buffer: &[i32]) -> Result<()> {
        if buffer.is_empty() {
            return errors::invalid_argument_error("preemphasis fit requires samples");
        }

        let mut corr0 = 0.0f64;
        let mut corr1 = 0.0f64;
        let mut curr = buffer[0] as f64;
        for &next in &buffer[1..] {
            let succ = next as f64;
            corr0 += curr * curr;
            corr1 += curr * succ;
            curr = succ;
        }

        self.coef = if corr0 < 1e-6 || corr1 < 0.0 {
            debug!("preemphasis fit degenerate, using zero coefficient");
            0
        } else {
            let rho = corr1 / corr0;
            let max = (1 << (COEF_SHIFT - 1)) - 1;
            ((rho * f64::from(1u32 << COEF_SHIFT)).round() as i32).min(max)
        };

        Ok(())
    }

    /// Runs the forward filter over a block in place.
    ///
    /// `buffer[n] -= (prev_input * coef) >> COEF_SHIFT`, where `prev_input`
    /// is the sample value before this pass overwrote it. The last input
    /// sample is retained for the next block.
    pub fn preemphasis(&mut self, buffer: &mut [i32]) {
        let mut prev = self.prev;
        for sample in buffer.iter_mut() {
            let input = *sample;
            *sample -= (prev * self.coef) >> COEF_SHIFT;
            prev = input;
        }
        self.prev = prev;
    }

    /// Runs the inverse filter over a block in place.
    ///
    /// Exact inverse of [`preemphasis`] for an unchanged coefficient: each
    /// reconstructed sample feeds the correction of the next one, and the
    /// carried `prev` seeds the first.
    ///
    /// [`preemphasis`]: #method.preemphasis
    pub fn deemphasis(&mut self, buffer: &mut [i32]) {
        if buffer.is_empty() {
            return;
        }

        buffer[0] += (self.prev * self.coef) >> COEF_SHIFT;
        for n in 1..buffer.len() {
            buffer[n] += (buffer[n - 1] * self.coef) >> COEF_SHIFT;
        }
        self.prev = buffer[buffer.len() - 1];
    }
}

#[test]
fn test_fit_coefficient_silence() {
    let mut filter = PreemphasisFilter::new();
    filter.fit_coefficient(&[0; 64]).unwrap();
    assert_eq!(filter.coefficient(), 0);
}

#[test]
fn test_fit_coefficient_anti_correlated() {
    // alternating signal: lag-one correlation is negative
    let samples: Vec<i32> = (0..64).map(|n| if n % 2 == 0 { 1000 } else { -1000 }).collect();
    let mut filter = PreemphasisFilter::new();
    filter.fit_coefficient(&samples).unwrap();
    assert_eq!(filter.coefficient(), 0);
}

#[test]
fn test_fit_coefficient_constant_saturates() {
    // a constant signal correlates perfectly; rho = 1.0 saturates below +1
    let mut filter = PreemphasisFilter::new();
    filter.fit_coefficient(&[500; 64]).unwrap();
    assert_eq!(filter.coefficient(), (1 << (COEF_SHIFT - 1)) - 1);
}

#[test]
fn test_round_trip_identity() {
    let original: Vec<i32> = vec![13, -7, 1024, 1030, 1019, -2048, 0, 55, 56, 57, -1];

    let mut encoder = PreemphasisFilter::new();
    encoder.fit_coefficient(&original).unwrap();
    let coef = encoder.coefficient();

    let mut buffer = original.clone();
    encoder.preemphasis(&mut buffer);

    let mut decoder = PreemphasisFilter::new();
    decoder.set_coefficient(coef);
    decoder.deemphasis(&mut buffer);

    assert_eq!(buffer, original);
}

#[test]
fn test_round_trip_carries_state_across_blocks() {
    let block_a: Vec<i32> = (0..32).map(|n| 700 + 3 * n).collect();
    let block_b: Vec<i32> = (0..32).map(|n| 796 - 5 * n).collect();

    let mut encoder = PreemphasisFilter::new();
    encoder.fit_coefficient(&block_a).unwrap();
    let coef = encoder.coefficient();
    assert_ne!(coef, 0);

    let mut enc_a = block_a.clone();
    let mut enc_b = block_b.clone();
    encoder.preemphasis(&mut enc_a);
    encoder.preemphasis(&mut enc_b);

    let mut decoder = PreemphasisFilter::new();
    decoder.set_coefficient(coef);
    decoder.deemphasis(&mut enc_a);
    decoder.deemphasis(&mut enc_b);

    assert_eq!(enc_a, block_a);
    assert_eq!(enc_b, block_b);
}
