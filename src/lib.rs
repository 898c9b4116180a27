//! # retort
//!
//! `retort` is the numerical core of a lossless audio codec: linear
//! predictive coding (LPC) analysis, coefficient quantization and the
//! exactly invertible integer prediction/synthesis pair, together with the
//! preemphasis filter and the mid/side stereo transform that feed it.
//!
//! The crate is a synchronous, single-threaded library. An [`LpcCalculator`]
//! owns all scratch memory for one analysis worker; distinct calculators may
//! run on distinct threads. Container parsing, entropy coding and I/O are
//! the caller's business: the interfaces here are plain sample slices,
//! coefficient slices and residual slices.
//!
//! An analysis pass windows a block of samples, estimates coefficients with
//! one of three estimators (Levinson-Durbin, auxiliary function,
//! Burg), quantizes them to signed fixed point and runs the integer
//! predictor to produce residuals. Decoding runs the synthesizer over the
//! residuals with the same quantized coefficients and reconstructs the
//! input bit-exactly.
//!
//! [`LpcCalculator`]: lpc/struct.LpcCalculator.html

use std::result;

pub mod errors;
pub mod lpc;
pub mod preemphasis;
pub mod stereo;
pub mod utils;

/// `Result` type for all retort operations.
pub type Result<T> = result::Result<T, errors::Error>;
