//! The `lpc` module is the analysis core of the codec: coefficient
//! estimation, quantization and the integer prediction/synthesis pair.
//!
//! An [`LpcCalculator`] owns all scratch memory for one analysis worker.
//! Blocks are windowed, autocorrelated and solved with one of three
//! estimators; the resulting double-precision coefficients go through
//! [`quantize_coefficients`] into signed fixed point, and [`predict`] /
//! [`synthesize`] run the exactly invertible integer filter pair over the
//! samples.
//!
//! [`LpcCalculator`]: struct.LpcCalculator.html
//! [`quantize_coefficients`]: fn.quantize_coefficients.html
//! [`predict`]: fn.predict.html
//! [`synthesize`]: fn.synthesize.html

mod estimate;
mod predict;
mod quantize;

pub use self::predict::{predict, synthesize};
pub use self::quantize::quantize_coefficients;

use std::mem;

use super::{errors, Result};

/// Analysis window applied to a block before spectral estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// No taper; the block is used as-is.
    Rectangular,
    /// Half-sine taper.
    Sine,
    /// Parabolic (Welch) taper.
    Welch,
}

/// Construction bounds for an [`LpcCalculator`].
///
/// [`LpcCalculator`]: struct.LpcCalculator.html
#[derive(Debug, Clone, Copy)]
pub struct LpcCalculatorConfig {
    /// Upper bound on the prediction order of any analysis call.
    pub max_order: usize,
    /// Upper bound on the block length of any analysis call.
    pub max_num_samples: usize,
}

/// Returns the scratch footprint in bytes of a calculator built with
/// `config`.
///
/// The layout is deterministic: three recursion vectors of `max_order + 2`
/// doubles, three coefficient/autocorrelation vectors of `max_order + 1`,
/// the dense `(max_order + 1)^2` normal-equation matrix and the
/// `max_num_samples` window buffer.
pub fn workspace_size(config: &LpcCalculatorConfig) -> usize {
    let order_len = config.max_order + 1;
    let num_doubles = 3 * (config.max_order + 2)
        + 3 * order_len
        + order_len * order_len
        + config.max_num_samples;
    num_doubles * mem::size_of::<f64>()
}

/// Reusable workspace for LPC analysis.
///
/// One calculator serves one analysis worker at a time; the `&mut self`
/// receivers make shared concurrent use unrepresentable, while any number
/// of calculators may run on separate threads. All scratch is allocated by
/// the constructor and reused across calls; no method allocates.
pub struct LpcCalculator {
    max_order: usize,
    max_num_samples: usize,
    // Levinson recursion vectors, length max_order + 2 to hold a_0 and the
    // trailing zero of the shifted copy
    a: Vec<f64>,
    u: Vec<f64>,
    v: Vec<f64>,
    // length max_order + 1 each
    auto_corr: Vec<f64>,
    lpc_coef: Vec<f64>,
    parcor_coef: Vec<f64>,
    // dense (max_order + 1)^2 matrix for the reweighted and Burg solvers
    mat: Vec<Vec<f64>>,
    // windowed copy of the input block, length max_num_samples
    windowed: Vec<f64>,
}

impl LpcCalculator {
    /// Creates a calculator able to handle orders up to
    /// `config.max_order` and blocks up to `config.max_num_samples`
    /// samples.
    pub fn new(config: &LpcCalculatorConfig) -> Result<LpcCalculator> {
        if config.max_order == 0 {
            return errors::invalid_argument_error("max_order must be positive");
        }
        if config.max_num_samples == 0 {
            return errors::invalid_argument_error("max_num_samples must be positive");
        }

        let order_len = config.max_order + 1;
        Ok(LpcCalculator {
            max_order: config.max_order,
            max_num_samples: config.max_num_samples,
            a: vec![0.0; config.max_order + 2],
            u: vec![0.0; config.max_order + 2],
            v: vec![0.0; config.max_order + 2],
            auto_corr: vec![0.0; order_len],
            lpc_coef: vec![0.0; order_len],
            parcor_coef: vec![0.0; order_len],
            mat: vec![vec![0.0; order_len]; order_len],
            windowed: vec![0.0; config.max_num_samples],
        })
    }

    /// The order bound this calculator was built with.
    pub fn max_order(&self) -> usize {
        self.max_order
    }

    /// The block-length bound this calculator was built with.
    pub fn max_num_samples(&self) -> usize {
        self.max_num_samples
    }

    fn check_analysis_args(&self, data: &[f64], order: usize) -> Result<()> {
        if data.is_empty() {
            return errors::invalid_argument_error("analysis requires a non-empty block");
        }
        if order > self.max_order {
            return errors::exceed_max_order_error();
        }
        if data.len() > self.max_num_samples {
            return errors::exceed_max_num_samples_error();
        }
        Ok(())
    }

    fn finish_coefficients(&self, src_offset: usize, coef: &mut [f64]) -> Result<()> {
        let order = coef.len();
        coef.copy_from_slice(&self.lpc_coef[src_offset..src_offset + order]);
        if coef.iter().any(|c| !c.is_finite()) {
            return errors::failed_to_calculate_error("estimator produced non-finite coefficients");
        }
        Ok(())
    }

    /// Estimates LPC coefficients with the Levinson-Durbin recursion over
    /// the windowed block's autocorrelation.
    ///
    /// The prediction order is `coef.len()`; the leading unit tap of the
    /// prediction polynomial is implicit. Nearly silent blocks and blocks
    /// shorter than the order yield all-zero coefficients.
    pub fn coefficients(
        &mut self,
        data: &[f64],
        coef: &mut [f64],
        window: WindowType,
    ) -> Result<()> {
        self.check_analysis_args(data, coef.len())?;
        self.calculate_coef(data, coef.len(), window);
        // lpc_coef holds (1, a_1, .., a_order); skip the unit tap
        self.finish_coefficients(1, coef)
    }

    /// Estimates LPC coefficients minimizing the mean absolute forward
    /// residual, by iteratively reweighted least squares seeded with the
    /// Levinson-Durbin solution.
    ///
    /// Runs at most `max_iterations` reweighted solves, stopping early once
    /// the per-sample objective stops improving. An impulsive residual
    /// distribution is where this estimator pays off over [`coefficients`];
    /// on Gaussian-like material the two agree closely.
    ///
    /// [`coefficients`]: #method.coefficients
    pub fn coefficients_l1(
        &mut self,
        data: &[f64],
        coef: &mut [f64],
        max_iterations: usize,
        window: WindowType,
    ) -> Result<()> {
        self.check_analysis_args(data, coef.len())?;
        self.calculate_coef_l1(data, coef.len(), max_iterations, window);
        self.finish_coefficients(0, coef)
    }

    /// Estimates LPC coefficients with the Burg lattice method, minimizing
    /// the summed forward and backward prediction error.
    ///
    /// The lattice reflection coefficients are bounded by one in magnitude
    /// by construction, so the resulting synthesis filter is always stable.
    pub fn coefficients_burg(
        &mut self,
        data: &[f64],
        coef: &mut [f64],
        window: WindowType,
    ) -> Result<()> {
        self.check_analysis_args(data, coef.len())?;
        self.calculate_coef_burg(data, coef.len(), window);
        self.finish_coefficients(0, coef)
    }

    /// Estimates the expected code length in bits per sample of coding the
    /// block with a predictor of the given order.
    ///
    /// The estimate assumes Laplace-distributed residuals: the windowed
    /// signal power is scaled back to integer PCM amplitude with
    /// `bits_per_sample`, and the PARCOR coefficients supply the variance
    /// reduction of each lattice stage. A nearly silent block estimates to
    /// 0.0; an estimate that comes out non-positive is floored to 1.0.
    pub fn estimate_code_length(
        &mut self,
        data: &[f64],
        bits_per_sample: u32,
        order: usize,
        window: WindowType,
    ) -> Result<f64> {
        // sqrt(2 * e^2), the differential entropy constant of the Laplace
        // distribution in base 2
        const LAPLACE_BETA: f64 = 1.9426950408889634;

        self.check_analysis_args(data, order)?;
        if bits_per_sample == 0 {
            return errors::invalid_argument_error("bits_per_sample must be positive");
        }

        self.calculate_coef(data, order, window);

        // the zero-lag autocorrelation is the windowed signal power; scale
        // from unit amplitude back to integer PCM
        let power = self.auto_corr[0] * 2f64.powi(2 * (bits_per_sample as i32 - 1));
        if power.abs() <= f64::from(f32::MIN_POSITIVE) {
            return Ok(0.0);
        }
        let log2_mean_power = power.log2() - (data.len() as f64).log2();

        let mut log2_var_ratio = 0.0;
        for k in 1..=order {
            let parcor = self.parcor_coef[k];
            log2_var_ratio += (1.0 - parcor * parcor).log2();
        }

        let length = LAPLACE_BETA + 0.5 * (log2_mean_power + log2_var_ratio);
        if length <= 0.0 {
            // very low power input; expect a bit per sample
            return Ok(1.0);
        }
        Ok(length)
    }

    /// Computes the minimum description length score of modelling the block
    /// at the given order.
    ///
    /// `N * sum(ln(1 - parcor_k^2)) + order * ln(N)`: the first term rewards
    /// fit, the second charges for the parameters. Lower is better; compare
    /// across orders to pick one.
    pub fn estimate_mdl(
        &mut self,
        data: &[f64],
        order: usize,
        window: WindowType,
    ) -> Result<f64> {
        self.check_analysis_args(data, order)?;

        self.calculate_coef(data, order, window);

        let num_samples = data.len() as f64;
        let mut mdl = 0.0;
        for k in 1..=order {
            let parcor = self.parcor_coef[k];
            mdl += (1.0 - parcor * parcor).ln();
        }
        mdl *= num_samples;
        mdl += order as f64 * num_samples.ln();

        Ok(mdl)
    }
}
