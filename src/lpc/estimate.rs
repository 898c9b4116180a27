//! Internal estimation math for the LPC calculator: windowing, blocked
//! autocorrelation, the Levinson-Durbin recursion, a Cholesky solver and
//! the iteratively reweighted (auxiliary function) and Burg estimators.
//!
//! Everything here works in `f64`. Single precision is not enough: on long
//! blocks the rounding error of the sample autocorrelation is large enough
//! to drive the recursions to NaN.

use tracing::trace;

use super::{LpcCalculator, WindowType};

/// Residuals below this magnitude are clamped before taking reciprocals in
/// the reweighted solver. Doubles as the regularizer of the normal matrix.
const RESIDUAL_EPSILON: f64 = 1e-6;

/// Convergence threshold on the per-sample L1 objective.
const OBJECTIVE_EPSILON: f64 = 1e-8;

/// The factorization hit a non-positive pivot. Never escapes the `lpc`
/// module; callers recover by zeroing coefficients.
pub(super) struct SingularMatrix;

/// Applies an analysis window to `input`, writing into `output`.
///
/// The slices must have equal length.
pub(super) fn apply_window(window: WindowType, input: &[f64], output: &mut [f64]) {
    debug_assert_eq!(input.len(), output.len());

    let num_samples = input.len();
    match window {
        WindowType::Rectangular => {
            output.copy_from_slice(input);
        }
        WindowType::Sine => {
            let scale = std::f64::consts::PI / (num_samples - 1) as f64;
            for (n, (y, &x)) in output.iter_mut().zip(input).enumerate() {
                *y = x * (scale * n as f64).sin();
            }
        }
        WindowType::Welch => {
            // parabolic taper, evaluated from both ends so each weight is
            // computed once; the middle weight of an odd-length window is
            // exactly 1
            let divisor = 4.0 * ((num_samples - 1) as f64).powi(-2);
            for n in 0..num_samples / 2 {
                let weight = divisor * (n * (num_samples - 1 - n)) as f64;
                output[n] = input[n] * weight;
                output[num_samples - n - 1] = input[num_samples - n - 1] * weight;
            }
            if num_samples % 2 == 1 {
                output[num_samples / 2] = input[num_samples / 2];
            }
        }
    }
}

#[test]
fn test_window_symmetry() {
    let input = [1.0f64; 17];
    let mut sine = [0.0f64; 17];
    let mut welch = [0.0f64; 17];

    apply_window(WindowType::Sine, &input, &mut sine);
    apply_window(WindowType::Welch, &input, &mut welch);

    for n in 0..input.len() {
        let mirror = input.len() - n - 1;
        assert!((sine[n] - sine[mirror]).abs() < 1e-12);
        assert!((welch[n] - welch[mirror]).abs() < 1e-12);
    }
    // Welch endpoints vanish, midpoint weight is exactly one
    assert_eq!(welch[0], 0.0);
    assert_eq!(welch[16], 0.0);
    assert_eq!(welch[8], 1.0);
}

#[test]
fn test_window_rectangular_is_copy() {
    let input: Vec<f64> = (0..32).map(|n| (n as f64).cos()).collect();
    let mut output = vec![0.0f64; 32];
    apply_window(WindowType::Rectangular, &input, &mut output);
    assert_eq!(input, output);
}

/// Computes the biased sample autocorrelation of `data` for
/// `auto_corr.len()` lags.
///
/// Lags past the end of the data have no terms and are left at zero. Lags
/// one and up use a cache-blocked evaluation: outer indices are grouped in
/// blocks of stride `2 * lag` so that the multiplicand `data[l + lag + i]`
/// is loaded once and used against the sum of its two neighbours at
/// distance `lag`. The result matches the naive sum up to rounding.
pub(super) fn autocorrelation(data: &[f64], auto_corr: &mut [f64]) {
    let num_samples = data.len();

    for r in auto_corr.iter_mut() {
        *r = 0.0;
    }
    if auto_corr.is_empty() {
        return;
    }

    auto_corr[0] = data.iter().map(|&x| x * x).sum();

    for lag in 1..auto_corr.len().min(num_samples) {
        let lag2 = lag * 2;

        // number of outer blocks in which the shared multiplicand overlaps
        let num_blocks = if 3 * lag < num_samples { 1 + (num_samples - 3 * lag) / lag2 } else { 0 };
        let blocked_len = num_blocks * lag2;

        let mut sum = 0.0;
        for i in 0..lag {
            let mut l = 0;
            while l < blocked_len {
                sum += data[l + lag + i] * (data[l + i] + data[l + lag2 + i]);
                l += lag2;
            }
        }

        // remaining terms past the last full block
        for i in 0..(num_samples - blocked_len - lag) {
            sum += data[blocked_len + lag + i] * data[blocked_len + i];
        }

        auto_corr[lag] = sum;
    }
}

#[cfg(test)]
fn autocorrelation_naive(data: &[f64], auto_corr: &mut [f64]) {
    for (lag, r) in auto_corr.iter_mut().enumerate() {
        *r = 0.0;
        for i in 0..data.len().saturating_sub(lag) {
            *r += data[i] * data[i + lag];
        }
    }
}

#[test]
fn test_autocorrelation_matches_naive() {
    // long enough that every lag exercises both the blocked loop and the tail
    let data: Vec<f64> = (0..257).map(|n| ((n * n) % 31) as f64 - 15.0).collect();

    for lags in &[1usize, 2, 5, 9, 33] {
        let mut blocked = vec![0.0f64; *lags];
        let mut naive = vec![0.0f64; *lags];
        autocorrelation(&data, &mut blocked);
        autocorrelation_naive(&data, &mut naive);

        for (b, n) in blocked.iter().zip(&naive) {
            assert!((b - n).abs() < 1e-9 * n.abs().max(1.0), "{} != {}", b, n);
        }
    }
}

#[test]
fn test_autocorrelation_short_input() {
    // more lags than samples: the out-of-range lags stay zero
    let data = [1.0f64, 2.0, 3.0];
    let mut auto_corr = [f64::NAN; 6];
    autocorrelation(&data, &mut auto_corr);

    assert_eq!(auto_corr[0], 14.0);
    assert_eq!(auto_corr[1], 8.0);
    assert_eq!(auto_corr[2], 3.0);
    assert_eq!(auto_corr[3], 0.0);
    assert_eq!(auto_corr[5], 0.0);
}

/// Solves `mat * x = b` for a symmetric positive definite matrix by an
/// in-place Cholesky factorization of the lower triangle.
///
/// The reciprocal square roots of the pivots are cached in `inv_diag`;
/// `powf(-0.5)` keeps one rounding instead of the two of a square root
/// followed by a division. The upper triangle of `mat` is left untouched.
pub(super) fn cholesky_solve(
    mat: &mut [Vec<f64>],
    dim: usize,
    x: &mut [f64],
    b: &[f64],
    inv_diag: &mut [f64],
) -> Result<(), SingularMatrix> {
    for i in 0..dim {
        let mut sum = mat[i][i];
        for k in 0..i {
            sum -= mat[i][k] * mat[i][k];
        }
        if sum <= 0.0 {
            return Err(SingularMatrix);
        }
        inv_diag[i] = sum.powf(-0.5);

        for j in (i + 1)..dim {
            let mut sum = mat[i][j];
            for k in 0..i {
                sum -= mat[i][k] * mat[j][k];
            }
            mat[j][i] = sum * inv_diag[i];
        }
    }

    // forward substitution on L, then back substitution on L^T
    for i in 0..dim {
        let mut sum = b[i];
        for j in 0..i {
            sum -= mat[i][j] * x[j];
        }
        x[i] = sum * inv_diag[i];
    }
    for i in (0..dim).rev() {
        let mut sum = x[i];
        for j in (i + 1)..dim {
            sum -= mat[j][i] * x[j];
        }
        x[i] = sum * inv_diag[i];
    }

    Ok(())
}

#[test]
fn test_cholesky_solve() {
    // A = [[4, 2], [2, 3]], b = [10, 9]; solution x = [1.5, 2]
    let mut mat = vec![vec![4.0, 2.0], vec![2.0, 3.0]];
    let mut x = [0.0f64; 2];
    let b = [10.0f64, 9.0];
    let mut inv_diag = [0.0f64; 2];

    assert!(cholesky_solve(&mut mat, 2, &mut x, &b, &mut inv_diag).is_ok());
    assert!((x[0] - 1.5).abs() < 1e-12);
    assert!((x[1] - 2.0).abs() < 1e-12);
}

#[test]
fn test_cholesky_singular() {
    let mut mat = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
    let mut x = [0.0f64; 2];
    let b = [1.0f64, 1.0];
    let mut inv_diag = [0.0f64; 2];

    assert!(cholesky_solve(&mut mat, 2, &mut x, &b, &mut inv_diag).is_err());
}

/// Accumulates the reweighted normal equations of the L1 objective for the
/// current coefficients `a` and returns the per-sample objective value.
///
/// The forward residual `r_n = x[n] + sum(a_i * x[n-i-1])` is accumulated
/// into the objective, and its clamped reciprocal weights the rank-one
/// update of the normal matrix (upper triangle only, mirrored afterwards)
/// and of the negated right-hand side.
fn weighted_normal_equations(
    data: &[f64],
    a: &[f64],
    mat: &mut [Vec<f64>],
    rhs: &mut [f64],
) -> f64 {
    let order = a.len();
    debug_assert!(data.len() > order);

    for (i, r) in rhs.iter_mut().enumerate().take(order) {
        *r = 0.0;
        for j in 0..order {
            mat[i][j] = 0.0;
        }
    }

    let mut obj_value = 0.0;
    for n in order..data.len() {
        let mut residual = data[n];
        for (i, &c) in a.iter().enumerate() {
            residual += c * data[n - i - 1];
        }
        let residual = residual.abs();
        obj_value += residual;

        let weight = 1.0 / residual.max(RESIDUAL_EPSILON);
        for i in 0..order {
            rhs[i] -= data[n] * data[n - i - 1] * weight;
            for j in i..order {
                mat[i][j] += data[n - i - 1] * data[n - j - 1] * weight;
            }
        }
    }

    for i in 0..order {
        for j in (i + 1)..order {
            mat[j][i] = mat[i][j];
        }
    }

    obj_value / (data.len() - order) as f64
}

impl LpcCalculator {
    /// Common analysis path: window the block, take its autocorrelation and
    /// run the Levinson-Durbin recursion into the internal coefficient
    /// vectors.
    pub(super) fn calculate_coef(&mut self, data: &[f64], order: usize, window: WindowType) {
        apply_window(window, data, &mut self.windowed[..data.len()]);
        autocorrelation(&self.windowed[..data.len()], &mut self.auto_corr[..order + 1]);

        // blocks shorter than the requested order routinely produce diverging
        // coefficients; treat them as silence
        if data.len() < order {
            self.zero_coefficients(order);
            return;
        }

        self.levinson_durbin(order);
    }

    /// Levinson-Durbin recursion over the Toeplitz system formed by the
    /// autocorrelation already stored in `self.auto_corr`.
    ///
    /// Leaves `(1, a_1, .., a_order)` in `self.lpc_coef` and the PARCOR
    /// coefficients in `self.parcor_coef` with `parcor[0] = 0`.
    fn levinson_durbin(&mut self, order: usize) {
        // a silent block predicts a silent output system
        if self.auto_corr[0].abs() < f64::from(f32::EPSILON) || order == 0 {
            self.zero_coefficients(order);
            return;
        }

        for i in 0..order + 2 {
            self.a[i] = 0.0;
            self.u[i] = 0.0;
            self.v[i] = 0.0;
        }

        let r = &self.auto_corr;
        let mut e = r[0];
        self.a[0] = 1.0;
        self.a[1] = -r[1] / r[0];
        self.parcor_coef[0] = 0.0;
        self.parcor_coef[1] = r[1] / e;
        e += r[1] * self.a[1];
        self.u[0] = 1.0;
        self.v[1] = 1.0;

        for k in 1..order {
            let mut gamma = 0.0;
            for i in 0..=k {
                gamma += self.a[i] * r[k + 1 - i];
            }
            gamma /= -e;
            e *= 1.0 - gamma * gamma;
            // prediction error power cannot go negative
            debug_assert!(e >= 0.0);

            // u = (1, a_1 .. a_k, 0), v = reverse(u)
            for i in 0..k {
                self.u[i + 1] = self.a[i + 1];
                self.v[k - i] = self.a[i + 1];
            }
            self.u[0] = 1.0;
            self.u[k + 1] = 0.0;
            self.v[0] = 0.0;
            self.v[k + 1] = 1.0;

            for i in 0..k + 2 {
                self.a[i] = self.u[i] + gamma * self.v[i];
            }

            // PARCOR is the negated reflection coefficient
            self.parcor_coef[k + 1] = -gamma;
            debug_assert!(gamma.abs() < 1.0);
        }

        self.lpc_coef[..order + 1].copy_from_slice(&self.a[..order + 1]);
    }

    /// Iteratively reweighted estimation of the coefficients minimizing the
    /// mean absolute forward residual, seeded with the Levinson-Durbin
    /// solution.
    ///
    /// Leaves `(a_1, .., a_order)` in `self.lpc_coef[..order]`. The
    /// reweighted iterations run on the raw (unwindowed) block.
    pub(super) fn calculate_coef_l1(
        &mut self,
        data: &[f64],
        order: usize,
        max_iterations: usize,
        window: WindowType,
    ) {
        self.calculate_coef(data, order, window);
        for i in 0..order {
            self.a[i] = self.lpc_coef[i + 1];
        }

        // the Levinson guard cases (silence, short block) stay all-zero
        if self.auto_corr[0].abs() < f64::from(f32::EPSILON) || data.len() < order + 1 {
            self.zero_coefficients(order);
            return;
        }

        let mut prev_obj_value = f64::MAX;
        for iteration in 0..max_iterations {
            let obj_value =
                weighted_normal_equations(data, &self.a[..order], &mut self.mat, &mut self.u);
            trace!("reweighted iteration {}: objective {}", iteration, obj_value);

            if cholesky_solve(
                &mut self.mat,
                order,
                &mut self.a[..order],
                &self.u[..order],
                &mut self.v,
            )
            .is_err()
            {
                // singular only when the block is numerically all zero
                self.zero_coefficients(order);
                return;
            }

            if (prev_obj_value - obj_value).abs() < OBJECTIVE_EPSILON {
                break;
            }
            prev_obj_value = obj_value;
        }

        self.lpc_coef[..order].copy_from_slice(&self.a[..order]);
    }

    /// Burg estimator in its covariance-matrix form, minimizing the summed
    /// forward and backward prediction error.
    ///
    /// Leaves `(a_1, .., a_order)` in `self.lpc_coef[..order]`. Each row of
    /// the covariance matrix is the autocorrelation of a truncated window,
    /// so the assembly reuses the blocked autocorrelation routine.
    pub(super) fn calculate_coef_burg(&mut self, data: &[f64], order: usize, window: WindowType) {
        apply_window(window, data, &mut self.windowed[..data.len()]);

        if data.len() < order {
            self.zero_coefficients(order);
            return;
        }

        // row 0 doubles as the plain full-block autocorrelation
        for i in 0..=order {
            let truncated = data.len() - i;
            autocorrelation(&self.windowed[..truncated], &mut self.mat[i][i..=order]);
            for j in (i + 1)..=order {
                self.mat[j][i] = self.mat[i][j];
            }
        }

        // same silence fallback as the Toeplitz path; the lattice update
        // below would divide zero by zero
        if self.mat[0][0].abs() < f64::from(f32::EPSILON) {
            self.zero_coefficients(order);
            return;
        }

        for i in 0..=order {
            self.a[i] = 0.0;
        }
        self.a[0] = 1.0;

        for k in 0..order {
            let mut fk_plus_bk = 0.0;
            let mut off_diag = 0.0;
            for i in 0..=k {
                fk_plus_bk += self.a[i]
                    * self.a[i]
                    * (self.mat[i][i] + self.mat[k + 1 - i][k + 1 - i]);
                // off-diagonal terms are symmetric, sum half and double
                for j in (i + 1)..=k {
                    off_diag += self.a[i]
                        * self.a[j]
                        * (self.mat[i][j] + self.mat[k + 1 - i][k + 1 - j]);
                }
            }
            fk_plus_bk += 2.0 * off_diag;

            let mut ck = 0.0;
            for i in 0..=k {
                for j in 0..=k {
                    ck += self.a[i] * self.a[j] * self.mat[i][k + 1 - j];
                }
            }

            let mu = -2.0 * ck / fk_plus_bk;
            debug_assert!(mu.abs() <= 1.0);

            for i in 0..=(k + 1) / 2 {
                let tmp1 = self.a[i];
                let tmp2 = self.a[k + 1 - i];
                self.a[i] = tmp1 + mu * tmp2;
                self.a[k + 1 - i] = mu * tmp1 + tmp2;
            }
        }

        self.lpc_coef[..order].copy_from_slice(&self.a[1..=order]);
    }

    fn zero_coefficients(&mut self, order: usize) {
        for i in 0..=order {
            self.lpc_coef[i] = 0.0;
            self.parcor_coef[i] = 0.0;
        }
    }
}
