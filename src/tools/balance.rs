//! Iterative correction ("balancing") of symmetric contact matrices.
//!
//! Each iteration divides every pixel by the product of its row and column
//! coverage factors, damped towards 1 so that ill-conditioned matrices do not
//! oscillate. The accumulated factors form the bias vector, renormalized at
//! the end to a mean of 1 over the bins that carry any signal.

use log::*;
use ndarray::{
    Array1,
    Array2,
    ArrayView2,
};
use serde::{
    Deserialize,
    Serialize,
};
use statrs::statistics::Statistics;

use crate::data_structs::ContactMatrix;
use crate::utils::{
    is_symmetric,
    nan_mean,
};
use crate::with_field_fn;

/// Share of each iteration's correction that is applied.
const DAMPING: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Upper bound on the number of iterations.
    pub max_iterations:   usize,
    /// Diagonals `|i - j| < ignore_diagonals` are zeroed before balancing.
    pub ignore_diagonals: usize,
    /// Stop once the variance of the coverage factors drops below this
    /// value. Non-positive values always run `max_iterations`.
    pub tolerance:        f64,
}

impl BalanceConfig {
    with_field_fn!(max_iterations, usize);
    with_field_fn!(ignore_diagonals, usize);
    with_field_fn!(tolerance, f64);

    pub fn new(
        max_iterations: usize,
        ignore_diagonals: usize,
        tolerance: f64,
    ) -> Self {
        Self {
            max_iterations,
            ignore_diagonals,
            tolerance,
        }
    }
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            max_iterations:   1000,
            ignore_diagonals: 0,
            tolerance:        1e-5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceReport {
    /// Whether the variance criterion was met before the iteration budget
    /// ran out.
    pub converged:  bool,
    /// Number of completed iterations.
    pub iterations: usize,
}

/// Bias vector and bookkeeping produced by [`balance_in_place`].
#[derive(Debug, Clone, PartialEq)]
pub struct BiasCorrection {
    pub bias:     Array1<f64>,
    /// Bins with zero coverage in the last iteration.
    pub bad_bins: Array1<bool>,
    pub report:   ConvergenceReport,
}

/// Result of [`balance`].
#[derive(Debug, Clone, PartialEq)]
pub struct Balanced {
    pub matrix:   Array2<f64>,
    pub bias:     Array1<f64>,
    pub bad_bins: Array1<bool>,
    pub report:   ConvergenceReport,
}

impl Balanced {
    /// Balanced matrix with the rows and columns of bad bins marked missing.
    pub fn into_contact_matrix(self) -> anyhow::Result<ContactMatrix> {
        let bad = self.bad_bins.to_vec();
        ContactMatrix::from_dense(self.matrix)?.with_bad_bins(&bad)
    }
}

fn validate_input(matrix: ArrayView2<'_, f64>) -> anyhow::Result<usize> {
    let (n_rows, n_cols) = matrix.dim();
    if n_rows != n_cols {
        bail_config!("balancing requires a square matrix, got {}x{}", n_rows, n_cols);
    }
    if let Some(v) = matrix.iter().find(|v| !v.is_finite() || **v < 0.0) {
        bail_config!(
            "balancing requires finite non-negative contacts, found {}",
            v
        );
    }
    if !is_symmetric(matrix) {
        bail_config!("balancing requires a symmetric matrix");
    }
    Ok(n_rows)
}

/// Balances a copy of `matrix`. See [`balance_in_place`].
pub fn balance(
    matrix: ArrayView2<'_, f64>,
    config: &BalanceConfig,
) -> anyhow::Result<Balanced> {
    let mut out = matrix.to_owned();
    let BiasCorrection {
        bias,
        bad_bins,
        report,
    } = balance_in_place(&mut out, config)?;
    Ok(Balanced {
        matrix: out,
        bias,
        bad_bins,
        report,
    })
}

/// Balances `matrix` in place and returns the bias vector.
///
/// The input must be square, symmetric, finite and non-negative. Rows with
/// zero coverage are excluded from the mean coverage at every iteration; the
/// exclusion is re-evaluated each time rather than fixed after the first
/// pass. A matrix with no covered row at all is a computation error; in that
/// case the matrix is left untouched.
pub fn balance_in_place(
    matrix: &mut Array2<f64>,
    config: &BalanceConfig,
) -> anyhow::Result<BiasCorrection> {
    let n = validate_input(matrix.view())?;
    info!(
        "Balancing {}x{} matrix: max_iterations={}, ignore_diagonals={}, tolerance={}",
        n, n, config.max_iterations, config.ignore_diagonals, config.tolerance
    );

    let ignore = config.ignore_diagonals;
    let has_coverage = (0..n).any(|i| {
        matrix
            .row(i)
            .indexed_iter()
            .any(|(j, v)| i.abs_diff(j) >= ignore && *v > 0.0)
    });
    if !has_coverage {
        bail_computation!(
            "every row of the {}x{} matrix has zero coverage, bias is undefined",
            n,
            n
        );
    }

    if !matrix.is_standard_layout() {
        *matrix = matrix.as_standard_layout().into_owned();
    }
    let data = match matrix.as_slice_mut() {
        Some(data) => data,
        None => bail_computation!("matrix buffer is not contiguous"),
    };

    for d in 0..ignore.min(n) {
        for j in 0..n - d {
            data[j * n + j + d] = 0.0;
            data[(j + d) * n + j] = 0.0;
        }
    }

    let mut bias = vec![1f64; n];
    let mut coverage = vec![0f64; n];
    row_sums(data, n, &mut coverage);
    let mut bad = coverage.iter().map(|s| *s == 0.0).collect::<Vec<_>>();

    let mut report = ConvergenceReport {
        converged:  false,
        iterations: 0,
    };
    for iteration in 0..config.max_iterations {
        row_sums(data, n, &mut coverage);
        for (is_bad, s) in bad.iter_mut().zip(coverage.iter()) {
            *is_bad = *s == 0.0;
        }
        let mean = match nan_mean(
            coverage
                .iter()
                .zip(bad.iter())
                .filter(|(_, is_bad)| !**is_bad)
                .map(|(s, _)| *s),
        ) {
            Some(mean) => mean,
            None => {
                bail_computation!(
                    "all rows lost coverage at iteration {}",
                    iteration + 1
                )
            },
        };

        for ((s, is_bad), b) in coverage
            .iter_mut()
            .zip(bad.iter())
            .zip(bias.iter_mut())
        {
            let normalized = if *is_bad { 1.0 } else { *s / mean };
            *s = 1.0 + DAMPING * (normalized - 1.0);
            *b *= *s;
        }

        for i in 0..n {
            let row = &mut data[i * n..(i + 1) * n];
            let si = coverage[i];
            for (v, sj) in row.iter_mut().zip(coverage.iter()) {
                *v /= si * sj;
            }
        }

        let criterion = coverage.iter().population_variance();
        debug!("Iteration {}: coverage variance {:e}", iteration + 1, criterion);
        report.iterations = iteration + 1;

        if config.tolerance > 0.0 && criterion < config.tolerance {
            report.converged = true;
            break;
        }
    }

    let corr = match nan_mean(
        bias.iter()
            .zip(bad.iter())
            .filter(|(_, is_bad)| !**is_bad)
            .map(|(b, _)| *b),
    ) {
        Some(corr) => corr,
        None => bail_computation!("no covered rows left to renormalize the bias"),
    };
    let corr2 = corr * corr;
    data.iter_mut().for_each(|v| *v *= corr2);
    bias.iter_mut().for_each(|b| *b /= corr);

    let n_bad = bad.iter().filter(|b| **b).count();
    if report.converged {
        info!(
            "Balancing converged after {} iterations ({} bad bins)",
            report.iterations, n_bad
        );
    }
    else if config.tolerance > 0.0 {
        warn!(
            "Balancing did not converge in {} iterations ({} bad bins)",
            report.iterations, n_bad
        );
    }
    else {
        debug!(
            "Balancing ran {} iterations without convergence check",
            report.iterations
        );
    }

    Ok(BiasCorrection {
        bias: Array1::from(bias),
        bad_bins: Array1::from(bad),
        report,
    })
}

fn row_sums(
    data: &[f64],
    n: usize,
    out: &mut [f64],
) {
    for (i, s) in out.iter_mut().enumerate() {
        *s = data[i * n..(i + 1) * n].iter().sum();
    }
}
