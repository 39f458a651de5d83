use std::fmt;
use std::str::FromStr;

use log::*;
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{
    Rng,
    SeedableRng,
};
use serde::{
    Deserialize,
    Serialize,
};
use statrs::statistics::{
    Data,
    Median,
    Statistics,
};

use crate::error::HicError;

fn finite_values<I>(values: I) -> Vec<f64>
where
    I: IntoIterator<Item = f64>, {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .collect()
}

/// Mean of the finite values, `None` when there are none.
pub fn nan_mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>, {
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0f64, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Population variance of the finite values, `None` when there are none.
pub fn nan_var<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>, {
    let finite = finite_values(values);
    if finite.is_empty() {
        return None;
    }
    Some(finite.iter().population_variance())
}

/// Median of the finite values, `None` when there are none.
pub fn nan_median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>, {
    let finite = finite_values(values);
    if finite.is_empty() {
        return None;
    }
    Some(Data::new(finite).median())
}

/// Median absolute deviation from the median over the finite values.
pub fn mad<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>, {
    let finite = finite_values(values);
    let median = nan_median(finite.iter().copied())?;
    nan_median(finite.into_iter().map(|v| (v - median).abs()))
}

/// Comedian, the median-based counterpart of Pearson's r.
///
/// `med((x - med x)(y - med y)) / MAD(x) / MAD(y)`, computed over pairs where
/// both values are finite. Returns `None` for mismatched lengths, no usable
/// pairs or a zero MAD.
pub fn comed(
    xs: &[f64],
    ys: &[f64],
) -> Option<f64> {
    if xs.len() != ys.len() {
        warn!(
            "Cannot calculate comedian: xs length ({}) doesn't match ys \
             length ({})",
            xs.len(),
            ys.len()
        );
        return None;
    }
    let (xs, ys): (Vec<f64>, Vec<f64>) = xs
        .iter()
        .zip(ys)
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(x, y)| (*x, *y))
        .unzip();

    let med_x = nan_median(xs.iter().copied())?;
    let med_y = nan_median(ys.iter().copied())?;
    let mad_x = mad(xs.iter().copied())?;
    let mad_y = mad(ys.iter().copied())?;
    if mad_x == 0.0 || mad_y == 0.0 {
        debug!("MAD is zero, comedian is undefined");
        return None;
    }
    let co_median = nan_median(
        xs.iter()
            .zip(ys.iter())
            .map(|(x, y)| (x - med_x) * (y - med_y)),
    )?;
    Some(co_median / mad_x / mad_y)
}

/// Method used by [`normalize_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormMethod {
    /// `(x - mean) / std`
    Z,
    /// `(x - median) / MAD`
    Mad,
    /// Robust z-score: `(x - median) / MAD * 0.67449`
    MadZ,
}

const MADZ_SCALE: f64 = 0.67449;

impl FromStr for NormMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "z" => Ok(Self::Z),
            "mad" => Ok(Self::Mad),
            "madz" => Ok(Self::MadZ),
            other => {
                Err(HicError::InvalidConfig(format!(
                    "unknown normalization method: {other}"
                ))
                .into())
            },
        }
    }
}

impl fmt::Display for NormMethod {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            NormMethod::Z => "z",
            NormMethod::Mad => "mad",
            NormMethod::MadZ => "madz",
        };
        f.write_str(name)
    }
}

/// Centers values by their first moment and scales by the second, ignoring
/// non-finite entries when estimating both.
///
/// Non-finite inputs stay non-finite in the output. If either moment is
/// undefined, every output element is NaN.
pub fn normalize_score(
    values: &[f64],
    method: NormMethod,
) -> Vec<f64> {
    let (center, scale) = match method {
        NormMethod::Z => {
            (
                nan_mean(values.iter().copied()),
                nan_var(values.iter().copied()).map(f64::sqrt),
            )
        },
        NormMethod::Mad | NormMethod::MadZ => {
            (
                nan_median(values.iter().copied()),
                mad(values.iter().copied()),
            )
        },
    };
    let (center, scale) = match (center, scale) {
        (Some(center), Some(scale)) => (center, scale),
        _ => {
            warn!("Cannot normalize by {method}: no finite values");
            return vec![f64::NAN; values.len()];
        },
    };
    let factor = if method == NormMethod::MadZ {
        MADZ_SCALE
    }
    else {
        1.0
    };

    values
        .iter()
        .map(|v| (v - center) / scale * factor)
        .collect()
}

/// Estimates the standard deviation from `n` elements drawn with
/// replacement. Uses every element when there are fewer than `n`.
///
/// Non-finite values are ignored. The draw is deterministic for a given
/// `seed`.
pub fn stochastic_sd(
    values: &[f64],
    n: usize,
    seed: u64,
) -> Option<f64> {
    let finite = finite_values(values.iter().copied());
    if finite.is_empty() {
        return None;
    }
    if finite.len() < n {
        return nan_var(finite).map(f64::sqrt);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let sample = (0..n)
        .map(|_| finite[rng.gen_range(0..finite.len())])
        .collect::<Vec<_>>();
    nan_var(sample).map(f64::sqrt)
}

const SYMMETRY_SAMPLE: usize = 10_000;

/// Tests whether a square matrix is symmetric up to a tolerance scaled by
/// its spread: `max |A - A^T| < sd(A) * 1e-7 + 1e-5`.
///
/// Pairs where either side is non-finite are not compared.
pub fn is_symmetric(mat: ArrayView2<'_, f64>) -> bool {
    let (n_rows, n_cols) = mat.dim();
    if n_rows != n_cols {
        return false;
    }

    let mut max_diff = 0f64;
    for i in 0..n_rows {
        for j in (i + 1)..n_cols {
            let (a, b) = (mat[[i, j]], mat[[j, i]]);
            if a.is_finite() && b.is_finite() {
                max_diff = max_diff.max((a - b).abs());
            }
        }
    }
    if max_diff == 0.0 {
        return true;
    }

    let sd = sampled_sd(mat, SYMMETRY_SAMPLE, 0).unwrap_or(0.0);
    max_diff < sd * 1e-7 + 1e-5
}

/// Standard deviation of `n` pixels of `mat` drawn with replacement,
/// without copying the matrix. Matrices with at most `n` pixels use every
/// pixel. Non-finite draws are skipped.
fn sampled_sd(
    mat: ArrayView2<'_, f64>,
    n: usize,
    seed: u64,
) -> Option<f64> {
    let (n_rows, n_cols) = mat.dim();
    let total = n_rows * n_cols;
    if total <= n {
        return nan_var(mat.iter().copied()).map(f64::sqrt);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let sample = (0..n).map(|_| {
        let k = rng.gen_range(0..total);
        mat[[k / n_cols, k % n_cols]]
    });
    nan_var(sample).map(f64::sqrt)
}
