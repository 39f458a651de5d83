//! Observed-over-expected normalization of contact matrices.
//!
//! Diagonals (contacts at a fixed genomic separation) are grouped into
//! geometrically growing distance bins, and every pixel is divided by the
//! mean of its bin. The result removes the distance-dependent decay of
//! contact frequency.

use itertools::Itertools;
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

use crate::data_structs::{
    DistanceBin,
    LazyToeplitz,
    ValidityMask,
};
use crate::utils::is_symmetric;
use crate::with_field_fn;

/// Integer bin edges evenly spaced in log-space between `lo` and `hi`
/// (inclusive).
///
/// Exactly one of `ratio` (target ratio between successive edges) or
/// `n_bins` (target number of edges) must be given. The number of distinct
/// edges after rounding is not guaranteed. With `prepend_zero`, `0` is
/// inserted in front.
pub fn logbins(
    lo: usize,
    hi: usize,
    ratio: Option<f64>,
    n_bins: Option<usize>,
    prepend_zero: bool,
) -> anyhow::Result<Vec<usize>> {
    let n_points = match (ratio, n_bins) {
        (Some(_), Some(_)) | (None, None) => {
            bail_config!("please specify either the edge ratio or the number of bins")
        },
        (Some(ratio), None) => {
            if !ratio.is_finite() || ratio <= 1.0 {
                bail_config!("edge ratio must be a finite number above 1, got {}", ratio);
            }
            ((hi as f64 / lo as f64).ln() / ratio.ln()).floor() as usize
        },
        (None, Some(n_bins)) => {
            if n_bins == 0 {
                bail_config!("number of bins must be positive");
            }
            n_bins
        },
    };
    if lo == 0 || hi < lo {
        bail_config!("log bins need 1 <= lo <= hi, got lo={} hi={}", lo, hi);
    }

    let mut edges = if hi == lo {
        vec![lo]
    }
    else {
        let n_points = n_points.max(2);
        let (log_lo, log_hi) = ((lo as f64).log10(), (hi as f64).log10());
        let step = (log_hi - log_lo) / (n_points - 1) as f64;
        let mut points = (0..n_points)
            .map(|k| 10f64.powf(log_lo + k as f64 * step).round_ties_even() as usize)
            .collect::<Vec<_>>();
        points[0] = lo;
        points[n_points - 1] = hi;
        points.sort_unstable();
        points.dedup();
        points
    };

    if prepend_zero {
        edges.insert(0, 0);
    }
    Ok(edges)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectedConfig {
    /// Ratio of the largest to the shortest distance in each distance bin.
    pub dist_bin_edge_ratio: f64,
}

impl ExpectedConfig {
    with_field_fn!(dist_bin_edge_ratio, f64);
}

impl Default for ExpectedConfig {
    fn default() -> Self {
        Self {
            dist_bin_edge_ratio: 1.03,
        }
    }
}

/// Distance-decay profile collected while normalizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceProfile {
    /// Edges of the distance bins; bin `k` is `[dist_bins[k], dist_bins[k + 1])`.
    pub dist_bins:  Vec<usize>,
    /// Sum of valid pixels per bin (one triangle).
    pub sum_pixels: Vec<f64>,
    /// Number of valid pixels per bin (one triangle).
    pub n_pixels:   Vec<usize>,
}

impl DistanceProfile {
    pub fn bins(&self) -> impl Iterator<Item = DistanceBin> + '_ {
        self.dist_bins
            .iter()
            .copied()
            .tuple_windows::<(usize, usize)>()
            .zip(self.sum_pixels.iter().zip(self.n_pixels.iter()))
            .map(|((lo, hi), (sum, n_valid))| {
                DistanceBin {
                    lo,
                    hi,
                    sum: *sum,
                    n_valid: *n_valid,
                }
            })
    }

    /// Expected contact frequency per diagonal offset, as a symmetric lazy
    /// Toeplitz matrix.
    ///
    /// Offsets whose bin has no valid pixels hold NaN.
    pub fn expected_background(&self) -> anyhow::Result<LazyToeplitz> {
        let n = self.dist_bins.last().copied().unwrap_or(0);
        let mut expected = Array1::from_elem(n, f64::NAN);
        for bin in self.bins() {
            if let Some(mean) = bin.mean() {
                expected
                    .slice_mut(ndarray::s![bin.lo..bin.hi])
                    .fill(mean);
            }
        }
        LazyToeplitz::new(expected, None)
    }
}

/// Result of [`observed_over_expected`].
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedOverExpected {
    pub matrix:  Array2<f64>,
    pub profile: DistanceProfile,
}

fn validate_input(
    matrix: ArrayView2<'_, f64>,
    mask: Option<&ValidityMask>,
    config: &ExpectedConfig,
) -> anyhow::Result<usize> {
    let (n_rows, n_cols) = matrix.dim();
    if n_rows != n_cols {
        bail_config!(
            "observed/expected requires a square matrix, got {}x{}",
            n_rows,
            n_cols
        );
    }
    if !config.dist_bin_edge_ratio.is_finite() || config.dist_bin_edge_ratio <= 1.0 {
        bail_config!(
            "distance bin edge ratio must be above 1, got {}",
            config.dist_bin_edge_ratio
        );
    }
    if let Some(mask) = mask {
        mask.check_extent(n_rows)?;
    }
    if !is_symmetric(matrix) {
        bail_config!("observed/expected requires a symmetric matrix");
    }
    Ok(n_rows)
}

/// Normalizes a copy of `matrix` for distance-dependent contact decay. See
/// [`observed_over_expected_in_place`].
pub fn observed_over_expected(
    matrix: ArrayView2<'_, f64>,
    mask: Option<&ValidityMask>,
    config: &ExpectedConfig,
) -> anyhow::Result<ObservedOverExpected> {
    let mut out = matrix.as_standard_layout().into_owned();
    let profile = observed_over_expected_in_place(&mut out, mask, config)?;
    Ok(ObservedOverExpected {
        matrix: out,
        profile,
    })
}

#[inline]
fn admits(
    mask: Option<&ValidityMask>,
    data: &[f64],
    n: usize,
    i: usize,
    j: usize,
) -> bool {
    data[i * n + j].is_finite() && mask.map_or(true, |mask| mask.is_valid(i, j))
}

/// Divides every valid pixel of `matrix` by the mean of its distance bin.
///
/// A pixel is valid when `mask` admits it (a per-bin mask admits pixels whose
/// two bins are both valid) and its value is finite. Bins without valid
/// pixels or with a zero mean are left untouched.
pub fn observed_over_expected_in_place(
    matrix: &mut Array2<f64>,
    mask: Option<&ValidityMask>,
    config: &ExpectedConfig,
) -> anyhow::Result<DistanceProfile> {
    let n = validate_input(matrix.view(), mask, config)?;
    let dist_bins = if n == 0 {
        vec![0]
    }
    else {
        logbins(1, n, Some(config.dist_bin_edge_ratio), None, true)?
    };
    info!(
        "Observed/expected over {}x{} matrix with {} distance bins",
        n,
        n,
        dist_bins.len() - 1
    );

    if !matrix.is_standard_layout() {
        *matrix = matrix.as_standard_layout().into_owned();
    }
    let data = match matrix.as_slice_mut() {
        Some(data) => data,
        None => bail_computation!("matrix buffer is not contiguous"),
    };

    let mut sum_pixels = Vec::with_capacity(dist_bins.len() - 1);
    let mut n_pixels = Vec::with_capacity(dist_bins.len() - 1);
    for (lo, hi) in dist_bins.iter().copied().tuple_windows::<(usize, usize)>() {
        let mut sum = 0f64;
        let mut count = 0usize;
        for offset in lo..hi {
            for j in 0..n - offset {
                let i = offset + j;
                if admits(mask, data, n, i, j) {
                    sum += data[i * n + j];
                    count += 1;
                }
            }
        }
        sum_pixels.push(sum);
        n_pixels.push(count);

        if count == 0 {
            continue;
        }
        let mean = sum / count as f64;
        if mean == 0.0 {
            continue;
        }

        for offset in lo..hi {
            for j in 0..n - offset {
                let i = offset + j;
                if admits(mask, data, n, i, j) {
                    data[i * n + j] /= mean;
                }
                if offset > 0 && admits(mask, data, n, j, i) {
                    data[j * n + i] /= mean;
                }
            }
        }
    }

    let n_empty = n_pixels.iter().filter(|c| **c == 0).count();
    if n_empty > 0 {
        debug!("{} distance bins without valid pixels left untouched", n_empty);
    }

    Ok(DistanceProfile {
        dist_bins,
        sum_pixels,
        n_pixels,
    })
}
