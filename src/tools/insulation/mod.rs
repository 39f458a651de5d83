//! Diamond insulation score and insulating boundary calls.
//!
//! For every bin, the insulation score summarizes contacts between the
//! `window` bins upstream and the `window` bins downstream of it. Domain
//! boundaries show up as local minima of the (log2, median-centered) track;
//! their depth is measured by an external peak finder.
//!
//! - [`insul_diamond`] computes the normalized (linear) diamond score.
//! - [`bad_bin_windows`] counts bad bins on each side of the window.
//! - [`score_insulation`] combines both into an [`InsulationTrack`] for one
//!   chromosome.
//! - [`find_insulating_boundaries`] walks the chromosomes of a
//!   [`ChromosomeSource`] collection and produces an [`InsulationTable`].

mod boundaries;
mod config;

pub use boundaries::*;
pub use config::InsulationConfig;
use log::*;

use crate::data_structs::{
    ContactMatrix,
    InsulationTrack,
};
use crate::utils::nan_median;

/// Median-normalized diamond insulation score.
///
/// The window of bin `i` is the block of rows `[i - window, i)` and columns
/// `[i, i + window)`, truncated at the matrix edges. The raw score is the
/// mean of the valid pixels in that block divided by their count, and the
/// track is then divided by its median. When `ignore_diags > 0`, pixels with
/// `|i - j| <= ignore_diags` are not used. Bins without valid pixels in their
/// window are `None`.
pub fn insul_diamond(
    matrix: &ContactMatrix,
    window: usize,
    ignore_diags: usize,
) -> Vec<Option<f64>> {
    let n = matrix.n_bins();
    let values = matrix.values();
    let valid = matrix.validity();
    let ignored = |r: usize, c: usize| ignore_diags > 0 && r.abs_diff(c) <= ignore_diags;

    let raw = (0..n)
        .map(|i| {
            let lo = i.saturating_sub(window);
            let hi = (i + window).min(n);
            let mut sum = 0f64;
            let mut count = 0usize;
            for r in lo..i {
                for c in i..hi {
                    if valid[[r, c]] && !ignored(r, c) {
                        sum += values[[r, c]];
                        count += 1;
                    }
                }
            }
            (count > 0).then(|| sum / count as f64 / count as f64)
        })
        .collect::<Vec<_>>();

    let median = match nan_median(raw.iter().flatten().copied()) {
        Some(median) => median,
        None => {
            warn!("Insulation track of {} bins has no defined values", n);
            return vec![None; n];
        },
    };
    if median == 0.0 {
        warn!("Median insulation score is zero, track is undefined");
        return vec![None; n];
    }
    raw.into_iter()
        .map(|score| score.map(|v| v / median))
        .collect()
}

/// Number of bad bins in the upstream (`[k - window + 1, k]`) and downstream
/// (`[k, k + window - 1]`) window of every bin `k`.
///
/// Positions beyond the chromosome ends count as bad. A window below one
/// bin is treated as one bin.
pub fn bad_bin_windows(
    bad_bins: &[bool],
    window: usize,
) -> (Vec<usize>, Vec<usize>) {
    let n = bad_bins.len();
    let window = window.max(1);
    // prefix[k] = number of bad bins in [0, k)
    let prefix = std::iter::once(0)
        .chain(bad_bins.iter().scan(0usize, |acc, bad| {
            *acc += *bad as usize;
            Some(*acc)
        }))
        .collect::<Vec<_>>();

    let upstream = (0..n)
        .map(|k| {
            let start = (k + 1).saturating_sub(window);
            let outside = (window - 1).saturating_sub(k);
            prefix[k + 1] - prefix[start] + outside
        })
        .collect();
    let downstream = (0..n)
        .map(|k| {
            let end = (k + window).min(n);
            let outside = (k + window).saturating_sub(n);
            prefix[end] - prefix[k] + outside
        })
        .collect();
    (upstream, downstream)
}

/// Insulation track of one chromosome together with its bad-bin counts.
#[derive(Debug, Clone, PartialEq)]
pub struct InsulationScores {
    pub track:                 InsulationTrack,
    pub n_bad_bins_upstream:   Vec<usize>,
    pub n_bad_bins_downstream: Vec<usize>,
}

/// Computes the log2 insulation track of a balanced matrix and calls
/// boundaries with `finder`.
///
/// A bin's score is missing when the bin is bad, when either side of its
/// window holds more than `max_bad_bins` bad bins, or when the score is not
/// finite. The negated track is passed to `finder`; boundary strength is the
/// prominence it reports.
pub fn score_insulation<B: BoundaryFinder + ?Sized>(
    matrix: &ContactMatrix,
    bad_bins: &[bool],
    window: usize,
    ignore_diags: usize,
    max_bad_bins: usize,
    finder: &B,
) -> anyhow::Result<InsulationScores> {
    let n = matrix.n_bins();
    if bad_bins.len() != n {
        bail_config!(
            "bad bin vector has {} entries, matrix has {} bins",
            bad_bins.len(),
            n
        );
    }
    debug!(
        "Scoring insulation of {} bins: window={}, ignore_diags={}, max_bad_bins={}",
        n, window, ignore_diags, max_bad_bins
    );

    let (upstream, downstream) = bad_bin_windows(bad_bins, window);
    let score = insul_diamond(matrix, window, ignore_diags)
        .into_iter()
        .enumerate()
        .map(|(k, score)| {
            if bad_bins[k] || upstream[k] > max_bad_bins || downstream[k] > max_bad_bins {
                return None;
            }
            score.map(f64::log2).filter(|v| v.is_finite())
        })
        .collect::<Vec<_>>();

    let negated = score
        .iter()
        .map(|v| v.map(|v| -v))
        .collect::<Vec<_>>();
    let (positions, prominences) = finder.find_boundaries(&negated);
    if positions.len() != prominences.len() {
        bail_computation!(
            "peak finder returned {} positions but {} prominences",
            positions.len(),
            prominences.len()
        );
    }
    let mut boundary_strength = vec![None; n];
    for (pos, prominence) in positions.into_iter().zip(prominences) {
        match boundary_strength.get_mut(pos) {
            Some(slot) => *slot = Some(prominence),
            None => bail_computation!("peak finder returned position {} beyond {} bins", pos, n),
        }
    }

    Ok(InsulationScores {
        track:                 InsulationTrack {
            score,
            boundary_strength,
        },
        n_bad_bins_upstream:   upstream,
        n_bad_bins_downstream: downstream,
    })
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;
    use ndarray::Array2;

    use super::*;
    use crate::error::{
        hic_error,
        HicError,
    };

    /// Strict local maxima of the defined values, with the smaller drop to
    /// the neighbouring values as prominence.
    fn local_maxima(signal: &[Option<f64>]) -> (Vec<usize>, Vec<f64>) {
        let mut positions = Vec::new();
        let mut prominences = Vec::new();
        for i in 1..signal.len().saturating_sub(1) {
            if let (Some(l), Some(c), Some(r)) = (signal[i - 1], signal[i], signal[i + 1]) {
                if c > l && c > r {
                    positions.push(i);
                    prominences.push((c - l).min(c - r));
                }
            }
        }
        (positions, prominences)
    }

    fn uniform(n: usize) -> ContactMatrix {
        ContactMatrix::from_dense(Array2::from_elem((n, n), 3.0)).unwrap()
    }

    #[test]
    fn uniform_matrix_has_flat_interior() {
        let n = 40;
        let window = 5;
        for ignore_diags in [0, 2] {
            let score = insul_diamond(&uniform(n), window, ignore_diags);
            assert_eq!(score[0], None);
            let interior = score[window..=n - window]
                .iter()
                .map(|v| v.unwrap())
                .collect::<Vec<_>>();
            for v in &interior {
                assert_approx_eq!(*v, 1.0, 1e-12);
            }
        }

        let scores = score_insulation(&uniform(n), &vec![false; n], window, 2, 2, &local_maxima).unwrap();
        assert!(scores.track.boundary_strength.iter().all(Option::is_none));
        for v in scores.track.score[window..=n - window].iter() {
            assert_approx_eq!(v.unwrap(), 0.0, 1e-12);
        }
    }

    #[test]
    fn truncated_windows_at_edges() {
        // bin 1 sees a single row of `window` pixels
        let score = insul_diamond(&uniform(20), 4, 0);
        // raw interior: 3 / 16, raw bin 1: 3 / 4
        assert_approx_eq!(score[1].unwrap(), 4.0, 1e-12);
    }

    #[test]
    fn missing_pixels_are_skipped() {
        let n = 12;
        let mut matrix = uniform(n);
        matrix.set(4, 6, None);
        let score = insul_diamond(&matrix, 3, 0);
        // window of bin 6 keeps eight of nine pixels, the mean stays at 3
        let ratio = score[6].unwrap() / score[7].unwrap();
        assert_approx_eq!(ratio, 9.0 / 8.0, 1e-12);
    }

    #[test]
    fn all_missing_track() {
        let matrix = ContactMatrix::from_dense(Array2::from_elem((5, 5), 1.0))
            .unwrap()
            .with_bad_bins(&[true; 5])
            .unwrap();
        assert!(insul_diamond(&matrix, 2, 0).iter().all(Option::is_none));
    }

    #[test]
    fn counts_bad_bins_per_side() {
        let mut bad = vec![false; 10];
        bad[4] = true;
        let (up, down) = bad_bin_windows(&bad, 3);
        assert_eq!(up, vec![2, 1, 0, 0, 1, 1, 1, 0, 0, 0]);
        assert_eq!(down, vec![0, 0, 1, 1, 1, 0, 0, 0, 1, 2]);

        let (up, down) = bad_bin_windows(&bad, 1);
        assert_eq!(up, bad.iter().map(|b| *b as usize).collect::<Vec<_>>());
        assert_eq!(up, down);
    }

    #[test]
    fn bad_bins_mask_the_track() {
        let n = 30;
        let mut bad = vec![false; n];
        bad[15] = true;
        bad[16] = true;
        let matrix = uniform(n).with_bad_bins(&bad).unwrap();

        let scores = score_insulation(&matrix, &bad, 4, 0, 1, &local_maxima).unwrap();
        let score = &scores.track.score;
        assert_eq!(score[15], None);
        assert_eq!(score[16], None);
        // two bad bins in the downstream window of bin 14
        assert_eq!(scores.n_bad_bins_downstream[14], 2);
        assert_eq!(score[14], None);
        // bin 10 sees none
        assert!(score[10].is_some());
        // leading bins see out-of-chromosome positions upstream
        assert_eq!(score[0], None);
        assert_eq!(score[1], None);
    }

    #[test]
    fn rejects_misaligned_inputs() {
        let err = score_insulation(&uniform(5), &[false; 4], 2, 0, 2, &local_maxima).unwrap_err();
        assert!(matches!(hic_error(&err), Some(HicError::InvalidConfig(_))));

        let bogus = |_: &[Option<f64>]| (vec![100], vec![1.0]);
        let err = score_insulation(&uniform(5), &[false; 5], 2, 0, 2, &bogus).unwrap_err();
        assert!(matches!(hic_error(&err), Some(HicError::Computation(_))));
    }
}
