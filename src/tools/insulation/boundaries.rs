use log::*;
use polars::prelude::*;

use super::{
    score_insulation,
    InsulationConfig,
};
use crate::data_structs::{
    ContactMatrix,
    InsulationTrack,
};
use crate::with_field_fn;

/// Peak detection over the negated insulation track.
///
/// Returns the positions of the called peaks and their prominences, in
/// matching order. Missing values in `signal` are gaps the finder must not
/// treat as peaks.
pub trait BoundaryFinder {
    fn find_boundaries(
        &self,
        signal: &[Option<f64>],
    ) -> (Vec<usize>, Vec<f64>);
}

impl<F> BoundaryFinder for F
where
    F: Fn(&[Option<f64>]) -> (Vec<usize>, Vec<f64>),
{
    fn find_boundaries(
        &self,
        signal: &[Option<f64>],
    ) -> (Vec<usize>, Vec<f64>) {
        self(signal)
    }
}

/// Per-chromosome access to a binned, balanced contact map.
pub trait ChromosomeSource {
    fn name(&self) -> &str;
    /// Chromosome length in base pairs.
    fn length(&self) -> u64;
    fn bin_size(&self) -> u64;
    /// Number of near-diagonals excluded when the matrix was balanced.
    fn ignore_diags(&self) -> usize;
    /// Bins without a balancing weight.
    fn bad_bins(&self) -> Vec<bool>;
    fn balanced_matrix(&self) -> anyhow::Result<ContactMatrix>;
}

/// [`ChromosomeSource`] over a matrix that is already in memory.
#[derive(Debug, Clone)]
pub struct InMemoryChromosome {
    name:         String,
    length:       u64,
    bin_size:     u64,
    ignore_diags: usize,
    bad_bins:     Vec<bool>,
    matrix:       ContactMatrix,
}

impl InMemoryChromosome {
    with_field_fn!(length, u64);
    with_field_fn!(ignore_diags, usize);
    with_field_fn!(bad_bins, Vec<bool>);

    /// Chromosome spanning exactly `n_bins * bin_size` bp with two ignored
    /// diagonals. Bins whose row holds no valid pixel are bad.
    pub fn new(
        name: &str,
        bin_size: u64,
        matrix: ContactMatrix,
    ) -> Self {
        let n = matrix.n_bins();
        let bad_bins = matrix
            .validity()
            .rows()
            .into_iter()
            .map(|row| !row.iter().any(|ok| *ok))
            .collect();
        Self {
            name:         name.to_string(),
            length:       n as u64 * bin_size,
            bin_size,
            ignore_diags: 2,
            bad_bins,
            matrix,
        }
    }
}

impl ChromosomeSource for InMemoryChromosome {
    fn name(&self) -> &str {
        &self.name
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn bin_size(&self) -> u64 {
        self.bin_size
    }

    fn ignore_diags(&self) -> usize {
        self.ignore_diags
    }

    fn bad_bins(&self) -> Vec<bool> {
        self.bad_bins.clone()
    }

    fn balanced_matrix(&self) -> anyhow::Result<ContactMatrix> {
        Ok(self.matrix.clone())
    }
}

/// Insulation result of a single chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromInsulation {
    pub chrom:                 String,
    pub starts:                Vec<u64>,
    pub ends:                  Vec<u64>,
    pub track:                 InsulationTrack,
    pub n_bad_bins_upstream:   Vec<usize>,
    pub n_bad_bins_downstream: Vec<usize>,
}

impl ChromInsulation {
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Genomic start coordinates of the called boundaries.
    pub fn boundary_starts(&self) -> Vec<u64> {
        self.track
            .boundaries()
            .into_iter()
            .map(|i| self.starts[i])
            .collect()
    }
}

/// Insulation results of all chromosomes for one window size.
#[derive(Debug, Clone, PartialEq)]
pub struct InsulationTable {
    pub window_bp: u64,
    pub chroms:    Vec<ChromInsulation>,
}

impl InsulationTable {
    pub fn n_bins(&self) -> usize {
        self.chroms.iter().map(ChromInsulation::len).sum()
    }

    /// Bin table with one row per bin of every chromosome, in order.
    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let w = self.window_bp;
        let chrom = self
            .chroms
            .iter()
            .flat_map(|c| std::iter::repeat(c.chrom.as_str()).take(c.len()))
            .collect::<Vec<_>>();
        let starts = self.concat(|c| c.starts.clone());
        let ends = self.concat(|c| c.ends.clone());
        let upstream = self.concat(|c| to_u32(&c.n_bad_bins_upstream));
        let downstream = self.concat(|c| to_u32(&c.n_bad_bins_downstream));
        let score = self.concat(|c| c.track.score.clone());
        let strength = self.concat(|c| c.track.boundary_strength.clone());

        DataFrame::new(vec![
            Column::new("chrom".into(), chrom),
            Column::new("start".into(), starts),
            Column::new("end".into(), ends),
            Column::new(format!("n_bad_bins_upstream_{w}").into(), upstream),
            Column::new(format!("n_bad_bins_downstream_{w}").into(), downstream),
            Column::new(format!("log2_insulation_score_{w}").into(), score),
            Column::new(format!("boundary_strength_{w}").into(), strength),
        ])
    }

    fn concat<T, F>(
        &self,
        f: F,
    ) -> Vec<T>
    where
        F: Fn(&ChromInsulation) -> Vec<T>, {
        self.chroms.iter().flat_map(f).collect()
    }
}

fn to_u32(counts: &[usize]) -> Vec<u32> {
    counts.iter().map(|c| *c as u32).collect()
}

/// Window size in bins for `source`, after checking that its length, bin
/// size and bad-bin vector agree.
fn validate_source<S: ChromosomeSource>(
    source: &S,
    config: &InsulationConfig,
) -> anyhow::Result<usize> {
    let window = config.window_bins(source.bin_size())?;
    let expected_bins = source.length().div_ceil(source.bin_size()) as usize;
    let n_bins = source.bad_bins().len();
    if expected_bins != n_bins {
        bail_config!(
            "chromosome {} of {} bp has {} bins of {} bp, got {}",
            source.name(),
            source.length(),
            expected_bins,
            source.bin_size(),
            n_bins
        );
    }
    Ok(window)
}

/// Scores insulation and calls boundaries on every chromosome of `sources`.
///
/// Bin sizes and lengths of all chromosomes are checked before any matrix
/// is fetched.
pub fn find_insulating_boundaries<S, B>(
    sources: &[S],
    config: &InsulationConfig,
    finder: &B,
) -> anyhow::Result<InsulationTable>
where
    S: ChromosomeSource,
    B: BoundaryFinder + ?Sized, {
    let windows = sources
        .iter()
        .map(|source| validate_source(source, config))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut chroms = Vec::with_capacity(sources.len());
    for (source, window) in sources.iter().zip(windows) {
        let matrix = source.balanced_matrix()?;
        let n = matrix.n_bins();
        let bin_size = source.bin_size();
        info!(
            "Processing {} ({} bins, window {} bins)",
            source.name(),
            n,
            window
        );

        let scores = score_insulation(
            &matrix,
            &source.bad_bins(),
            window,
            source.ignore_diags(),
            config.max_bad_bins,
            finder,
        )?;
        let starts = (0..n as u64).map(|k| k * bin_size).collect::<Vec<_>>();
        let ends = starts
            .iter()
            .map(|start| (start + bin_size).min(source.length()))
            .collect();
        debug!(
            "{}: {} boundaries",
            source.name(),
            scores.track.boundaries().len()
        );

        chroms.push(ChromInsulation {
            chrom:                 source.name().to_string(),
            starts,
            ends,
            track:                 scores.track,
            n_bad_bins_upstream:   scores.n_bad_bins_upstream,
            n_bad_bins_downstream: scores.n_bad_bins_downstream,
        });
    }

    Ok(InsulationTable {
        window_bp: config.window_bp,
        chroms,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use ndarray::Array2;

    use super::*;
    use crate::error::{
        hic_error,
        HicError,
    };

    fn no_peaks(_: &[Option<f64>]) -> (Vec<usize>, Vec<f64>) {
        (vec![], vec![])
    }

    fn chromosome(
        name: &str,
        n: usize,
        bin_size: u64,
    ) -> InMemoryChromosome {
        let matrix = ContactMatrix::from_dense(Array2::from_elem((n, n), 1.0)).unwrap();
        InMemoryChromosome::new(name, bin_size, matrix)
    }

    struct CountingSource {
        inner: InMemoryChromosome,
        calls: Cell<usize>,
    }

    impl ChromosomeSource for CountingSource {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn length(&self) -> u64 {
            self.inner.length()
        }

        fn bin_size(&self) -> u64 {
            self.inner.bin_size()
        }

        fn ignore_diags(&self) -> usize {
            self.inner.ignore_diags()
        }

        fn bad_bins(&self) -> Vec<bool> {
            self.inner.bad_bins()
        }

        fn balanced_matrix(&self) -> anyhow::Result<ContactMatrix> {
            self.calls.set(self.calls.get() + 1);
            self.inner.balanced_matrix()
        }
    }

    #[test]
    fn table_layout() {
        let sources = vec![
            chromosome("chr1", 12, 10).with_length(115),
            chromosome("chr2", 8, 10),
        ];
        let config = InsulationConfig::new(30, 2);
        let table = find_insulating_boundaries(&sources, &config, &no_peaks).unwrap();
        assert_eq!(table.n_bins(), 20);
        assert_eq!(table.chroms[0].ends.last(), Some(&115));
        assert_eq!(table.chroms[1].starts[3], 30);
        assert!(table.chroms[0].boundary_starts().is_empty());

        let df = table.to_dataframe().unwrap();
        assert_eq!(df.height(), 20);
        let names = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        assert_eq!(names, vec![
            "chrom",
            "start",
            "end",
            "n_bad_bins_upstream_30",
            "n_bad_bins_downstream_30",
            "log2_insulation_score_30",
            "boundary_strength_30",
        ]);
        assert_eq!(df.column("boundary_strength_30").unwrap().null_count(), 20);
    }

    #[test]
    fn boundary_positions_map_to_coordinates() {
        let sources = vec![chromosome("chr1", 20, 1000)];
        let finder = |signal: &[Option<f64>]| {
            assert_eq!(signal.len(), 20);
            (vec![10], vec![0.5])
        };
        let config = InsulationConfig::new(3000, 2);
        let table = find_insulating_boundaries(&sources, &config, &finder).unwrap();
        assert_eq!(table.chroms[0].boundary_starts(), vec![10_000]);
        assert_eq!(table.chroms[0].track.boundary_strength[10], Some(0.5));
    }

    #[test]
    fn bin_sizes_are_checked_first() {
        let sources = vec![
            CountingSource {
                inner: chromosome("chr1", 10, 10_000),
                calls: Cell::new(0),
            },
            CountingSource {
                inner: chromosome("chr2", 10, 30_000),
                calls: Cell::new(0),
            },
        ];
        let err =
            find_insulating_boundaries(&sources, &InsulationConfig::default(), &no_peaks).unwrap_err();
        assert!(matches!(hic_error(&err), Some(HicError::InvalidConfig(_))));
        assert!(sources.iter().all(|s| s.calls.get() == 0));
    }

    #[test]
    fn lengths_are_checked_first() {
        let sources = vec![
            CountingSource {
                inner: chromosome("chr1", 10, 10),
                calls: Cell::new(0),
            },
            CountingSource {
                inner: chromosome("chr2", 10, 10).with_length(200),
                calls: Cell::new(0),
            },
        ];
        let err = find_insulating_boundaries(&sources, &InsulationConfig::new(20, 2), &no_peaks)
            .unwrap_err();
        assert!(matches!(hic_error(&err), Some(HicError::InvalidConfig(_))));
        assert!(sources.iter().all(|s| s.calls.get() == 0));
    }

    #[test]
    fn empty_rows_default_to_bad_bins() {
        let mut bad = vec![false; 12];
        bad[5] = true;
        let matrix = ContactMatrix::from_dense(Array2::from_elem((12, 12), 1.0))
            .unwrap()
            .with_bad_bins(&bad)
            .unwrap();
        let chrom = InMemoryChromosome::new("chr1", 10, matrix);
        assert_eq!(chrom.bad_bins(), bad);

        let table = find_insulating_boundaries(&[chrom], &InsulationConfig::new(20, 2), &no_peaks)
            .unwrap();
        let chr1 = &table.chroms[0];
        assert_eq!(chr1.track.score[5], None);
        assert_eq!(chr1.n_bad_bins_upstream[5], 1);
        assert_eq!(chr1.n_bad_bins_downstream[4], 1);
    }
}
