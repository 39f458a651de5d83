use std::fmt::Display;

use itertools::Itertools;
use ndarray::{
    Array1,
    Array2,
    ArrayD,
    ArrayView2,
    Ix1,
    Ix2,
};

/// Dense square contact matrix with explicit missingness.
///
/// Values and validity are kept side by side: a pixel is missing when its
/// validity flag is `false`, whatever the stored value is. Missing pixels
/// hold `0.0` in the value buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactMatrix {
    values: Array2<f64>,
    valid:  Array2<bool>,
}

fn check_square<T>(arr: &ArrayView2<'_, T>) -> anyhow::Result<usize> {
    let (n_rows, n_cols) = arr.dim();
    if n_rows != n_cols {
        bail_config!("contact matrix must be square, got {}x{}", n_rows, n_cols);
    }
    Ok(n_rows)
}

impl ContactMatrix {
    /// Wraps a dense matrix where every pixel is valid.
    pub fn from_dense(values: Array2<f64>) -> anyhow::Result<Self> {
        check_square(&values.view())?;
        let valid = Array2::from_elem(values.dim(), true);
        Ok(Self { values, valid })
    }

    /// Wraps a dense matrix, marking non-finite entries as missing.
    pub fn from_nan_dense(mut values: Array2<f64>) -> anyhow::Result<Self> {
        check_square(&values.view())?;
        let valid = values.mapv(f64::is_finite);
        values.zip_mut_with(&valid, |v, ok| {
            if !ok {
                *v = 0.0
            }
        });
        Ok(Self { values, valid })
    }

    /// Combines a value buffer with an explicit validity mask.
    pub fn from_parts(
        mut values: Array2<f64>,
        valid: Array2<bool>,
    ) -> anyhow::Result<Self> {
        check_square(&values.view())?;
        if values.dim() != valid.dim() {
            bail_config!(
                "validity mask shape {:?} does not match matrix shape {:?}",
                valid.dim(),
                values.dim()
            );
        }
        values.zip_mut_with(&valid, |v, ok| {
            if !ok {
                *v = 0.0
            }
        });
        Ok(Self { values, valid })
    }

    /// Marks every row and column flagged in `bad_bins` as missing.
    pub fn with_bad_bins(
        mut self,
        bad_bins: &[bool],
    ) -> anyhow::Result<Self> {
        if bad_bins.len() != self.n_bins() {
            bail_config!(
                "bad bin vector has {} entries, matrix has {} bins",
                bad_bins.len(),
                self.n_bins()
            );
        }
        for (i, _) in bad_bins.iter().enumerate().filter(|(_, bad)| **bad) {
            self.values.row_mut(i).fill(0.0);
            self.values.column_mut(i).fill(0.0);
            self.valid.row_mut(i).fill(false);
            self.valid.column_mut(i).fill(false);
        }
        Ok(self)
    }

    pub fn n_bins(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn validity(&self) -> &Array2<bool> {
        &self.valid
    }

    /// Value at `(i, j)`, `None` when missing.
    pub fn get(
        &self,
        i: usize,
        j: usize,
    ) -> Option<f64> {
        self.valid[[i, j]].then(|| self.values[[i, j]])
    }

    pub fn set(
        &mut self,
        i: usize,
        j: usize,
        value: Option<f64>,
    ) {
        self.valid[[i, j]] = value.is_some();
        self.values[[i, j]] = value.unwrap_or(0.0);
    }

    /// Exports the matrix with NaN standing for missing pixels.
    pub fn to_nan_dense(&self) -> Array2<f64> {
        let mut out = self.values.clone();
        out.zip_mut_with(&self.valid, |v, ok| {
            if !ok {
                *v = f64::NAN
            }
        });
        out
    }

    /// Per-pixel [`ValidityMask`] of this matrix.
    pub fn validity_mask(&self) -> ValidityMask {
        ValidityMask::Pixels(self.valid.clone())
    }

    /// Checks `M[i, j] == M[j, i]` for every pair valid on both sides, and
    /// that validity itself is symmetric.
    pub fn is_symmetric(&self) -> bool {
        let n = self.n_bins();
        (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .all(|(i, j)| self.get(i, j) == self.get(j, i))
    }

    pub fn into_parts(self) -> (Array2<f64>, Array2<bool>) {
        (self.values, self.valid)
    }
}

/// Validity of bins or pixels used to exclude data from statistics.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidityMask {
    /// Per-bin flags; a pixel is valid when both of its bins are.
    Bins(Array1<bool>),
    /// Per-pixel flags.
    Pixels(Array2<bool>),
}

impl ValidityMask {
    /// Interprets an arbitrary-dimensional boolean array as a mask.
    pub fn from_dyn(mask: ArrayD<bool>) -> anyhow::Result<Self> {
        match mask.ndim() {
            1 => Ok(Self::Bins(mask.into_dimensionality::<Ix1>()?)),
            2 => Ok(Self::Pixels(mask.into_dimensionality::<Ix2>()?)),
            n => bail_config!("mask must be either 1D or 2D, got {}D", n),
        }
    }

    /// Verifies that the mask fits an `n x n` matrix.
    pub fn check_extent(
        &self,
        n: usize,
    ) -> anyhow::Result<()> {
        let fits = match self {
            ValidityMask::Bins(bins) => bins.len() == n,
            ValidityMask::Pixels(pixels) => pixels.dim() == (n, n),
        };
        if !fits {
            bail_config!("mask of shape {} does not fit a {n}x{n} matrix", self.shape_str());
        }
        Ok(())
    }

    fn shape_str(&self) -> String {
        match self {
            ValidityMask::Bins(bins) => format!("({},)", bins.len()),
            ValidityMask::Pixels(pixels) => format!("{:?}", pixels.dim()),
        }
    }

    #[inline]
    pub fn is_valid(
        &self,
        i: usize,
        j: usize,
    ) -> bool {
        match self {
            ValidityMask::Bins(bins) => bins[i] && bins[j],
            ValidityMask::Pixels(pixels) => pixels[[i, j]],
        }
    }

    /// Number of bins flagged invalid, only meaningful for per-bin masks.
    pub fn n_bad_bins(&self) -> Option<usize> {
        match self {
            ValidityMask::Bins(bins) => Some(bins.iter().filter(|ok| !**ok).count()),
            ValidityMask::Pixels(_) => None,
        }
    }
}

impl From<Array1<bool>> for ValidityMask {
    fn from(value: Array1<bool>) -> Self {
        ValidityMask::Bins(value)
    }
}

impl From<Array2<bool>> for ValidityMask {
    fn from(value: Array2<bool>) -> Self {
        ValidityMask::Pixels(value)
    }
}

impl Display for ContactMatrix {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let n_missing = self.valid.iter().filter(|ok| !**ok).count();
        write!(
            f,
            "ContactMatrix({}x{}, missing pixels: {})",
            self.n_bins(),
            self.n_bins(),
            n_missing
        )?;
        if self.n_bins() <= 6 {
            for i in 0..self.n_bins() {
                let row = (0..self.n_bins())
                    .map(|j| {
                        self.get(i, j)
                            .map(|v| format!("{v:.3}"))
                            .unwrap_or_else(|| "NA".to_string())
                    })
                    .join("\t");
                write!(f, "\n{row}")?;
            }
        }
        Ok(())
    }
}
