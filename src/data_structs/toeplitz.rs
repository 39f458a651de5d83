use ndarray::{
    Array1,
    Array2,
};

/// Toeplitz matrix `M[i, j] = f(i - j)` stored as its first column and
/// first row; dense blocks are built on request.
///
/// Typical use is an expected (distance-decay) background, where the value
/// depends only on the genomic separation between two bins.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyToeplitz {
    /// First column, `c[d] = f(d)` for `d >= 0`.
    c: Array1<f64>,
    /// First row, `r[d] = f(-d)` for `d >= 0`.
    r: Array1<f64>,
}

impl LazyToeplitz {
    /// Creates a Toeplitz matrix from its first column and, optionally, its
    /// first row. Without a row the matrix is symmetric.
    pub fn new(
        c: Array1<f64>,
        r: Option<Array1<f64>>,
    ) -> anyhow::Result<Self> {
        if c.is_empty() {
            bail_config!("first column of a Toeplitz matrix is empty");
        }
        let r = match r {
            None => c.clone(),
            Some(r) => {
                if r.is_empty() {
                    bail_config!("first row of a Toeplitz matrix is empty");
                }
                if c[0] != r[0] {
                    bail_config!(
                        "first element of column ({}) and row ({}) should match",
                        c[0],
                        r[0]
                    );
                }
                r
            },
        };
        Ok(Self { c, r })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.c.len(), self.r.len())
    }

    pub fn column(&self) -> &Array1<f64> {
        &self.c
    }

    pub fn row(&self) -> &Array1<f64> {
        &self.r
    }

    /// Materializes rows `[row_start, row_end)` and columns
    /// `[col_start, col_end)`.
    pub fn block(
        &self,
        row_start: usize,
        row_end: usize,
        col_start: usize,
        col_end: usize,
    ) -> anyhow::Result<Array2<f64>> {
        let (n_rows, n_cols) = self.shape();
        if row_start > row_end || row_end > n_rows {
            bail_config!(
                "row range [{}, {}) out of bounds for {} rows",
                row_start,
                row_end,
                n_rows
            );
        }
        if col_start > col_end || col_end > n_cols {
            bail_config!(
                "column range [{}, {}) out of bounds for {} columns",
                col_start,
                col_end,
                n_cols
            );
        }
        let (i0, i1, j0, j1) = (row_start, row_end, col_start, col_end);
        if i0 == i1 || j0 == j1 {
            return Ok(Array2::zeros((i1 - i0, j1 - j0)));
        }

        if i0 == j0 && i1 == j1 {
            let col = self.c.iter().take(i1 - i0).copied().collect::<Vec<_>>();
            let row = self.r.iter().take(j1 - j0).copied().collect::<Vec<_>>();
            return Ok(expand(&col, &row));
        }

        // Blocks starting left of the diagonal are solved on the transposed
        // matrix, where the first row and column trade places.
        let transpose = j0 < i0 || (i0 == j0 && i1 < j1);
        let block = if transpose {
            let (col, row) = upper_vectors(&self.r, &self.c, j0, j1, i0, i1);
            expand(&col, &row).reversed_axes()
        }
        else {
            let (col, row) = upper_vectors(&self.c, &self.r, i0, i1, j0, j1);
            expand(&col, &row)
        };
        Ok(block.as_standard_layout().into_owned())
    }

    /// Materializes the whole matrix.
    pub fn to_dense(&self) -> Array2<f64> {
        expand(&self.c.to_vec(), &self.r.to_vec())
    }
}

/// Effective first column and first row of the block `[i0, i1) x [j0, j1)`
/// of the Toeplitz matrix `(c, r)`, for `j0 >= i0`.
///
/// The column reads `r` backward from offset `j0 - i0` down to (excluding)
/// `max(0, j0 - i1)`, then continues into `c` for rows below the diagonal.
fn upper_vectors(
    c: &Array1<f64>,
    r: &Array1<f64>,
    i0: usize,
    i1: usize,
    j0: usize,
    j1: usize,
) -> (Vec<f64>, Vec<f64>) {
    debug_assert!(j0 >= i0);
    let start = j0 - i0;
    let stop = j0.saturating_sub(i1);

    let col = (stop + 1..=start)
        .rev()
        .map(|d| r[d])
        .chain((0..i1.saturating_sub(j0)).map(|d| c[d]))
        .collect::<Vec<_>>();
    let row = (start..j1 - i0).map(|d| r[d]).collect::<Vec<_>>();
    (col, row)
}

/// Dense Toeplitz expansion: `out[a, b] = col[a - b]` if `a >= b`, else
/// `row[b - a]`.
fn expand(
    col: &[f64],
    row: &[f64],
) -> Array2<f64> {
    let (n_rows, n_cols) = (col.len(), row.len());
    let mut out = Array2::zeros((n_rows, n_cols));
    for ((a, b), v) in out.indexed_iter_mut() {
        *v = if a >= b { col[a - b] } else { row[b - a] };
    }
    out
}
