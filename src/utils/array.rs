use ndarray::{
    s,
    Array,
    Array2,
    ArrayView2,
    Dimension,
};
use num::Float;

/// Replaces NaN entries with `value` in place.
pub fn fill_na_in_place<F: Float, D: Dimension>(
    arr: &mut Array<F, D>,
    value: F,
) {
    arr.mapv_inplace(|v| if v.is_nan() { value } else { v });
}

/// Returns a copy of `arr` with NaN entries replaced by `value`.
pub fn fill_na<F: Float, D: Dimension>(
    arr: &Array<F, D>,
    value: F,
) -> Array<F, D> {
    let mut out = arr.clone();
    fill_na_in_place(&mut out, value);
    out
}

/// Replaces `+inf` with `pos_value` and `-inf` with `neg_value` in place.
pub fn fill_inf_in_place<F: Float, D: Dimension>(
    arr: &mut Array<F, D>,
    pos_value: F,
    neg_value: F,
) {
    arr.mapv_inplace(|v| {
        if v.is_infinite() {
            if v.is_sign_positive() {
                pos_value
            }
            else {
                neg_value
            }
        }
        else {
            v
        }
    });
}

/// Copying counterpart of [`fill_inf_in_place`].
pub fn fill_inf<F: Float, D: Dimension>(
    arr: &Array<F, D>,
    pos_value: F,
    neg_value: F,
) -> Array<F, D> {
    let mut out = arr.clone();
    fill_inf_in_place(&mut out, pos_value, neg_value);
    out
}

/// Replaces every non-finite entry (NaN and both infinities) with `value`
/// in place.
pub fn fill_nainf_in_place<F: Float, D: Dimension>(
    arr: &mut Array<F, D>,
    value: F,
) {
    arr.mapv_inplace(|v| if v.is_finite() { v } else { value });
}

/// Copying counterpart of [`fill_nainf_in_place`].
pub fn fill_nainf<F: Float, D: Dimension>(
    arr: &Array<F, D>,
    value: F,
) -> Array<F, D> {
    let mut out = arr.clone();
    fill_nainf_in_place(&mut out, value);
    out
}

/// Sub-slice of a sorted slice with values in `[lo, hi)`.
pub fn slice_sorted<T: PartialOrd>(
    arr: &[T],
    lo: T,
    hi: T,
) -> &[T] {
    let start = arr.partition_point(|v| *v < lo);
    let end = arr.partition_point(|v| *v < hi).max(start);
    &arr[start..end]
}

/// Coarsens a 2-D array by applying `reduction` to non-overlapping
/// `factors.0 x factors.1` blocks.
///
/// Unless `trim_excess` is set, both dimensions must be divisible by the
/// corresponding factor.
pub fn coarsen<T, R, F>(
    reduction: F,
    arr: ArrayView2<'_, T>,
    factors: (usize, usize),
    trim_excess: bool,
) -> anyhow::Result<Array2<R>>
where
    F: Fn(ArrayView2<'_, T>) -> R, {
    let (row_factor, col_factor) = factors;
    if row_factor == 0 || col_factor == 0 {
        bail_config!("coarsening factors must be positive, got {:?}", factors);
    }
    let (n_rows, n_cols) = arr.dim();
    if !trim_excess && (n_rows % row_factor != 0 || n_cols % col_factor != 0) {
        bail_config!(
            "shape ({}, {}) is not divisible by coarsening factors {:?}",
            n_rows,
            n_cols,
            factors
        );
    }

    let out_rows = n_rows / row_factor;
    let out_cols = n_cols / col_factor;
    Ok(Array2::from_shape_fn((out_rows, out_cols), |(i, j)| {
        let r0 = i * row_factor;
        let c0 = j * col_factor;
        reduction(arr.slice(s![r0..r0 + row_factor, c0..c0 + col_factor]))
    }))
}
