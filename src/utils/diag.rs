use ndarray::{
    s,
    Array2,
    ArrayView1,
    ArrayView2,
    ArrayViewMut1,
};

/// Returns a view of the `k`-th diagonal of a (possibly rectangular) matrix.
///
/// Main diagonal is `k = 0`, upper diagonals are positive and lower
/// diagonals are negative. An out-of-range `k` yields an empty view.
pub fn get_diag<T>(
    arr: ArrayView2<'_, T>,
    k: isize,
) -> ArrayView1<'_, T> {
    let (n_rows, n_cols) = arr.dim();
    if k >= 0 {
        let k = (k as usize).min(n_cols);
        arr.slice_move(s![.., k..]).into_diag()
    }
    else {
        let k = k.unsigned_abs().min(n_rows);
        arr.slice_move(s![k.., ..]).into_diag()
    }
}

fn diag_mut<T>(
    arr: &mut Array2<T>,
    k: isize,
) -> ArrayViewMut1<'_, T> {
    let (n_rows, n_cols) = arr.dim();
    if k >= 0 {
        let k = (k as usize).min(n_cols);
        arr.slice_mut(s![.., k..]).into_diag()
    }
    else {
        let k = k.unsigned_abs().min(n_rows);
        arr.slice_mut(s![k.., ..]).into_diag()
    }
}

/// Length of the `k`-th diagonal of an `n_rows x n_cols` matrix.
pub fn diag_len(
    n_rows: usize,
    n_cols: usize,
    k: isize,
) -> usize {
    if k >= 0 {
        n_rows.min(n_cols.saturating_sub(k as usize))
    }
    else {
        n_cols.min(n_rows.saturating_sub(k.unsigned_abs()))
    }
}

/// Writes `value` to every element of the `k`-th diagonal in place.
pub fn set_diag<T: Clone>(
    arr: &mut Array2<T>,
    value: T,
    k: isize,
) {
    diag_mut(arr, k).fill(value);
}

/// Writes `values` to the `k`-th diagonal in place.
///
/// `values` must have exactly the diagonal's length.
pub fn set_diag_values<T: Clone>(
    arr: &mut Array2<T>,
    values: &[T],
    k: isize,
) -> anyhow::Result<()> {
    let (n_rows, n_cols) = arr.dim();
    let expected = diag_len(n_rows, n_cols, k);
    if values.len() != expected {
        bail_config!(
            "diagonal {} of a {}x{} matrix has {} elements, got {} values",
            k,
            n_rows,
            n_cols,
            expected,
            values.len()
        );
    }
    diag_mut(arr, k)
        .iter_mut()
        .zip(values)
        .for_each(|(dst, src)| *dst = src.clone());
    Ok(())
}

/// Copying counterpart of [`set_diag`].
pub fn with_diag<T: Clone>(
    arr: ArrayView2<'_, T>,
    value: T,
    k: isize,
) -> Array2<T> {
    let mut out = arr.to_owned();
    set_diag(&mut out, value, k);
    out
}

/// Copying counterpart of [`set_diag_values`].
pub fn with_diag_values<T: Clone>(
    arr: ArrayView2<'_, T>,
    values: &[T],
    k: isize,
) -> anyhow::Result<Array2<T>> {
    let mut out = arr.to_owned();
    set_diag_values(&mut out, values, k)?;
    Ok(out)
}

/// Fills a diagonal by stepping through the row-major buffer, like
/// `numpy.fill_diagonal` but starting at flat offset `k >= 0`.
///
/// Positions are `k, k + (n_cols + 1), ...`. Without `wrap` the walk stops
/// after `n_cols` rows' worth of elements, so a tall matrix does not wrap
/// around into its lower part. `values` are cycled when shorter than the
/// diagonal; an empty `values` leaves the matrix untouched.
pub fn fill_diagonal<T: Clone>(
    arr: &mut Array2<T>,
    values: &[T],
    k: usize,
    wrap: bool,
) {
    if values.is_empty() {
        return;
    }
    let (n_rows, n_cols) = arr.dim();
    let total = n_rows * n_cols;
    let end = if wrap {
        total
    }
    else {
        (k + n_cols * n_cols).min(total)
    };
    let step = n_cols + 1;

    let mut flat = k;
    let mut value_idx = 0;
    while flat < end {
        arr[[flat / n_cols, flat % n_cols]] = values[value_idx].clone();
        value_idx = (value_idx + 1) % values.len();
        flat += step;
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{
        array,
        Array2,
    };
    use rstest::rstest;

    use super::*;

    #[test]
    fn reads_upper_and_lower_diagonals() {
        let arr = array![[1, 2, 3], [4, 5, 6], [7, 8, 9]];
        assert_eq!(get_diag(arr.view(), 0).to_vec(), vec![1, 5, 9]);
        assert_eq!(get_diag(arr.view(), 1).to_vec(), vec![2, 6]);
        assert_eq!(get_diag(arr.view(), -2).to_vec(), vec![7]);
        assert!(get_diag(arr.view(), 3).is_empty());
        assert!(get_diag(arr.view(), -7).is_empty());
    }

    #[test]
    fn rectangular_diagonals() {
        let arr = array![[1, 2, 3, 4], [5, 6, 7, 8]];
        assert_eq!(get_diag(arr.view(), 0).to_vec(), vec![1, 6]);
        assert_eq!(get_diag(arr.view(), 2).to_vec(), vec![3, 8]);
        assert_eq!(get_diag(arr.view(), 3).to_vec(), vec![4]);
        assert_eq!(get_diag(arr.view(), -1).to_vec(), vec![5]);
        assert_eq!(diag_len(2, 4, 3), 1);
        assert_eq!(diag_len(2, 4, -1), 1);
        assert_eq!(diag_len(2, 4, -2), 0);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(-1)]
    #[case(4)]
    #[case(-4)]
    fn diagonal_round_trip(#[case] k: isize) {
        let n = 5;
        let mut arr = Array2::<f64>::zeros((n, n));
        let len = diag_len(n, n, k);
        let values = (0..len).map(|x| x as f64 * 1.5 + 0.25).collect::<Vec<_>>();

        set_diag_values(&mut arr, &values, k).unwrap();
        assert_eq!(get_diag(arr.view(), k).to_vec(), values);

        set_diag(&mut arr, 7.0, k);
        assert!(get_diag(arr.view(), k).iter().all(|v| *v == 7.0));
    }

    #[test]
    fn values_length_is_checked() {
        let mut arr = Array2::<f64>::zeros((3, 3));
        let err = set_diag_values(&mut arr, &[1.0, 2.0], 0).unwrap_err();
        assert!(matches!(
            crate::error::hic_error(&err),
            Some(crate::error::HicError::InvalidConfig(_))
        ));
        assert!(arr.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn copying_variants_leave_input_untouched() {
        let arr = Array2::<f64>::zeros((3, 3));
        let out = with_diag(arr.view(), 1.0, 0);
        assert_eq!(get_diag(out.view(), 0).to_vec(), vec![1.0; 3]);
        assert!(arr.iter().all(|v| *v == 0.0));

        let out = with_diag_values(arr.view(), &[4.0, 5.0], -1).unwrap();
        assert_eq!(out[[1, 0]], 4.0);
        assert_eq!(out[[2, 1]], 5.0);
    }

    #[test]
    fn fill_diagonal_tall_matrix() {
        let mut no_wrap = Array2::<i32>::zeros((7, 3));
        fill_diagonal(&mut no_wrap, &[5], 0, false);
        assert_eq!(no_wrap.iter().filter(|v| **v == 5).count(), 3);
        assert_eq!(no_wrap[[3, 0]], 0);

        let mut wrapped = Array2::<i32>::zeros((7, 3));
        fill_diagonal(&mut wrapped, &[5], 0, true);
        // every fourth flat element: rows 0,1,2 then row 4 restarts
        assert_eq!(wrapped[[4, 0]], 5);
        assert_eq!(wrapped[[5, 1]], 5);
        assert_eq!(wrapped[[6, 2]], 5);
        assert_eq!(wrapped[[3, 0]], 0);
    }

    #[test]
    fn fill_diagonal_offset_and_cycling() {
        let mut arr = Array2::<i32>::zeros((4, 4));
        fill_diagonal(&mut arr, &[1, 2], 1, false);
        assert_eq!(get_diag(arr.view(), 1).to_vec(), vec![1, 2, 1]);
    }
}
