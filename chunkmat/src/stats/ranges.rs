//! Row and column minima and maxima
//!
//! Types are parametrized by `MINIMUM`: `true` tracks the minimum, `false`
//! the maximum. An element with no usable observations reports the
//! placeholder, `+inf` for minima and `-inf` for maxima.

use chunkmat_core::MatrixElement;

use super::utils::{range_indices, range_values, visit_dense, visit_sparse};
use crate::config::{ExtractOptions, StatsOptions};
use crate::error::Result;
use crate::matrix::{Matrix, Selection};
use crate::parallel::parallelize;

/// Starting value that any observation replaces
pub const fn placeholder<const MINIMUM: bool>() -> f64 {
    if MINIMUM {
        f64::INFINITY
    } else {
        f64::NEG_INFINITY
    }
}

fn better<const MINIMUM: bool>(candidate: f64, current: f64) -> bool {
    if MINIMUM {
        candidate < current
    } else {
        candidate > current
    }
}

// NaN wins when not skipped, so that it propagates.
fn update<const MINIMUM: bool>(current: &mut f64, value: f64, skip_nan: bool) {
    if value.is_nan() {
        if !skip_nan {
            *current = value;
        }
    } else if !current.is_nan() && better::<MINIMUM>(value, *current) {
        *current = value;
    }
}

/// Minimum or maximum of `values`
pub fn direct<const MINIMUM: bool, V: MatrixElement>(values: &[V], skip_nan: bool) -> f64 {
    let mut best = placeholder::<MINIMUM>();
    for v in values {
        update::<MINIMUM>(&mut best, v.to_f64(), skip_nan);
    }
    best
}

/// Minimum or maximum of `num_all` values, of which only the non-zero
/// `values` are stored
pub fn direct_sparse<const MINIMUM: bool, V: MatrixElement>(values: &[V], num_all: usize, skip_nan: bool) -> f64 {
    let mut best = direct::<MINIMUM, V>(values, skip_nan);
    if values.len() < num_all {
        update::<MINIMUM>(&mut best, 0.0, skip_nan);
    }
    best
}

/// Minima or maxima over target elements, fed one dense non-target vector
/// at a time
#[derive(Debug, Clone)]
pub struct RunningDense<const MINIMUM: bool> {
    best: Vec<f64>,
    skip_nan: bool,
    init: bool,
}

impl<const MINIMUM: bool> RunningDense<MINIMUM> {
    pub fn new(num: usize, skip_nan: bool) -> Self {
        Self {
            best: vec![placeholder::<MINIMUM>(); num],
            skip_nan,
            init: true,
        }
    }

    pub fn add<V: MatrixElement>(&mut self, values: &[V]) {
        if self.init {
            self.init = false;
            for (best, &v) in self.best.iter_mut().zip(values) {
                let x = v.to_f64();
                *best = if x.is_nan() && self.skip_nan { placeholder::<MINIMUM>() } else { x };
            }
            return;
        }
        for (best, &v) in self.best.iter_mut().zip(values) {
            update::<MINIMUM>(best, v.to_f64(), self.skip_nan);
        }
    }

    pub fn finish(self) -> Vec<f64> {
        self.best
    }
}

/// Minima or maxima over target elements, fed one sparse non-target vector
/// at a time
///
/// Indices are offset by `subtract` to land in `0..num`. Target elements
/// that missed any observation see an implicit zero in
/// [`RunningSparse::finish`].
#[derive(Debug, Clone)]
pub struct RunningSparse<const MINIMUM: bool> {
    best: Vec<f64>,
    nonzero: Vec<usize>,
    count: usize,
    skip_nan: bool,
    subtract: usize,
}

impl<const MINIMUM: bool> RunningSparse<MINIMUM> {
    pub fn new(num: usize, skip_nan: bool, subtract: usize) -> Self {
        Self {
            best: vec![placeholder::<MINIMUM>(); num],
            nonzero: vec![0; num],
            count: 0,
            skip_nan,
            subtract,
        }
    }

    pub fn add<V: MatrixElement>(&mut self, values: &[V], indices: &[usize]) {
        self.count += 1;
        for (&v, &i) in values.iter().zip(indices) {
            let r = i - self.subtract;
            let x = v.to_f64();
            if self.nonzero[r] == 0 {
                if !(x.is_nan() && self.skip_nan) {
                    self.best[r] = x;
                }
            } else {
                update::<MINIMUM>(&mut self.best[r], x, self.skip_nan);
            }
            self.nonzero[r] += 1;
        }
    }

    pub fn finish(self) -> Vec<f64> {
        let Self {
            mut best,
            nonzero,
            count,
            skip_nan,
            ..
        } = self;
        for (best, &nonzero) in best.iter_mut().zip(&nonzero) {
            if count > nonzero {
                update::<MINIMUM>(best, 0.0, skip_nan);
            }
        }
        best
    }
}

fn apply_one<const MINIMUM: bool, M: Matrix + ?Sized>(
    row: bool,
    matrix: &M,
    options: &StatsOptions,
) -> Result<Vec<f64>> {
    let dim = matrix.target_dim(row);
    let otherdim = matrix.non_target_dim(row);
    let direct_mode = matrix.prefer_rows() == row;
    let skip_nan = options.skip_nan;

    let blocks = parallelize(dim, options.num_threads, |_, start, length| {
        if matrix.is_sparse() {
            if direct_mode {
                let mut out = Vec::with_capacity(length);
                let opts = ExtractOptions::default().with_sparse_extract_index(false);
                visit_sparse(matrix, row, start, length, Selection::Full, &opts, |range| {
                    out.push(direct_sparse::<MINIMUM, _>(range_values(&range), otherdim, skip_nan));
                    Ok(())
                })?;
                Ok(out)
            } else {
                let mut running = RunningSparse::<MINIMUM>::new(length, skip_nan, start);
                let selection = Selection::Block { start, length };
                visit_sparse(matrix, !row, 0, otherdim, selection, &ExtractOptions::default(), |range| {
                    running.add(range_values(&range), range_indices(&range));
                    Ok(())
                })?;
                Ok(running.finish())
            }
        } else if direct_mode {
            let mut out = Vec::with_capacity(length);
            visit_dense(matrix, row, start, length, Selection::Full, |values| {
                out.push(direct::<MINIMUM, _>(values, skip_nan));
                Ok(())
            })?;
            Ok(out)
        } else {
            let mut running = RunningDense::<MINIMUM>::new(length, skip_nan);
            visit_dense(matrix, !row, 0, otherdim, Selection::Block { start, length }, |values| {
                running.add(values);
                Ok(())
            })?;
            Ok(running.finish())
        }
    })?;
    Ok(blocks.concat())
}

/// `(minima, maxima)` of every row (`row = true`) or column of `matrix`
pub fn apply<M: Matrix + ?Sized>(row: bool, matrix: &M, options: &StatsOptions) -> Result<(Vec<f64>, Vec<f64>)> {
    tracing::debug!(row, dim = matrix.target_dim(row), "computing ranges");
    Ok((
        apply_one::<true, M>(row, matrix, options)?,
        apply_one::<false, M>(row, matrix, options)?,
    ))
}

pub fn by_row<M: Matrix + ?Sized>(matrix: &M, options: &StatsOptions) -> Result<(Vec<f64>, Vec<f64>)> {
    apply(true, matrix, options)
}

pub fn by_column<M: Matrix + ?Sized>(matrix: &M, options: &StatsOptions) -> Result<(Vec<f64>, Vec<f64>)> {
    apply(false, matrix, options)
}

#[cfg(test)]
mod tests {
    use super::super::utils::fixtures;
    use super::*;

    #[test]
    fn test_direct() {
        assert_eq!(direct::<true, _>(&[3.0, -1.0, 2.0], false), -1.0);
        assert_eq!(direct::<false, _>(&[3.0, -1.0, 2.0], false), 3.0);
        assert_eq!(direct::<true, f64>(&[], false), f64::INFINITY);
        assert!(direct::<true, _>(&[1.0, f64::NAN, 0.0], false).is_nan());
        assert_eq!(direct::<true, _>(&[1.0, f64::NAN, 0.5], true), 0.5);
        assert_eq!(direct::<false, _>(&[f64::NAN, f64::NAN], true), f64::NEG_INFINITY);
        assert_eq!(direct::<false, _>(&[4i32, 9, -2], false), 9.0);
    }

    #[test]
    fn test_direct_sparse_zeros() {
        assert_eq!(direct_sparse::<true, _>(&[-1.0, 2.0], 5, false), -1.0);
        assert_eq!(direct_sparse::<false, _>(&[-1.0, 2.0], 5, false), 2.0);
        assert_eq!(direct_sparse::<true, _>(&[1.0, 2.0], 5, false), 0.0);
        assert_eq!(direct_sparse::<false, _>(&[-3.0], 2, false), 0.0);
        assert_eq!(direct_sparse::<false, _>(&[-3.0, -1.0], 2, false), -1.0);
    }

    #[test]
    fn test_running_dense() {
        let mut running = RunningDense::<true>::new(3, true);
        running.add(&[f64::NAN, 5.0, 2.0]);
        running.add(&[4.0, 6.0, f64::NAN]);
        running.add(&[7.0, 1.0, 3.0]);
        assert_eq!(running.finish(), vec![4.0, 1.0, 2.0]);

        let mut running = RunningDense::<false>::new(2, false);
        running.add(&[1.0, 2.0]);
        running.add(&[f64::NAN, 3.0]);
        running.add(&[9.0, 0.0]);
        let out = running.finish();
        assert!(out[0].is_nan());
        assert_eq!(out[1], 3.0);
    }

    #[test]
    fn test_running_sparse() {
        let mut min = RunningSparse::<true>::new(3, false, 2);
        let mut max = RunningSparse::<false>::new(3, false, 2);
        for (values, indices) in [(&[5.0, -2.0][..], &[2, 3][..]), (&[4.0][..], &[2][..])] {
            min.add(values, indices);
            max.add(values, indices);
        }
        // Target 0 sees [5, 4], target 1 sees [-2, 0], target 2 sees [0, 0].
        assert_eq!(min.finish(), vec![4.0, -2.0, 0.0]);
        assert_eq!(max.finish(), vec![5.0, 0.0, 0.0]);

        let empty = RunningSparse::<true>::new(2, false, 0);
        assert_eq!(empty.finish(), vec![f64::INFINITY; 2]);
    }

    #[test]
    fn test_matrix_ranges() {
        #[rustfmt::skip]
        let data = [
            0.0, -4.0, 2.0,
            3.0, 0.0, 0.0,
            1.0, 5.0, 6.0,
            0.0, 0.0, -1.0,
        ];
        let rows = (vec![-4.0, 0.0, 1.0, -1.0], vec![2.0, 3.0, 6.0, 0.0]);
        let cols = (vec![0.0, -4.0, -1.0], vec![3.0, 5.0, 6.0]);
        let options = StatsOptions::default().with_num_threads(2);
        for (chunk_nrow, chunk_ncol) in [(4, 1), (1, 3), (3, 2)] {
            let dense = fixtures::dense(4, 3, chunk_nrow, chunk_ncol, &data, 1 << 20);
            assert_eq!(by_row(&dense, &options).unwrap(), rows);
            assert_eq!(by_column(&dense, &options).unwrap(), cols);

            let sparse = fixtures::sparse(4, 3, chunk_nrow, chunk_ncol, &data, 1 << 20);
            assert_eq!(by_row(&sparse, &options).unwrap(), rows);
            assert_eq!(by_column(&sparse, &options).unwrap(), cols);
        }
    }
}
