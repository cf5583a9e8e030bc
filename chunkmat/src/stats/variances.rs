//! Row and column variances
//!
//! Variances use the `n - 1` denominator. A target element with no usable
//! observations has NaN mean and variance; one with a single observation
//! has NaN variance.

use chunkmat_core::MatrixElement;

use super::utils::{range_indices, range_values, visit_dense, visit_sparse};
use crate::config::{ExtractOptions, StatsOptions};
use crate::error::Result;
use crate::matrix::{Matrix, Selection};
use crate::parallel::parallelize;

/// Fold `value` into a running mean and sum of squared deviations
///
/// `count` includes `value`.
pub fn add_welford(mean: &mut f64, sumsq: &mut f64, value: f64, count: usize) {
    let delta = value - *mean;
    *mean += delta / count as f64;
    *sumsq += delta * (value - *mean);
}

/// Fold `num_all - num_nonzero` implicit zeros into statistics that so far
/// cover only the `num_nonzero` stored values
pub fn add_welford_zeros(mean: &mut f64, sumsq: &mut f64, num_nonzero: usize, num_all: usize) {
    let ratio = num_nonzero as f64 / num_all as f64;
    *sumsq += *mean * *mean * ratio * (num_all - num_nonzero) as f64;
    *mean *= ratio;
}

fn kept<V: MatrixElement>(values: &[V], skip_nan: bool) -> impl Iterator<Item = f64> + '_ {
    values
        .iter()
        .filter(move |v| !(skip_nan && v.is_nan()))
        .map(|v| v.to_f64())
}

fn finish(mean: f64, sumsq: f64, count: usize) -> (f64, f64) {
    match count {
        0 => (f64::NAN, f64::NAN),
        1 => (mean, f64::NAN),
        _ => (mean, sumsq / (count - 1) as f64),
    }
}

/// Mean and variance of `values`
pub fn direct<V: MatrixElement>(values: &[V], skip_nan: bool) -> (f64, f64) {
    let count = kept(values, skip_nan).count();
    if count == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = kept(values, skip_nan).sum::<f64>() / count as f64;
    let sumsq = kept(values, skip_nan).map(|x| (x - mean) * (x - mean)).sum();
    finish(mean, sumsq, count)
}

/// Mean and variance of `num_all` values, of which only the non-zero
/// `values` are stored
pub fn direct_sparse<V: MatrixElement>(values: &[V], num_all: usize, skip_nan: bool) -> (f64, f64) {
    let lost = values.len() - kept(values, skip_nan).count();
    let count = num_all - lost;
    if count == 0 {
        return (f64::NAN, f64::NAN);
    }
    let mean = kept(values, skip_nan).sum::<f64>() / count as f64;
    let num_zeros = (num_all - values.len()) as f64;
    let sumsq = kept(values, skip_nan).map(|x| (x - mean) * (x - mean)).sum::<f64>() + mean * mean * num_zeros;
    finish(mean, sumsq, count)
}

/// Means and variances over target elements, fed one dense non-target
/// vector at a time
#[derive(Debug, Clone)]
pub struct RunningDense {
    means: Vec<f64>,
    sumsq: Vec<f64>,
    // Per-element counts, only needed when NaNs are skipped.
    ok_counts: Option<Vec<usize>>,
    count: usize,
}

impl RunningDense {
    pub fn new(num: usize, skip_nan: bool) -> Self {
        Self {
            means: vec![0.0; num],
            sumsq: vec![0.0; num],
            ok_counts: skip_nan.then(|| vec![0; num]),
            count: 0,
        }
    }

    pub fn add<V: MatrixElement>(&mut self, values: &[V]) {
        self.count += 1;
        let pairs = self.means.iter_mut().zip(self.sumsq.iter_mut()).zip(values);
        match &mut self.ok_counts {
            Some(ok_counts) => {
                for (((mean, sumsq), &v), ok) in pairs.zip(ok_counts.iter_mut()) {
                    if !v.is_nan() {
                        *ok += 1;
                        add_welford(mean, sumsq, v.to_f64(), *ok);
                    }
                }
            }
            None => {
                for ((mean, sumsq), &v) in pairs {
                    add_welford(mean, sumsq, v.to_f64(), self.count);
                }
            }
        }
    }

    /// Means and variances of every target element
    pub fn finish(self) -> (Vec<f64>, Vec<f64>) {
        let count = self.count;
        let ok_counts = self.ok_counts;
        self.means
            .into_iter()
            .zip(self.sumsq)
            .enumerate()
            .map(|(i, (mean, sumsq))| {
                let n = ok_counts.as_ref().map_or(count, |ok| ok[i]);
                finish(mean, sumsq, n)
            })
            .unzip()
    }
}

/// Means and variances over target elements, fed one sparse non-target
/// vector at a time
///
/// Indices are offset by `subtract` to land in `0..num`. Implicit zeros are
/// folded in by [`RunningSparse::finish`].
#[derive(Debug, Clone)]
pub struct RunningSparse {
    means: Vec<f64>,
    sumsq: Vec<f64>,
    nonzero: Vec<usize>,
    nan: Option<Vec<usize>>,
    count: usize,
    subtract: usize,
}

impl RunningSparse {
    pub fn new(num: usize, skip_nan: bool, subtract: usize) -> Self {
        Self {
            means: vec![0.0; num],
            sumsq: vec![0.0; num],
            nonzero: vec![0; num],
            nan: skip_nan.then(|| vec![0; num]),
            count: 0,
            subtract,
        }
    }

    pub fn add<V: MatrixElement>(&mut self, values: &[V], indices: &[usize]) {
        self.count += 1;
        for (&v, &i) in values.iter().zip(indices) {
            let r = i - self.subtract;
            if let Some(nan) = &mut self.nan {
                if v.is_nan() {
                    nan[r] += 1;
                    continue;
                }
            }
            self.nonzero[r] += 1;
            add_welford(&mut self.means[r], &mut self.sumsq[r], v.to_f64(), self.nonzero[r]);
        }
    }

    /// Means and variances of every target element
    pub fn finish(self) -> (Vec<f64>, Vec<f64>) {
        let Self {
            mut means,
            mut sumsq,
            nonzero,
            nan,
            count,
            ..
        } = self;
        let mut variances = Vec::with_capacity(means.len());
        for i in 0..means.len() {
            let actual = count - nan.as_ref().map_or(0, |nan| nan[i]);
            if actual > nonzero[i] {
                add_welford_zeros(&mut means[i], &mut sumsq[i], nonzero[i], actual);
            }
            let (mean, var) = finish(means[i], sumsq[i], actual);
            means[i] = mean;
            variances.push(var);
        }
        (means, variances)
    }
}

/// Variance of every row (`row = true`) or column of `matrix`
pub fn apply<M: Matrix + ?Sized>(row: bool, matrix: &M, options: &StatsOptions) -> Result<Vec<f64>> {
    let dim = matrix.target_dim(row);
    let otherdim = matrix.non_target_dim(row);
    let direct_mode = matrix.prefer_rows() == row;
    let skip_nan = options.skip_nan;
    tracing::debug!(row, dim, direct = direct_mode, "computing variances");

    let blocks = parallelize(dim, options.num_threads, |_, start, length| {
        if matrix.is_sparse() {
            if direct_mode {
                let mut out = Vec::with_capacity(length);
                let opts = ExtractOptions::default().with_sparse_extract_index(false);
                visit_sparse(matrix, row, start, length, Selection::Full, &opts, |range| {
                    out.push(direct_sparse(range_values(&range), otherdim, skip_nan).1);
                    Ok(())
                })?;
                Ok(out)
            } else {
                let mut running = RunningSparse::new(length, skip_nan, start);
                let selection = Selection::Block { start, length };
                visit_sparse(matrix, !row, 0, otherdim, selection, &ExtractOptions::default(), |range| {
                    running.add(range_values(&range), range_indices(&range));
                    Ok(())
                })?;
                Ok(running.finish().1)
            }
        } else if direct_mode {
            let mut out = Vec::with_capacity(length);
            visit_dense(matrix, row, start, length, Selection::Full, |values| {
                out.push(direct(values, skip_nan).1);
                Ok(())
            })?;
            Ok(out)
        } else {
            let mut running = RunningDense::new(length, skip_nan);
            visit_dense(matrix, !row, 0, otherdim, Selection::Block { start, length }, |values| {
                running.add(values);
                Ok(())
            })?;
            Ok(running.finish().1)
        }
    })?;
    Ok(blocks.concat())
}

pub fn by_row<M: Matrix + ?Sized>(matrix: &M, options: &StatsOptions) -> Result<Vec<f64>> {
    apply(true, matrix, options)
}

pub fn by_column<M: Matrix + ?Sized>(matrix: &M, options: &StatsOptions) -> Result<Vec<f64>> {
    apply(false, matrix, options)
}

#[cfg(test)]
mod tests {
    use super::super::utils::fixtures;
    use super::*;

    fn assert_close(left: &[f64], right: &[f64]) {
        assert_eq!(left.len(), right.len());
        for (l, r) in left.iter().zip(right) {
            assert!((l - r).abs() < 1e-9 || (l.is_nan() && r.is_nan()), "{left:?} != {right:?}");
        }
    }

    #[test]
    fn test_direct() {
        let (mean, var) = direct(&[1.0, 2.0, 3.0, 6.0], false);
        assert_eq!(mean, 3.0);
        assert!((var - 14.0 / 3.0).abs() < 1e-12);

        let (mean, var) = direct(&[2.0, f64::NAN, 4.0], true);
        assert_eq!((mean, var), (3.0, 2.0));
        assert!(direct(&[2.0, f64::NAN, 4.0], false).1.is_nan());

        let (mean, var) = direct(&[5.0], false);
        assert_eq!(mean, 5.0);
        assert!(var.is_nan());

        let (mean, var) = direct(&[f64::NAN, f64::NAN], true);
        assert!(mean.is_nan() && var.is_nan());
    }

    #[test]
    fn test_direct_sparse() {
        // Same as [2, 0, 0, 4]
        let (mean, var) = direct_sparse(&[2.0, 4.0], 4, false);
        let (ref_mean, ref_var) = direct(&[2.0, 0.0, 0.0, 4.0], false);
        assert!((mean - ref_mean).abs() < 1e-12);
        assert!((var - ref_var).abs() < 1e-12);

        let (mean, var) = direct_sparse(&[f64::NAN, 3.0], 3, true);
        assert_eq!(mean, 1.5);
        assert!((var - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_running_dense_matches_direct() {
        let rows = [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let mut running = RunningDense::new(3, false);
        for r in &rows {
            running.add(r);
        }
        let (means, vars) = running.finish();
        assert_close(&means, &[4.0, 5.0, 6.0]);
        assert_close(&vars, &[9.0, 9.0, 9.0]);

        let mut running = RunningDense::new(2, true);
        running.add(&[f64::NAN, 1.0]);
        running.add(&[2.0, 3.0]);
        running.add(&[4.0, f64::NAN]);
        let (means, vars) = running.finish();
        assert_close(&means, &[3.0, 2.0]);
        assert_close(&vars, &[2.0, 2.0]);
    }

    #[test]
    fn test_running_sparse_zeros() {
        // Target 0 sees [1, 0, 3], target 1 sees [0, 0, 0], target 2 sees [2, NaN, 0].
        let mut running = RunningSparse::new(3, true, 10);
        running.add(&[1.0, 2.0], &[10, 12]);
        running.add(&[f64::NAN], &[12]);
        running.add(&[3.0], &[10]);
        let (means, vars) = running.finish();
        assert_close(&means, &[4.0 / 3.0, 0.0, 1.0]);
        assert_close(&vars, &[direct(&[1.0, 0.0, 3.0], false).1, 0.0, 2.0]);
    }

    #[test]
    fn test_matrix_variances() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let options = StatsOptions::default();
        for (chunk_nrow, chunk_ncol) in [(1, 3), (3, 1), (2, 2)] {
            let dense = fixtures::dense(3, 3, chunk_nrow, chunk_ncol, &data, 1 << 20);
            assert_close(&by_row(&dense, &options).unwrap(), &[1.0, 1.0, 1.0]);
            assert_close(&by_column(&dense, &options).unwrap(), &[9.0, 9.0, 9.0]);

            let sparse = fixtures::sparse(3, 3, chunk_nrow, chunk_ncol, &data, 0);
            assert_close(&by_row(&sparse, &options).unwrap(), &[1.0, 1.0, 1.0]);
            assert_close(&by_column(&sparse, &options).unwrap(), &[9.0, 9.0, 9.0]);
        }
    }

    #[test]
    fn test_sparse_matrix_with_zeros() {
        #[rustfmt::skip]
        let data = [
            0.0, 2.0, 0.0, 1.0,
            5.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 7.0,
        ];
        let options = StatsOptions::default().with_num_threads(2);
        for cache in [0, 1 << 20] {
            let sparse = fixtures::sparse(3, 4, 2, 3, &data, cache);
            let rows: Vec<f64> = data.chunks(4).map(|r| direct(r, false).1).collect();
            let cols: Vec<f64> = (0..4)
                .map(|c| direct(&[data[c], data[4 + c], data[8 + c]], false).1)
                .collect();
            assert_close(&by_row(&sparse, &options).unwrap(), &rows);
            assert_close(&by_column(&sparse, &options).unwrap(), &cols);
        }
    }
}
