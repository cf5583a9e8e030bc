//! Row and column sums

use chunkmat_core::MatrixElement;

use super::utils::{range_indices, range_values, visit_dense, visit_sparse};
use crate::config::{ExtractOptions, StatsOptions};
use crate::error::Result;
use crate::matrix::{Matrix, Selection};
use crate::parallel::parallelize;

/// Sum of `values`, ignoring NaNs if `skip_nan` is set
pub fn direct<V: MatrixElement>(values: &[V], skip_nan: bool) -> f64 {
    values
        .iter()
        .filter(|v| !(skip_nan && v.is_nan()))
        .map(|v| v.to_f64())
        .sum()
}

/// Sums over target elements, fed one dense non-target vector at a time
#[derive(Debug, Clone)]
pub struct RunningDense {
    sums: Vec<f64>,
    skip_nan: bool,
}

impl RunningDense {
    pub fn new(num: usize, skip_nan: bool) -> Self {
        Self {
            sums: vec![0.0; num],
            skip_nan,
        }
    }

    /// Add one observation for every target element
    pub fn add<V: MatrixElement>(&mut self, values: &[V]) {
        for (sum, &v) in self.sums.iter_mut().zip(values) {
            if !(self.skip_nan && v.is_nan()) {
                *sum += v.to_f64();
            }
        }
    }

    pub fn finish(self) -> Vec<f64> {
        self.sums
    }
}

/// Sums over target elements, fed one sparse non-target vector at a time
///
/// Indices are offset by `subtract` to land in `0..num`.
#[derive(Debug, Clone)]
pub struct RunningSparse {
    sums: Vec<f64>,
    skip_nan: bool,
    subtract: usize,
}

impl RunningSparse {
    pub fn new(num: usize, skip_nan: bool, subtract: usize) -> Self {
        Self {
            sums: vec![0.0; num],
            skip_nan,
            subtract,
        }
    }

    /// Add the structural non-zeros of one observation
    pub fn add<V: MatrixElement>(&mut self, values: &[V], indices: &[usize]) {
        for (&v, &i) in values.iter().zip(indices) {
            if !(self.skip_nan && v.is_nan()) {
                self.sums[i - self.subtract] += v.to_f64();
            }
        }
    }

    pub fn finish(self) -> Vec<f64> {
        self.sums
    }
}

/// Sum of every row (`row = true`) or column of `matrix`
pub fn apply<M: Matrix + ?Sized>(row: bool, matrix: &M, options: &StatsOptions) -> Result<Vec<f64>> {
    let dim = matrix.target_dim(row);
    let otherdim = matrix.non_target_dim(row);
    let direct_mode = matrix.prefer_rows() == row;
    let skip_nan = options.skip_nan;
    tracing::debug!(row, dim, direct = direct_mode, "computing sums");

    let blocks = parallelize(dim, options.num_threads, |_, start, length| {
        if matrix.is_sparse() {
            if direct_mode {
                let mut out = Vec::with_capacity(length);
                let opts = ExtractOptions::default().with_sparse_extract_index(false);
                visit_sparse(matrix, row, start, length, Selection::Full, &opts, |range| {
                    out.push(direct(range_values(&range), skip_nan));
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
                Ok(running.finish())
            }
        } else if direct_mode {
            let mut out = Vec::with_capacity(length);
            visit_dense(matrix, row, start, length, Selection::Full, |values| {
                out.push(direct(values, skip_nan));
                Ok(())
            })?;
            Ok(out)
        } else {
            let mut running = RunningDense::new(length, skip_nan);
            visit_dense(matrix, !row, 0, otherdim, Selection::Block { start, length }, |values| {
                running.add(values);
                Ok(())
            })?;
            Ok(running.finish())
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
