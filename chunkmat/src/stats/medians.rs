//! Row and column medians
//!
//! Medians are always computed directly along the target dimension, as
//! they cannot be accumulated in a single running pass.

use chunkmat_core::MatrixElement;

use super::utils::{range_values, visit_dense, visit_sparse};
use crate::config::{ExtractOptions, StatsOptions};
use crate::error::Result;
use crate::matrix::{Matrix, Selection};
use crate::parallel::parallelize;

/// Move every NaN to the front of `values`, returning how many there were
pub fn translocate_nans(values: &mut [f64]) -> usize {
    let mut lost = 0;
    for i in 0..values.len() {
        if values[i].is_nan() {
            values.swap(i, lost);
            lost += 1;
        }
    }
    lost
}

/// Drop NaNs if requested, or report whether one should propagate
fn usable(values: &mut [f64], skip_nan: bool) -> Option<&mut [f64]> {
    if skip_nan {
        let lost = translocate_nans(values);
        Some(&mut values[lost..])
    } else if values.iter().any(|v| v.is_nan()) {
        None
    } else {
        Some(values)
    }
}

/// Median of `values`, which are reordered in place
pub fn direct(values: &mut [f64], skip_nan: bool) -> f64 {
    let Some(values) = usable(values, skip_nan) else {
        return f64::NAN;
    };
    let num = values.len();
    if num == 0 {
        return f64::NAN;
    }
    let halfway = num / 2;
    let (lower, &mut mid, _) = values.select_nth_unstable_by(halfway, f64::total_cmp);
    if num % 2 == 1 {
        return mid;
    }
    let (_, &mut below, _) = lower.select_nth_unstable_by(halfway - 1, f64::total_cmp);
    (mid + below) / 2.0
}

/// Median of `num_all` values, of which only the non-zero `values` are
/// stored; `values` is reordered in place
pub fn direct_sparse(values: &mut [f64], num_all: usize, skip_nan: bool) -> f64 {
    let stored = values.len();
    let Some(values) = usable(values, skip_nan) else {
        return f64::NAN;
    };
    let num_all = num_all - (stored - values.len());
    if num_all == 0 {
        return f64::NAN;
    }
    if values.is_empty() {
        return 0.0;
    }

    values.sort_unstable_by(f64::total_cmp);
    let num_negative = values.partition_point(|&v| v < 0.0);
    let num_zero = num_all - values.len();
    // Position `k` of the fully sorted vector, zeros included.
    let sorted = |k: usize| {
        if k < num_negative {
            values[k]
        } else if k < num_negative + num_zero {
            0.0
        } else {
            values[k - num_zero]
        }
    };

    let halfway = num_all / 2;
    if num_all % 2 == 1 {
        sorted(halfway)
    } else {
        (sorted(halfway - 1) + sorted(halfway)) / 2.0
    }
}

/// Median of every row (`row = true`) or column of `matrix`
pub fn apply<M: Matrix + ?Sized>(row: bool, matrix: &M, options: &StatsOptions) -> Result<Vec<f64>> {
    let dim = matrix.target_dim(row);
    let otherdim = matrix.non_target_dim(row);
    let skip_nan = options.skip_nan;
    tracing::debug!(row, dim, "computing medians");

    let blocks = parallelize(dim, options.num_threads, |_, start, length| {
        let mut out = Vec::with_capacity(length);
        let mut buffer = Vec::with_capacity(otherdim);
        if matrix.is_sparse() {
            let opts = ExtractOptions::default().with_sparse_extract_index(false);
            visit_sparse(matrix, row, start, length, Selection::Full, &opts, |range| {
                buffer.clear();
                buffer.extend(range_values(&range).iter().map(|v| v.to_f64()));
                out.push(direct_sparse(&mut buffer, otherdim, skip_nan));
                Ok(())
            })?;
        } else {
            visit_dense(matrix, row, start, length, Selection::Full, |values| {
                buffer.clear();
                buffer.extend(values.iter().map(|v| v.to_f64()));
                out.push(direct(&mut buffer, skip_nan));
                Ok(())
            })?;
        }
        Ok(out)
    })?;
    Ok(blocks.concat())
}

pub fn by_row<M: Matrix + ?Sized>(matrix: &M, options: &StatsOptions) -> Result<Vec<f64>> {
    apply(true, matrix, options)
}

pub fn by_column<M: Matrix + ?Sized>(matrix: &M, options: &StatsOptions) -> Result<Vec<f64>> {
    apply(false, matrix, options)
}
