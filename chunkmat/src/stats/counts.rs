//! Counting values that satisfy a condition

use chunkmat_core::MatrixElement;

use super::utils::{range_indices, range_values, visit_dense, visit_sparse};
use crate::config::ExtractOptions;
use crate::error::Result;
use crate::matrix::{Matrix, Selection};
use crate::parallel::parallelize;

/// Number of values in every row (`row = true`) or column satisfying `condition`
///
/// For sparse matrices, implicit zeros are counted when `condition(0)` holds.
pub fn apply<M, F>(row: bool, matrix: &M, num_threads: usize, condition: F) -> Result<Vec<usize>>
where
    M: Matrix + ?Sized,
    F: Fn(M::Element) -> bool + Sync,
{
    let dim = matrix.target_dim(row);
    let otherdim = matrix.non_target_dim(row);
    let direct_mode = matrix.prefer_rows() == row;
    let count_zero = condition(M::Element::zero());
    tracing::debug!(row, dim, direct = direct_mode, "counting values");

    if direct_mode {
        let blocks = parallelize(dim, num_threads, |_, start, length| {
            let mut out = Vec::with_capacity(length);
            if matrix.is_sparse() {
                let opts = ExtractOptions::default().with_sparse_extract_index(false);
                visit_sparse(matrix, row, start, length, Selection::Full, &opts, |range| {
                    let values = range_values(&range);
                    let mut count = values.iter().filter(|&&v| condition(v)).count();
                    if count_zero {
                        count += otherdim - values.len();
                    }
                    out.push(count);
                    Ok(())
                })?;
            } else {
                visit_dense(matrix, row, start, length, Selection::Full, |values| {
                    out.push(values.iter().filter(|&&v| condition(v)).count());
                    Ok(())
                })?;
            }
            Ok(out)
        })?;
        return Ok(blocks.concat());
    }

    // Each worker walks a block of the other dimension and counts into
    // its own copy of the output.
    let partials = parallelize(otherdim, num_threads, |_, start, length| {
        let mut counts = vec![0usize; dim];
        if matrix.is_sparse() {
            let mut nonzero = vec![0usize; dim];
            visit_sparse(matrix, !row, start, length, Selection::Full, &ExtractOptions::default(), |range| {
                for (&v, &i) in range_values(&range).iter().zip(range_indices(&range)) {
                    if condition(v) {
                        counts[i] += 1;
                    }
                    nonzero[i] += 1;
                }
                Ok(())
            })?;
            if count_zero {
                for (count, nonzero) in counts.iter_mut().zip(nonzero) {
                    *count += length - nonzero;
                }
            }
        } else {
            visit_dense(matrix, !row, start, length, Selection::Full, |values| {
                for (count, &v) in counts.iter_mut().zip(values) {
                    if condition(v) {
                        *count += 1;
                    }
                }
                Ok(())
            })?;
        }
        Ok(counts)
    })?;

    let mut total = vec![0usize; dim];
    for partial in partials {
        for (t, p) in total.iter_mut().zip(partial) {
            *t += p;
        }
    }
    Ok(total)
}

/// Counting NaN values
pub mod nan {
    use super::*;

    pub fn by_row<M: Matrix + ?Sized>(matrix: &M, num_threads: usize) -> Result<Vec<usize>> {
        apply(true, matrix, num_threads, |v: M::Element| v.is_nan())
    }

    pub fn by_column<M: Matrix + ?Sized>(matrix: &M, num_threads: usize) -> Result<Vec<usize>> {
        apply(false, matrix, num_threads, |v: M::Element| v.is_nan())
    }
}

/// Counting zeros
pub mod zero {
    use super::*;

    pub fn by_row<M: Matrix + ?Sized>(matrix: &M, num_threads: usize) -> Result<Vec<usize>> {
        apply(true, matrix, num_threads, |v: M::Element| v == M::Element::zero())
    }

    pub fn by_column<M: Matrix + ?Sized>(matrix: &M, num_threads: usize) -> Result<Vec<usize>> {
        apply(false, matrix, num_threads, |v: M::Element| v == M::Element::zero())
    }
}
