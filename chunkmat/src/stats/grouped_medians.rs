//! Medians over groups of the non-target dimension

use chunkmat_core::{ChunkError, MatrixElement};

use super::medians::{direct, direct_sparse};
use super::utils::{range_indices, range_values, tabulate_groups, visit_dense, visit_sparse};
use crate::config::{ExtractOptions, StatsOptions};
use crate::error::Result;
use crate::matrix::{Matrix, Selection};
use crate::parallel::parallelize;

/// Per-group medians of every row (`row = true`) or column of `matrix`
///
/// `group[j]` assigns non-target position `j` to a group and
/// `group_sizes` is the output of [`tabulate_groups`] for `group`. The
/// result is indexed as `[group][target]`.
pub fn apply<M: Matrix + ?Sized>(
    row: bool,
    matrix: &M,
    group: &[usize],
    group_sizes: &[usize],
    options: &StatsOptions,
) -> Result<Vec<Vec<f64>>> {
    let dim = matrix.target_dim(row);
    let otherdim = matrix.non_target_dim(row);
    if group.len() != otherdim || tabulate_groups(group) != group_sizes {
        return Err(ChunkError::ChunkDimensionMismatch.into());
    }
    let num_groups = group_sizes.len();
    let skip_nan = options.skip_nan;
    tracing::debug!(row, dim, num_groups, "computing grouped medians");

    let blocks = parallelize(dim, options.num_threads, |_, start, length| {
        let mut out = vec![Vec::with_capacity(length); num_groups];
        let mut buffers: Vec<Vec<f64>> = group_sizes.iter().map(|&n| Vec::with_capacity(n)).collect();
        if matrix.is_sparse() {
            visit_sparse(matrix, row, start, length, Selection::Full, &ExtractOptions::default(), |range| {
                buffers.iter_mut().for_each(Vec::clear);
                for (&v, &j) in range_values(&range).iter().zip(range_indices(&range)) {
                    buffers[group[j]].push(v.to_f64());
                }
                for ((buffer, &size), out) in buffers.iter_mut().zip(group_sizes).zip(out.iter_mut()) {
                    out.push(direct_sparse(buffer, size, skip_nan));
                }
                Ok(())
            })?;
        } else {
            visit_dense(matrix, row, start, length, Selection::Full, |values| {
                buffers.iter_mut().for_each(Vec::clear);
                for (&v, &g) in values.iter().zip(group) {
                    buffers[g].push(v.to_f64());
                }
                for (buffer, out) in buffers.iter_mut().zip(out.iter_mut()) {
                    out.push(direct(buffer, skip_nan));
                }
                Ok(())
            })?;
        }
        Ok(out)
    })?;

    let mut output = vec![Vec::with_capacity(dim); num_groups];
    for block in blocks {
        for (all, part) in output.iter_mut().zip(block) {
            all.extend(part);
        }
    }
    Ok(output)
}

pub fn by_row<M: Matrix + ?Sized>(matrix: &M, group: &[usize], options: &StatsOptions) -> Result<Vec<Vec<f64>>> {
    apply(true, matrix, group, &tabulate_groups(group), options)
}

pub fn by_column<M: Matrix + ?Sized>(matrix: &M, group: &[usize], options: &StatsOptions) -> Result<Vec<Vec<f64>>> {
    apply(false, matrix, group, &tabulate_groups(group), options)
}
