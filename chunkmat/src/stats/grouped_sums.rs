//! Sums over groups of the non-target dimension

use chunkmat_core::{ChunkError, MatrixElement};

use super::sums::{RunningDense, RunningSparse};
use super::utils::{range_indices, range_values, visit_dense, visit_sparse};
use crate::config::{ExtractOptions, StatsOptions};
use crate::error::Result;
use crate::matrix::{Matrix, Selection};
use crate::parallel::parallelize;

/// Per-group sums of every row (`row = true`) or column of `matrix`
///
/// `group[j]` assigns non-target position `j` to a group in
/// `0..num_groups`. The result is indexed as `[group][target]`.
pub fn apply<M: Matrix + ?Sized>(
    row: bool,
    matrix: &M,
    group: &[usize],
    num_groups: usize,
    options: &StatsOptions,
) -> Result<Vec<Vec<f64>>> {
    let dim = matrix.target_dim(row);
    let otherdim = matrix.non_target_dim(row);
    if group.len() != otherdim {
        return Err(ChunkError::ChunkDimensionMismatch.into());
    }
    if group.iter().any(|&g| g >= num_groups) {
        return Err(ChunkError::IndexOutOfBounds.into());
    }
    let direct_mode = matrix.prefer_rows() == row;
    let skip_nan = options.skip_nan;
    tracing::debug!(row, dim, num_groups, direct = direct_mode, "computing grouped sums");

    let blocks = parallelize(dim, options.num_threads, |_, start, length| {
        if direct_mode {
            let mut out = vec![vec![0.0; length]; num_groups];
            let mut k = 0;
            if matrix.is_sparse() {
                visit_sparse(matrix, row, start, length, Selection::Full, &ExtractOptions::default(), |range| {
                    for (&v, &j) in range_values(&range).iter().zip(range_indices(&range)) {
                        if !(skip_nan && v.is_nan()) {
                            out[group[j]][k] += v.to_f64();
                        }
                    }
                    k += 1;
                    Ok(())
                })?;
            } else {
                visit_dense(matrix, row, start, length, Selection::Full, |values| {
                    for (&v, &g) in values.iter().zip(group) {
                        if !(skip_nan && v.is_nan()) {
                            out[g][k] += v.to_f64();
                        }
                    }
                    k += 1;
                    Ok(())
                })?;
            }
            return Ok(out);
        }

        let selection = Selection::Block { start, length };
        let mut j = 0;
        if matrix.is_sparse() {
            let mut running: Vec<_> = (0..num_groups)
                .map(|_| RunningSparse::new(length, skip_nan, start))
                .collect();
            visit_sparse(matrix, !row, 0, otherdim, selection, &ExtractOptions::default(), |range| {
                running[group[j]].add(range_values(&range), range_indices(&range));
                j += 1;
                Ok(())
            })?;
            Ok(running.into_iter().map(RunningSparse::finish).collect())
        } else {
            let mut running: Vec<_> = (0..num_groups).map(|_| RunningDense::new(length, skip_nan)).collect();
            visit_dense(matrix, !row, 0, otherdim, selection, |values| {
                running[group[j]].add(values);
                j += 1;
                Ok(())
            })?;
            Ok(running.into_iter().map(RunningDense::finish).collect())
        }
    })?;

    let mut output = vec![Vec::with_capacity(dim); num_groups];
    for block in blocks {
        for (all, part) in output.iter_mut().zip(block) {
            all.extend(part);
        }
    }
    Ok(output)
}

pub fn by_row<M: Matrix + ?Sized>(
    matrix: &M,
    group: &[usize],
    num_groups: usize,
    options: &StatsOptions,
) -> Result<Vec<Vec<f64>>> {
    apply(true, matrix, group, num_groups, options)
}

pub fn by_column<M: Matrix + ?Sized>(
    matrix: &M,
    group: &[usize],
    num_groups: usize,
    options: &StatsOptions,
) -> Result<Vec<Vec<f64>>> {
    apply(false, matrix, group, num_groups, options)
}

#[cfg(test)]
mod tests {
    use super::super::utils::{fixtures, total_groups};
    use super::*;

    #[rustfmt::skip]
    const DATA: [f64; 15] = [
        1.0, 0.0, 2.0, 0.0, 3.0,
        0.0, 4.0, 0.0, 5.0, 0.0,
        6.0, f64::NAN, 0.0, 0.0, 7.0,
    ];

    #[test]
    fn test_grouped_by_row() {
        let group = [0, 1, 0, 2, 1];
        let options = StatsOptions::default().with_skip_nan(true).with_num_threads(2);
        let expected = vec![vec![3.0, 0.0, 6.0], vec![3.0, 4.0, 7.0], vec![0.0, 5.0, 0.0]];
        for (chunk_nrow, chunk_ncol) in [(3, 1), (1, 5), (2, 2)] {
            let dense = fixtures::dense(3, 5, chunk_nrow, chunk_ncol, &DATA, 1 << 20);
            let n = total_groups(&group);
            assert_eq!(by_row(&dense, &group, n, &options).unwrap(), expected);
            let sparse = fixtures::sparse(3, 5, chunk_nrow, chunk_ncol, &DATA, 1 << 20);
            assert_eq!(by_row(&sparse, &group, n, &options).unwrap(), expected);
        }
    }

    #[test]
    fn test_grouped_by_column() {
        let group = [1, 0, 1];
        let options = StatsOptions::default().with_num_threads(3);
        for (chunk_nrow, chunk_ncol) in [(3, 1), (1, 5), (2, 2)] {
            let dense = fixtures::dense(3, 5, chunk_nrow, chunk_ncol, &DATA, 0);
            let out = by_column(&dense, &group, 2, &options).unwrap();
            assert_eq!(out[0], vec![0.0, 4.0, 0.0, 5.0, 0.0]);
            assert_eq!(out[1][0], 7.0);
            assert!(out[1][1].is_nan());
            assert_eq!(&out[1][2..], &[2.0, 0.0, 10.0]);
        }
    }

    #[test]
    fn test_group_checks() {
        let dense = fixtures::dense(3, 5, 2, 2, &DATA, 0);
        let options = StatsOptions::default();
        assert_eq!(
            by_row(&dense, &[0, 1], 2, &options),
            Err(ChunkError::ChunkDimensionMismatch.into())
        );
        assert_eq!(
            by_column(&dense, &[0, 1, 2], 2, &options),
            Err(ChunkError::IndexOutOfBounds.into())
        );
    }
}
