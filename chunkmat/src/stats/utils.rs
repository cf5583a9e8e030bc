//! Grouping helpers and extraction loops shared by the statistics

use std::sync::Arc;

use chunkmat_core::{ConsecutiveOracle, MatrixElement};

use crate::config::ExtractOptions;
use crate::error::Result;
use crate::matrix::{Matrix, Selection, SparseRange};

/// Number of groups, assuming group ids are `0..n`
pub fn total_groups(group: &[usize]) -> usize {
    group.iter().max().map_or(0, |&g| g + 1)
}

/// Size of each group
pub fn tabulate_groups(group: &[usize]) -> Vec<usize> {
    let mut sizes = vec![0; total_groups(group)];
    for &g in group {
        sizes[g] += 1;
    }
    sizes
}

/// Feed target elements `[start, start + length)` to `f` as dense vectors
pub(crate) fn visit_dense<M, F>(
    matrix: &M,
    row: bool,
    start: usize,
    length: usize,
    selection: Selection,
    mut f: F,
) -> Result<()>
where
    M: Matrix + ?Sized,
    F: FnMut(&[M::Element]) -> Result<()>,
{
    let width = selection.len(matrix.non_target_dim(row));
    let oracle = Arc::new(ConsecutiveOracle::new(start, length));
    let mut ext = matrix.dense_oracular(row, oracle, selection, &ExtractOptions::default())?;
    let mut buffer = vec![M::Element::zero(); width];
    for i in start..start + length {
        f(ext.fetch(i, &mut buffer)?)?;
    }
    Ok(())
}

/// Feed target elements `[start, start + length)` to `f` as sparse ranges
pub(crate) fn visit_sparse<M, F>(
    matrix: &M,
    row: bool,
    start: usize,
    length: usize,
    selection: Selection,
    options: &ExtractOptions,
    mut f: F,
) -> Result<()>
where
    M: Matrix + ?Sized,
    F: FnMut(SparseRange<'_, M::Element>) -> Result<()>,
{
    let width = selection.len(matrix.non_target_dim(row));
    let oracle = Arc::new(ConsecutiveOracle::new(start, length));
    let mut ext = matrix.sparse_oracular(row, oracle, selection, options)?;
    let mut values = vec![M::Element::zero(); width];
    let mut indices = vec![0; width];
    for i in start..start + length {
        f(ext.fetch(i, &mut values, &mut indices)?)?;
    }
    Ok(())
}

/// Values of a sparse range, empty when none were extracted
pub(crate) fn range_values<'a, V>(range: &SparseRange<'a, V>) -> &'a [V] {
    range.values.unwrap_or(&[])
}

/// Indices of a sparse range, empty when none were extracted
pub(crate) fn range_indices<'a, V>(range: &SparseRange<'a, V>) -> &'a [usize] {
    range.indices.unwrap_or(&[])
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small matrices shared by the statistic tests

    use crate::chunk::{DenseVecBlob, SimpleDenseChunk, SimpleSparseChunk, SparseVecBlob};
    use crate::config::ChunkedMatrixOptions;
    use crate::matrix::{ChunkedDenseMatrix, ChunkedSparseMatrix};

    /// Split a row-major buffer into `chunk_nrow x chunk_ncol` tiles
    fn tiles(
        nrow: usize,
        ncol: usize,
        chunk_nrow: usize,
        chunk_ncol: usize,
        data: &[f64],
    ) -> Vec<(usize, usize, Vec<f64>)> {
        let mut out = Vec::new();
        for r0 in (0..nrow).step_by(chunk_nrow) {
            for c0 in (0..ncol).step_by(chunk_ncol) {
                let nr = chunk_nrow.min(nrow - r0);
                let nc = chunk_ncol.min(ncol - c0);
                let mut tile = Vec::with_capacity(nr * nc);
                for r in r0..r0 + nr {
                    tile.extend_from_slice(&data[r * ncol + c0..r * ncol + c0 + nc]);
                }
                out.push((nr, nc, tile));
            }
        }
        out
    }

    pub(crate) fn dense(
        nrow: usize,
        ncol: usize,
        chunk_nrow: usize,
        chunk_ncol: usize,
        data: &[f64],
        cache: usize,
    ) -> ChunkedDenseMatrix<SimpleDenseChunk<DenseVecBlob<f64>>> {
        let chunks = tiles(nrow, ncol, chunk_nrow, chunk_ncol, data)
            .into_iter()
            .map(|(nr, nc, tile)| SimpleDenseChunk::new(DenseVecBlob::new(nr, nc, true, tile).unwrap()))
            .collect();
        let options = ChunkedMatrixOptions::default().with_maximum_cache_size(cache);
        ChunkedDenseMatrix::new(nrow, ncol, chunk_nrow, chunk_ncol, chunks, true, &options).unwrap()
    }

    pub(crate) fn sparse(
        nrow: usize,
        ncol: usize,
        chunk_nrow: usize,
        chunk_ncol: usize,
        data: &[f64],
        cache: usize,
    ) -> ChunkedSparseMatrix<SimpleSparseChunk<SparseVecBlob<f64>>> {
        let chunks = tiles(nrow, ncol, chunk_nrow, chunk_ncol, data)
            .into_iter()
            .map(|(nr, nc, tile)| SimpleSparseChunk::new(SparseVecBlob::from_dense(nr, nc, true, &tile).unwrap()))
            .collect();
        let options = ChunkedMatrixOptions::default().with_maximum_cache_size(cache);
        ChunkedSparseMatrix::new(nrow, ncol, chunk_nrow, chunk_ncol, chunks, true, &options).unwrap()
    }
}
