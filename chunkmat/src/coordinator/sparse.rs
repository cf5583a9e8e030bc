//! Sparse slab population

use chunkmat_core::{validate_index_count, ChunkError, MatrixElement};

use super::{ChunkCoordinator, OracularCache};
use crate::cache::LruSlabCache;
use crate::chunk::{NonTargetSelection, SparseChunk, TargetSelection};
use crate::error::Result;
use crate::slab::{SparseSlab, SparseSlabFactory, SparseSlabMut};

/// Buffer holding one chunk's worth of sparse output, used when a single
/// target index is extracted without a cache
#[derive(Debug, Clone)]
pub struct SparseSingleWorkspace<V> {
    values: Option<Vec<V>>,
    indices: Option<Vec<usize>>,
    number: Vec<usize>,
    capacity: usize,
}

impl<V: MatrixElement> SparseSingleWorkspace<V> {
    pub fn new(target_dim: usize, capacity: usize, needs_value: bool, needs_index: bool) -> Self {
        let total = target_dim * capacity;
        Self {
            values: needs_value.then(|| vec![V::zero(); total]),
            indices: needs_index.then(|| vec![0; total]),
            number: vec![0; target_dim],
            capacity,
        }
    }

    fn view(&mut self) -> SparseSlabMut<'_, V> {
        SparseSlabMut::new(
            self.values.as_deref_mut(),
            self.indices.as_deref_mut(),
            &mut self.number,
            self.capacity,
        )
    }
}

/// Per-extractor scratch space for sparse fetches
pub struct SparseFetchWork<C: SparseChunk> {
    chunk: C::Workspace,
    chunk_indices: Vec<usize>,
    single: Option<SparseSingleWorkspace<C::Value>>,
}

impl<C: SparseChunk> Default for SparseFetchWork<C> {
    fn default() -> Self {
        Self {
            chunk: C::Workspace::default(),
            chunk_indices: Vec::new(),
            single: None,
        }
    }
}

impl<C: SparseChunk> ChunkCoordinator<C> {
    /// Fill `slab` with the non-zeros of chunk `chunk_id` that fall inside
    /// `selection`, reporting matrix-level non-target indices
    fn fetch_sparse_slab(
        &self,
        row: bool,
        chunk_id: usize,
        target: TargetSelection<'_>,
        selection: NonTargetSelection<'_>,
        work: &mut C::Workspace,
        chunk_indices: &mut Vec<usize>,
        mut slab: SparseSlabMut<'_, C::Value>,
    ) -> Result<()> {
        if chunk_id >= self.num_primary_chunks(row) {
            return Err(ChunkError::IndexOutOfBounds.into());
        }
        let target = if C::USE_SUBSET {
            target
        } else {
            TargetSelection::Full
        };
        slab.reset();
        self.extract_secondary(row, chunk_id, selection, chunk_indices, |chunk, piece, shift| {
            chunk.extract(row, target, piece, work, &mut slab, shift)
        })
    }

    /// Fetch the slab holding target index `i` through an LRU cache
    pub fn fetch_sparse_myopic(
        &self,
        row: bool,
        i: usize,
        selection: NonTargetSelection<'_>,
        work: &mut SparseFetchWork<C>,
        factory: &mut SparseSlabFactory<C::Value>,
        cache: &mut LruSlabCache<SparseSlab>,
    ) -> Result<(SparseSlab, usize)> {
        self.next_myopic(
            row,
            i,
            cache,
            factory,
            |f| f.create(),
            |f, id, slab| {
                self.fetch_sparse_slab(
                    row,
                    id,
                    TargetSelection::Full,
                    selection,
                    &mut work.chunk,
                    &mut work.chunk_indices,
                    f.view_mut(slab),
                )
            },
        )
    }

    /// Fetch the slab holding the oracle's next prediction
    pub fn fetch_sparse_oracular(
        &self,
        row: bool,
        selection: NonTargetSelection<'_>,
        work: &mut SparseFetchWork<C>,
        factory: &mut SparseSlabFactory<C::Value>,
        cache: &mut OracularCache<SparseSlab>,
    ) -> Result<(SparseSlab, usize)> {
        self.next_oracular(
            row,
            cache,
            factory,
            |f| f.create(),
            |f, id, slab, target| {
                self.fetch_sparse_slab(
                    row,
                    id,
                    target,
                    selection,
                    &mut work.chunk,
                    &mut work.chunk_indices,
                    f.view_mut(slab),
                )
            },
        )
    }

    /// Extract target index `i` into entry 0 of `output` without caching
    pub fn fetch_sparse_single(
        &self,
        row: bool,
        i: usize,
        selection: NonTargetSelection<'_>,
        work: &mut SparseFetchWork<C>,
        output: &mut SparseSlabMut<'_, C::Value>,
    ) -> Result<()> {
        let (chunk_id, offset) = self.locate(row, i)?;
        validate_index_count(output.capacity(), selection.len())?;
        validate_index_count(output.target_dim(), 1)?;
        output.clear(0, 1);

        let target_dim = self.primary_chunkdim(row);
        let capacity = self.secondary_chunkdim(row);
        let single = work.single.get_or_insert_with(|| {
            SparseSingleWorkspace::new(target_dim, capacity, output.needs_value(), output.needs_index())
        });
        let target = if C::USE_SUBSET {
            TargetSelection::Block {
                start: offset,
                length: 1,
            }
        } else {
            TargetSelection::Full
        };

        let chunk_work = &mut work.chunk;
        self.extract_secondary(row, chunk_id, selection, &mut work.chunk_indices, |chunk, piece, shift| {
            let mut tmp = single.view();
            tmp.reset();
            chunk.extract(row, target, piece, chunk_work, &mut tmp, shift)?;
            let count = tmp.number(offset);
            let (values, indices) = tmp.entries(offset);
            output.extend(0, values, indices, count);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chunkmat_core::{ChunkDimensionStats, FixedOracle};

    use super::*;
    use crate::chunk::{BlobSparseChunk, SparseVecBlob};

    fn value(r: usize, c: usize) -> f64 {
        if (r + 2 * c) % 3 == 0 {
            (100 * r + c + 1) as f64
        } else {
            0.0
        }
    }

    type TestChunk<const SUBSET: bool> = BlobSparseChunk<SparseVecBlob<f64>, SUBSET>;

    // 7 x 10 matrix in 3 x 4 chunks.
    fn coordinator<const SUBSET: bool>(row_major: bool, csr: bool) -> ChunkCoordinator<TestChunk<SUBSET>> {
        let rows = ChunkDimensionStats::new(7, 3);
        let cols = ChunkDimensionStats::new(10, 4);
        let mut chunks = Vec::new();
        for outer in 0..3 {
            for inner in 0..3 {
                let (rc, cc) = if row_major { (outer, inner) } else { (inner, outer) };
                let (nr, nc) = (rows.get_chunk_length(rc), cols.get_chunk_length(cc));
                let mut dense = Vec::new();
                for r in 0..nr {
                    for c in 0..nc {
                        dense.push(value(rc * 3 + r, cc * 4 + c));
                    }
                }
                chunks.push(BlobSparseChunk::new(SparseVecBlob::from_dense(nr, nc, csr, &dense).unwrap()));
            }
        }
        ChunkCoordinator::new(rows, cols, chunks, row_major).unwrap()
    }

    fn expected(row: bool, i: usize, positions: &[usize]) -> (Vec<f64>, Vec<usize>) {
        positions
            .iter()
            .map(|&j| (if row { value(i, j) } else { value(j, i) }, j))
            .filter(|&(v, _)| v != 0.0)
            .unzip()
    }

    #[test]
    fn test_myopic_rows_block() {
        for (row_major, csr) in [(true, true), (false, false), (true, false)] {
            let coord = coordinator::<false>(row_major, csr);
            let positions: Vec<usize> = (1..9).collect();
            let selection = NonTargetSelection::Block { start: 1, length: 8 };
            let mut work = SparseFetchWork::default();
            let mut factory = SparseSlabFactory::new(3, 8, 2, true, true);
            let mut cache = LruSlabCache::new(2);
            for i in [3, 0, 6, 4, 2] {
                let (slab, offset) = coord
                    .fetch_sparse_myopic(true, i, selection, &mut work, &mut factory, &mut cache)
                    .unwrap();
                let view = factory.view(slab);
                let (values, indices) = expected(true, i, &positions);
                assert_eq!(view.values(offset).unwrap(), values.as_slice());
                assert_eq!(view.indices(offset).unwrap(), indices.as_slice());
            }
        }
    }

    #[test]
    fn test_oracular_columns_index() {
        fn check<const SUBSET: bool>(csr: bool) {
            let coord = coordinator::<SUBSET>(false, csr);
            let positions = [0, 2, 3, 5, 6];
            let selection = NonTargetSelection::Index(&positions);
            let predictions = vec![9, 1, 2, 0, 8, 5, 4, 4, 7];
            let oracle = Arc::new(FixedOracle::new(predictions.clone()));
            let mut work = SparseFetchWork::default();
            let mut factory = SparseSlabFactory::new(4, positions.len(), 2, true, true);
            let mut cache = OracularCache::new(oracle, 2, SUBSET);
            for &i in &predictions {
                let (slab, offset) = coord
                    .fetch_sparse_oracular(false, selection, &mut work, &mut factory, &mut cache)
                    .unwrap();
                let view = factory.view(slab);
                let (values, indices) = expected(false, i, &positions);
                assert_eq!(view.values(offset).unwrap(), values.as_slice());
                assert_eq!(view.indices(offset).unwrap(), indices.as_slice());
            }
        }
        check::<false>(true);
        check::<true>(false);
        check::<true>(true);
    }

    #[test]
    fn test_single_without_values() {
        let coord = coordinator::<true>(true, false);
        let mut work = SparseFetchWork::default();
        let mut indices = vec![0; 10];
        let mut number = vec![0; 1];
        let mut output = SparseSlabMut::new(None, Some(&mut indices), &mut number, 10);
        for i in 0..10 {
            coord
                .fetch_sparse_single(false, i, NonTargetSelection::Block { start: 0, length: 7 }, &mut work, &mut output)
                .unwrap();
            let (values, found) = output.entries(0);
            assert!(values.is_none());
            assert_eq!(found.unwrap(), expected(false, i, &(0..7).collect::<Vec<_>>()).1.as_slice());
        }
    }

    #[test]
    fn test_single_rows() {
        let coord = coordinator::<false>(false, true);
        let mut work = SparseFetchWork::default();
        let mut values = vec![0.0; 4];
        let mut indices = vec![0; 4];
        let mut number = vec![0; 1];
        let mut output = SparseSlabMut::new(Some(&mut values), Some(&mut indices), &mut number, 4);
        let positions = [1, 4, 7, 9];
        coord
            .fetch_sparse_single(true, 5, NonTargetSelection::Index(&positions), &mut work, &mut output)
            .unwrap();
        let (found_values, found_indices) = output.entries(0);
        let (values, indices) = expected(true, 5, &positions);
        assert_eq!(found_values.unwrap(), values.as_slice());
        assert_eq!(found_indices.unwrap(), indices.as_slice());

        let result = coord.fetch_sparse_single(
            true,
            5,
            NonTargetSelection::Block { start: 0, length: 10 },
            &mut work,
            &mut output,
        );
        assert_eq!(result.err(), Some(ChunkError::InsufficientBuffer.into()));
    }
}
