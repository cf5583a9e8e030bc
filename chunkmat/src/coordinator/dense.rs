//! Dense slab population

use chunkmat_core::{validate_index_count, ChunkError, MatrixElement};

use super::{ChunkCoordinator, OracularCache};
use crate::cache::LruSlabCache;
use crate::chunk::{DenseChunk, NonTargetSelection, TargetSelection};
use crate::error::Result;
use crate::slab::{DenseSlab, DenseSlabFactory};

/// Per-extractor scratch space for dense fetches
pub struct DenseFetchWork<C: DenseChunk> {
    chunk: C::Workspace,
    chunk_indices: Vec<usize>,
    single: Vec<C::Value>,
}

impl<C: DenseChunk> Default for DenseFetchWork<C> {
    fn default() -> Self {
        Self {
            chunk: C::Workspace::default(),
            chunk_indices: Vec::new(),
            single: Vec::new(),
        }
    }
}

impl<C: DenseChunk> ChunkCoordinator<C> {
    /// Fill `slab` with every target position of chunk `chunk_id`, restricted
    /// to `selection` along the non-target dimension
    ///
    /// Target position `p` occupies `slab[p * len..(p + 1) * len]` where `len`
    /// is the selection length.
    fn fetch_dense_slab(
        &self,
        row: bool,
        chunk_id: usize,
        target: TargetSelection<'_>,
        selection: NonTargetSelection<'_>,
        work: &mut C::Workspace,
        chunk_indices: &mut Vec<usize>,
        slab: &mut [C::Value],
    ) -> Result<()> {
        if chunk_id >= self.num_primary_chunks(row) {
            return Err(ChunkError::IndexOutOfBounds.into());
        }
        let target = if C::USE_SUBSET {
            target
        } else {
            TargetSelection::Full
        };
        let stride = selection.len();
        let mut filled = 0;
        self.extract_secondary(row, chunk_id, selection, chunk_indices, |chunk, piece, _| {
            chunk.extract(row, target, piece, work, &mut slab[filled..], stride)?;
            filled += piece.len();
            Ok(())
        })
    }

    /// Fetch the slab holding target index `i` through an LRU cache
    ///
    /// Returns the slab and the position of `i` inside it.
    pub fn fetch_dense_myopic(
        &self,
        row: bool,
        i: usize,
        selection: NonTargetSelection<'_>,
        work: &mut DenseFetchWork<C>,
        factory: &mut DenseSlabFactory<C::Value>,
        cache: &mut LruSlabCache<DenseSlab>,
    ) -> Result<(DenseSlab, usize)> {
        self.next_myopic(
            row,
            i,
            cache,
            factory,
            |f| f.create(),
            |f, id, slab| {
                self.fetch_dense_slab(
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
    pub fn fetch_dense_oracular(
        &self,
        row: bool,
        selection: NonTargetSelection<'_>,
        work: &mut DenseFetchWork<C>,
        factory: &mut DenseSlabFactory<C::Value>,
        cache: &mut OracularCache<DenseSlab>,
    ) -> Result<(DenseSlab, usize)> {
        self.next_oracular(
            row,
            cache,
            factory,
            |f| f.create(),
            |f, id, slab, target| {
                self.fetch_dense_slab(
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

    /// Extract target index `i` straight into `output` without caching
    pub fn fetch_dense_single(
        &self,
        row: bool,
        i: usize,
        selection: NonTargetSelection<'_>,
        work: &mut DenseFetchWork<C>,
        output: &mut [C::Value],
    ) -> Result<()> {
        let (chunk_id, offset) = self.locate(row, i)?;
        validate_index_count(output.len(), selection.len())?;

        let needed = self.primary_chunkdim(row) * self.secondary_chunkdim(row);
        if work.single.len() < needed {
            work.single.resize(needed, C::Value::zero());
        }
        let target = if C::USE_SUBSET {
            TargetSelection::Block {
                start: offset,
                length: 1,
            }
        } else {
            TargetSelection::Full
        };

        let DenseFetchWork {
            chunk: chunk_work,
            chunk_indices,
            single,
        } = work;
        let mut filled = 0;
        self.extract_secondary(row, chunk_id, selection, chunk_indices, |chunk, piece, _| {
            let len = piece.len();
            chunk.extract(row, target, piece, chunk_work, single, len)?;
            let start = offset * len;
            output[filled..filled + len].copy_from_slice(&single[start..start + len]);
            filled += len;
            Ok(())
        })
    }
}
