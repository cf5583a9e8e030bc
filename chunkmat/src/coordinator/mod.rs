//! Translation of row and column requests into per-chunk extractions
//!
//! The coordinator owns the chunk grid. For a slab along the target
//! dimension it walks the chunks that intersect the non-target selection,
//! clipping the selection to each chunk and handing the clipped piece to
//! the chunk. Dense and sparse fetches live in their own submodules.

pub mod dense;
pub mod sparse;

use std::sync::Arc;

use chunkmat_core::{validate_chunk_grid, validate_chunk_shape, ChunkDimensionStats, ChunkError, Oracle};

use crate::cache::{
    LruSlabCache, OracularSlabCache, OracularSubsettedSlabCache, SelectionDetails, SelectionType,
};
use crate::chunk::{Chunk, NonTargetSelection, TargetSelection};
use crate::error::{Error, Result};

pub use sparse::SparseSingleWorkspace;

/// Oracular cache matching the chunk's support for target subsets
pub enum OracularCache<S> {
    Plain(OracularSlabCache<S>),
    Subsetted(OracularSubsettedSlabCache<S>),
}

impl<S> OracularCache<S> {
    pub fn new(oracle: Arc<dyn Oracle>, max_slabs: usize, use_subset: bool) -> Self {
        if use_subset {
            OracularCache::Subsetted(OracularSubsettedSlabCache::new(oracle, max_slabs))
        } else {
            OracularCache::Plain(OracularSlabCache::new(oracle, max_slabs))
        }
    }
}

impl<S> OracularCache<S> {
    pub fn num_slabs(&self) -> usize {
        match self {
            OracularCache::Plain(cache) => cache.num_slabs(),
            OracularCache::Subsetted(cache) => cache.num_slabs(),
        }
    }
}

fn target_from_details(details: &SelectionDetails) -> TargetSelection<'_> {
    match details.selection() {
        SelectionType::Full => TargetSelection::Full,
        SelectionType::Block => TargetSelection::Block {
            start: details.block_start(),
            length: details.block_length(),
        },
        SelectionType::Index => TargetSelection::Index(details.indices()),
    }
}

/// Grid of chunks stored in row-major or column-major order
#[derive(Debug, Clone)]
pub struct ChunkCoordinator<C> {
    row_stats: ChunkDimensionStats,
    col_stats: ChunkDimensionStats,
    chunks: Vec<C>,
    row_major: bool,
}

impl<C: Chunk> ChunkCoordinator<C> {
    /// Build a coordinator, checking that the chunks tile the grid exactly
    pub fn new(
        row_stats: ChunkDimensionStats,
        col_stats: ChunkDimensionStats,
        chunks: Vec<C>,
        row_major: bool,
    ) -> Result<Self> {
        validate_chunk_grid(&row_stats, &col_stats, chunks.len())?;
        if [&row_stats, &col_stats]
            .iter()
            .any(|stats| stats.chunk_length == 0 && stats.dimension_extent > 0)
        {
            return Err(ChunkError::ChunkDimensionMismatch.into());
        }
        for (k, chunk) in chunks.iter().enumerate() {
            let (r, c) = if row_major {
                (k / col_stats.num_chunks, k % col_stats.num_chunks)
            } else {
                (k % row_stats.num_chunks, k / row_stats.num_chunks)
            };
            validate_chunk_shape(&row_stats, &col_stats, r, c, chunk.nrow(), chunk.ncol())?;
        }
        Ok(Self {
            row_stats,
            col_stats,
            chunks,
            row_major,
        })
    }
}

impl<C> ChunkCoordinator<C> {
    // The number of chunks along a row is the number of column chunks.
    pub fn num_chunks_per_row(&self) -> usize {
        self.col_stats.num_chunks
    }

    pub fn num_chunks_per_column(&self) -> usize {
        self.row_stats.num_chunks
    }

    pub fn nrow(&self) -> usize {
        self.row_stats.dimension_extent
    }

    pub fn ncol(&self) -> usize {
        self.col_stats.dimension_extent
    }

    pub fn chunk_nrow(&self) -> usize {
        self.row_stats.chunk_length
    }

    pub fn chunk_ncol(&self) -> usize {
        self.col_stats.chunk_length
    }

    /// Rows are preferred when a row visits fewer chunks than a column
    pub fn prefer_rows(&self) -> bool {
        self.num_chunks_per_column() > self.num_chunks_per_row()
    }

    pub fn primary_dim(&self, row: bool) -> usize {
        if row {
            self.nrow()
        } else {
            self.ncol()
        }
    }

    pub fn secondary_dim(&self, row: bool) -> usize {
        if row {
            self.ncol()
        } else {
            self.nrow()
        }
    }

    pub fn primary_chunkdim(&self, row: bool) -> usize {
        if row {
            self.row_stats.chunk_length
        } else {
            self.col_stats.chunk_length
        }
    }

    pub fn secondary_chunkdim(&self, row: bool) -> usize {
        if row {
            self.col_stats.chunk_length
        } else {
            self.row_stats.chunk_length
        }
    }

    /// Target length of chunk `chunk_id`, accounting for the shorter last chunk
    pub fn primary_chunk_length(&self, row: bool, chunk_id: usize) -> usize {
        if row {
            self.row_stats.get_chunk_length(chunk_id)
        } else {
            self.col_stats.get_chunk_length(chunk_id)
        }
    }

    /// Number of slabs along the target dimension
    pub fn num_primary_chunks(&self, row: bool) -> usize {
        if row {
            self.row_stats.num_chunks
        } else {
            self.col_stats.num_chunks
        }
    }

    /// Split target index `i` into its chunk and the offset inside it
    pub fn locate(&self, row: bool, i: usize) -> Result<(usize, usize)> {
        if i >= self.primary_dim(row) {
            return Err(ChunkError::IndexOutOfBounds.into());
        }
        let chunkdim = self.primary_chunkdim(row);
        Ok((i / chunkdim, i % chunkdim))
    }

    /// Look up the slab holding target index `i` in an LRU cache
    pub(crate) fn next_myopic<S, F, Cr, P>(
        &self,
        row: bool,
        i: usize,
        cache: &mut LruSlabCache<S>,
        factory: &mut F,
        create: Cr,
        populate: P,
    ) -> Result<(S, usize)>
    where
        S: Copy,
        Cr: FnOnce(&mut F) -> S,
        P: FnOnce(&mut F, usize, S) -> Result<()>,
    {
        let (chunk_id, offset) = self.locate(row, i)?;
        let slab = *cache.find(chunk_id, factory, create, |f, id, slab: &mut S| {
            populate(f, id, *slab)
        })?;
        Ok((slab, offset))
    }

    /// Fetch the slab holding the oracle's next prediction
    ///
    /// `populate` fills one slab for a chunk, restricted to the given target
    /// positions.
    pub(crate) fn next_oracular<S, F, Cr, P>(
        &self,
        row: bool,
        cache: &mut OracularCache<S>,
        factory: &mut F,
        mut create: Cr,
        mut populate: P,
    ) -> Result<(S, usize)>
    where
        S: Copy,
        Cr: FnMut(&mut F) -> S,
        P: FnMut(&mut F, usize, S, TargetSelection<'_>) -> Result<()>,
    {
        let extent = self.primary_dim(row);
        let chunkdim = self.primary_chunkdim(row).max(1);
        let mut out_of_range = false;
        let identify = |i: usize| {
            out_of_range |= i >= extent;
            (i / chunkdim, i % chunkdim)
        };

        let fetched = match cache {
            OracularCache::Plain(cache) => cache
                .next(factory, identify, &mut create, |f, slabs| {
                    for (id, slab) in slabs.iter_mut() {
                        populate(f, *id, **slab, TargetSelection::Full)?;
                    }
                    Ok::<(), Error>(())
                })
                .map(|(slab, offset)| (*slab, offset)),
            OracularCache::Subsetted(cache) => cache
                .next(factory, identify, &mut create, |f, slabs| {
                    for (id, slab, details) in slabs.iter_mut() {
                        populate(f, *id, **slab, target_from_details(*details))?;
                    }
                    Ok::<(), Error>(())
                })
                .map(|(slab, offset)| (*slab, offset)),
        };
        let fetched = fetched?;
        if out_of_range {
            return Err(ChunkError::IndexOutOfBounds.into());
        }
        Ok(fetched)
    }

    /// Position in the chunk array of the first chunk of slab `chunk_id`,
    /// and the step to the next chunk along the non-target dimension
    fn offset_and_increment(&self, row: bool, chunk_id: usize) -> (usize, usize) {
        let num_chunks = if self.row_major {
            self.num_chunks_per_row()
        } else {
            self.num_chunks_per_column()
        };
        if row == self.row_major {
            (chunk_id * num_chunks, 1)
        } else {
            (chunk_id, num_chunks)
        }
    }

    /// Walk the chunks of slab `chunk_id` that intersect `selection`
    ///
    /// `extract` receives each chunk with the chunk-local piece of the
    /// selection and the non-target position at which the chunk starts.
    pub(crate) fn extract_secondary<F>(
        &self,
        row: bool,
        chunk_id: usize,
        selection: NonTargetSelection<'_>,
        chunk_indices: &mut Vec<usize>,
        extract: F,
    ) -> Result<()>
    where
        F: FnMut(&C, NonTargetSelection<'_>, usize) -> Result<()>,
    {
        match selection {
            NonTargetSelection::Block { start, length } => {
                self.extract_secondary_block(row, chunk_id, start, length, extract)
            }
            NonTargetSelection::Index(indices) => {
                self.extract_secondary_index(row, chunk_id, indices, chunk_indices, extract)
            }
        }
    }

    fn extract_secondary_block<F>(
        &self,
        row: bool,
        chunk_id: usize,
        block_start: usize,
        block_length: usize,
        mut extract: F,
    ) -> Result<()>
    where
        F: FnMut(&C, NonTargetSelection<'_>, usize) -> Result<()>,
    {
        if block_length == 0 {
            return Ok(());
        }
        let chunkdim = self.secondary_chunkdim(row);
        let start_chunk = block_start / chunkdim;
        let block_end = block_start + block_length;
        let end_chunk = chunkmat_core::integer_ceil(block_end, chunkdim);
        let mut secondary_start_pos = start_chunk * chunkdim;

        let (offset, increment) = self.offset_and_increment(row, chunk_id);
        let mut offset = offset + increment * start_chunk;

        for c in start_chunk..end_chunk {
            let from = if c == start_chunk {
                block_start - secondary_start_pos
            } else {
                0
            };
            let to = if c + 1 == end_chunk {
                block_end - secondary_start_pos
            } else {
                chunkdim
            };
            extract(
                &self.chunks[offset],
                NonTargetSelection::Block {
                    start: from,
                    length: to - from,
                },
                secondary_start_pos,
            )?;
            // Adding `to` lands on either the next chunk or the block end.
            secondary_start_pos += to;
            offset += increment;
        }
        Ok(())
    }

    fn extract_secondary_index<F>(
        &self,
        row: bool,
        chunk_id: usize,
        indices: &[usize],
        chunk_indices: &mut Vec<usize>,
        mut extract: F,
    ) -> Result<()>
    where
        F: FnMut(&C, NonTargetSelection<'_>, usize) -> Result<()>,
    {
        let Some(&first) = indices.first() else {
            return Ok(());
        };
        let chunkdim = self.secondary_chunkdim(row);
        let start_chunk = first / chunkdim;
        let mut secondary_start_pos = start_chunk * chunkdim;

        let (offset, increment) = self.offset_and_increment(row, chunk_id);
        let mut offset = offset + increment * start_chunk;

        let secondary_dim = self.secondary_dim(row);
        let mut remaining = indices;
        while !remaining.is_empty() {
            let secondary_end_pos = (secondary_dim - secondary_start_pos).min(chunkdim) + secondary_start_pos;
            let count = remaining.partition_point(|&i| i < secondary_end_pos);
            if count > 0 {
                chunk_indices.clear();
                chunk_indices.extend(remaining[..count].iter().map(|&i| i - secondary_start_pos));
                extract(
                    &self.chunks[offset],
                    NonTargetSelection::Index(chunk_indices),
                    secondary_start_pos,
                )?;
                remaining = &remaining[count..];
            }
            secondary_start_pos = secondary_end_pos;
            offset += increment;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tile {
        name: (usize, usize),
        nrow: usize,
        ncol: usize,
    }

    impl Chunk for Tile {
        fn nrow(&self) -> usize {
            self.nrow
        }

        fn ncol(&self) -> usize {
            self.ncol
        }
    }

    // 7 x 10 matrix in 3 x 4 chunks, so a 3 x 3 grid.
    fn grid(row_major: bool) -> ChunkCoordinator<Tile> {
        let rows = ChunkDimensionStats::new(7, 3);
        let cols = ChunkDimensionStats::new(10, 4);
        let mut chunks = Vec::new();
        for outer in 0..3 {
            for inner in 0..3 {
                let (r, c) = if row_major { (outer, inner) } else { (inner, outer) };
                chunks.push(Tile {
                    name: (r, c),
                    nrow: rows.get_chunk_length(r),
                    ncol: cols.get_chunk_length(c),
                });
            }
        }
        ChunkCoordinator::new(rows, cols, chunks, row_major).unwrap()
    }

    type Visit = ((usize, usize), Vec<usize>, usize);

    fn walk(coord: &ChunkCoordinator<Tile>, row: bool, id: usize, selection: NonTargetSelection<'_>) -> Vec<Visit> {
        let mut visits = Vec::new();
        let mut buffer = Vec::new();
        coord
            .extract_secondary(row, id, selection, &mut buffer, |chunk, piece, pos| {
                let local = match piece {
                    NonTargetSelection::Block { start, length } => (start..start + length).collect(),
                    NonTargetSelection::Index(indices) => indices.to_vec(),
                };
                visits.push((chunk.name, local, pos));
                Ok(())
            })
            .unwrap();
        visits
    }

    #[test]
    fn test_block_walk() {
        for row_major in [true, false] {
            let coord = grid(row_major);
            let visits = walk(&coord, true, 1, NonTargetSelection::Block { start: 3, length: 6 });
            assert_eq!(
                visits,
                vec![((1, 0), vec![3], 0), ((1, 1), vec![0, 1, 2, 3], 4), ((1, 2), vec![0], 8)]
            );

            let visits = walk(&coord, false, 2, NonTargetSelection::Block { start: 0, length: 7 });
            assert_eq!(
                visits,
                vec![
                    ((0, 2), vec![0, 1, 2], 0),
                    ((1, 2), vec![0, 1, 2], 3),
                    ((2, 2), vec![0], 6)
                ]
            );
        }
    }

    #[test]
    fn test_index_walk() {
        for row_major in [true, false] {
            let coord = grid(row_major);
            let visits = walk(&coord, true, 2, NonTargetSelection::Index(&[1, 2, 9]));
            assert_eq!(visits, vec![((2, 0), vec![1, 2], 0), ((2, 2), vec![1], 8)]);

            let visits = walk(&coord, false, 0, NonTargetSelection::Index(&[6]));
            assert_eq!(visits, vec![((2, 0), vec![0], 6)]);
        }
    }

    #[test]
    fn test_empty_selections() {
        let coord = grid(true);
        assert!(walk(&coord, true, 0, NonTargetSelection::Block { start: 10, length: 0 }).is_empty());
        assert!(walk(&coord, true, 0, NonTargetSelection::Index(&[])).is_empty());
    }

    #[test]
    fn test_grid_validation() {
        let rows = ChunkDimensionStats::new(7, 3);
        let cols = ChunkDimensionStats::new(10, 4);
        let result = ChunkCoordinator::<Tile>::new(rows, cols, Vec::new(), true);
        assert_eq!(result.err(), Some(ChunkError::ChunkGridMismatch.into()));

        let mut coord = grid(true);
        coord.chunks[8].nrow = 3;
        let result = ChunkCoordinator::new(rows, cols, coord.chunks, true);
        assert_eq!(result.err(), Some(ChunkError::ChunkDimensionMismatch.into()));
    }

    #[test]
    fn test_geometry() {
        let coord = grid(false);
        assert_eq!(coord.locate(true, 5).unwrap(), (1, 2));
        assert_eq!(coord.locate(false, 9).unwrap(), (2, 1));
        assert!(coord.locate(true, 7).is_err());
        assert_eq!(coord.primary_chunk_length(true, 2), 1);
        assert!(!coord.prefer_rows());
    }
}
