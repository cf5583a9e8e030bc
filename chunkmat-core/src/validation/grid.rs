//! Chunk grid consistency checks

use crate::{ChunkDimensionStats, ChunkError};

/// Validate that the number of chunks fills the grid exactly
pub const fn validate_chunk_grid(
    row_stats: &ChunkDimensionStats,
    col_stats: &ChunkDimensionStats,
    num_chunks: usize,
) -> Result<(), ChunkError> {
    // Product is computed with overflow protection so that absurd grids
    // are reported as a mismatch rather than wrapping around.
    match row_stats.num_chunks.checked_mul(col_stats.num_chunks) {
        Some(expected) if expected == num_chunks => Ok(()),
        _ => Err(ChunkError::ChunkGridMismatch),
    }
}

/// Validate the shape of the chunk at grid position `(row_chunk, col_chunk)`
///
/// Every chunk must match the grid's chunk length, except those on the last
/// row or column of the grid, which are cut short by the matrix extent.
pub const fn validate_chunk_shape(
    row_stats: &ChunkDimensionStats,
    col_stats: &ChunkDimensionStats,
    row_chunk: usize,
    col_chunk: usize,
    chunk_nrow: usize,
    chunk_ncol: usize,
) -> Result<(), ChunkError> {
    if row_chunk >= row_stats.num_chunks || col_chunk >= col_stats.num_chunks {
        return Err(ChunkError::IndexOutOfBounds);
    }
    if chunk_nrow != row_stats.get_chunk_length(row_chunk)
        || chunk_ncol != col_stats.get_chunk_length(col_chunk)
    {
        return Err(ChunkError::ChunkDimensionMismatch);
    }
    Ok(())
}
