//! Checks for block and index selections along one dimension

use crate::ChunkError;

/// Validate that `[start, start + length)` lies within `[0, extent)`
pub const fn validate_block(start: usize, length: usize, extent: usize) -> Result<(), ChunkError> {
    match start.checked_add(length) {
        Some(end) if end <= extent => Ok(()),
        _ => Err(ChunkError::InvalidBlock),
    }
}

/// Validate that indices are strictly increasing and below `extent`
pub fn validate_indices(indices: &[usize], extent: usize) -> Result<(), ChunkError> {
    if indices.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ChunkError::UnsortedIndices);
    }
    match indices.last() {
        Some(&last) if last >= extent => Err(ChunkError::IndexOutOfBounds),
        _ => Ok(()),
    }
}

/// Validate that a caller buffer can hold `needed` elements
pub const fn validate_index_count(available: usize, needed: usize) -> Result<(), ChunkError> {
    if available < needed {
        return Err(ChunkError::InsufficientBuffer);
    }
    Ok(())
}
