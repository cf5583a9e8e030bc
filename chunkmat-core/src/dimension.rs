//! Partitioning of one matrix dimension into equal-length chunks

/// Integer ceiling of `left / right`, or zero when `right` is zero
pub const fn integer_ceil(left: usize, right: usize) -> usize {
    if right == 0 {
        return 0;
    }
    // Avoids the overflow of `left + right - 1`.
    left / right + (left % right > 0) as usize
}

/// Chunking statistics for one dimension
///
/// Every chunk has length `chunk_length` except possibly the last, which
/// holds whatever remains of `dimension_extent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkDimensionStats {
    /// Total length of this dimension
    pub dimension_extent: usize,
    /// Length of every chunk but the last
    pub chunk_length: usize,
    /// Number of chunks along this dimension
    pub num_chunks: usize,
    /// Length of the final chunk
    pub last_chunk_length: usize,
}

impl ChunkDimensionStats {
    pub const fn new(dimension_extent: usize, chunk_length: usize) -> Self {
        let num_chunks = integer_ceil(dimension_extent, chunk_length);
        let last_chunk_length = if num_chunks > 0 {
            dimension_extent - (num_chunks - 1) * chunk_length
        } else {
            0
        };
        Self {
            dimension_extent,
            chunk_length,
            num_chunks,
            last_chunk_length,
        }
    }

    /// Length of chunk `i`, or zero for a chunk past the end
    pub const fn get_chunk_length(&self, i: usize) -> usize {
        if i >= self.num_chunks {
            0
        } else if i + 1 == self.num_chunks {
            self.last_chunk_length
        } else {
            self.chunk_length
        }
    }

    /// Start position of chunk `i` along this dimension
    pub const fn chunk_start(&self, i: usize) -> usize {
        i * self.chunk_length
    }

    /// Chunk holding position `pos`, with the offset of `pos` inside it
    pub const fn locate(&self, pos: usize) -> (usize, usize) {
        (pos / self.chunk_length, pos % self.chunk_length)
    }
}
