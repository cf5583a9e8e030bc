//! Error types for chunked matrix operations

/// Errors that can occur while building or reading a chunked matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkError {
    /// Number of chunks disagrees with the chunk grid
    ChunkGridMismatch,
    /// Index out of bounds
    IndexOutOfBounds,
    /// Block extends past the end of its dimension
    InvalidBlock,
    /// Indices are not strictly increasing
    UnsortedIndices,
    /// Chunk reported a shape that disagrees with the grid
    ChunkDimensionMismatch,
    /// Insufficient buffer space
    InsufficientBuffer,
    /// Chunk payload could not be decoded
    InvalidChunkData,
    /// Cache or oracle used outside of its contract
    CacheMisuse,
}

impl core::fmt::Display for ChunkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            ChunkError::ChunkGridMismatch => {
                "length of 'chunks' should be equal to the product of the number of chunks along each row and column"
            }
            ChunkError::IndexOutOfBounds => "Index out of bounds",
            ChunkError::InvalidBlock => "Block extends past the end of the dimension",
            ChunkError::UnsortedIndices => "Indices should be sorted and unique",
            ChunkError::ChunkDimensionMismatch => "Chunk dimensions do not match the chunk grid",
            ChunkError::InsufficientBuffer => "Insufficient buffer space",
            ChunkError::InvalidChunkData => "Invalid chunk data",
            ChunkError::CacheMisuse => "Slab cache used outside of its contract",
        };
        write!(f, "{msg}")
    }
}

/// Result type for chunked matrix operations
pub type Result<T> = core::result::Result<T, ChunkError>;
