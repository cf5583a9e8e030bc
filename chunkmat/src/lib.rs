//! chunkmat - Chunked Matrix Access with Slab Caching
//!
//! This library reads rows and columns out of matrices that are stored as a
//! grid of chunks, where a chunk can only be read by materializing it. Each
//! extractor keeps a small cache of *slabs* (the part of one chunk row or
//! column that the caller asked for) so that consecutive requests do not
//! re-inflate the same chunks.
//!
//! ## Architecture
//!
//! - **chunkmat-core**: grid arithmetic, cache sizing, oracles and
//!   validation (no I/O, `no_std`)
//! - **chunkmat**: slab factories, slab caches, the chunk coordinator, the
//!   dense and sparse matrix facades, statistics and parallel helpers
//!
//! ## Quick Start
//!
//! ```rust
//! use chunkmat::{
//!     ChunkedDenseMatrix, ChunkedMatrixOptions, DenseVecBlob, ExtractOptions, Matrix, Selection,
//!     SimpleDenseChunk, StatsOptions,
//! };
//!
//! fn example() -> chunkmat::Result<()> {
//!     // A 2x4 matrix stored as two 2x2 chunks.
//!     let chunks = vec![
//!         SimpleDenseChunk::new(DenseVecBlob::new(2, 2, true, vec![1.0, 2.0, 5.0, 6.0])?),
//!         SimpleDenseChunk::new(DenseVecBlob::new(2, 2, true, vec![3.0, 4.0, 7.0, 8.0])?),
//!     ];
//!     let options = ChunkedMatrixOptions::default().with_maximum_cache_size(1 << 20);
//!     let matrix = ChunkedDenseMatrix::new(2, 4, 2, 2, chunks, true, &options)?;
//!
//!     let mut ext = matrix.dense(true, Selection::Block { start: 1, length: 2 }, &ExtractOptions::default())?;
//!     let mut buffer = vec![0.0; 2];
//!     assert_eq!(ext.fetch(1, &mut buffer)?, &[6.0, 7.0]);
//!
//!     let sums = chunkmat::stats::sums::by_column(&matrix, &StatsOptions::default())?;
//!     assert_eq!(sums, vec![6.0, 8.0, 10.0, 12.0]);
//!     Ok(())
//! }
//! # example().unwrap();
//! ```
//!
//! ## Features
//!
//! - **Cache selection**: extractors run without a cache, with an LRU cache,
//!   or with an oracle-driven cache, depending on the memory budget and on
//!   whether the access pattern is known in advance
//! - **Target subsets**: chunks that can read a subset of their rows or
//!   columns are only asked for the predicted ones
//! - **Statistics**: sums, variances, ranges, counts and medians, grouped or
//!   not, in a single pass over the preferred dimension
//! - **Parallelism**: [`parallelize`] over rayon, and
//!   [`parallelize_with_executor`] for chunks that must be read from the
//!   calling thread

// Re-export core abstractions
pub use chunkmat_core::{
    // Grid arithmetic
    integer_ceil, ChunkDimensionStats, SlabCacheStats,
    // Element and oracle traits
    ConsecutiveOracle, FixedOracle, MatrixElement, Oracle,
    // Error handling
    ChunkError,
};

// Implementation modules
pub mod cache;
pub mod chunk;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod matrix;
pub mod parallel;
pub mod slab;
pub mod stats;

// Public exports
pub use cache::{
    LruSlabCache, OracularSlabCache, OracularSubsettedSlabCache, OracularVariableSlabCache, SelectionDetails,
    SelectionType,
};
pub use chunk::{
    BlobDenseChunk, BlobSparseChunk, Chunk, DenseBlob, DenseBytesBlob, DenseChunk, DenseVecBlob,
    NonTargetSelection, SimpleDenseChunk, SimpleSparseChunk, SparseBlob, SparseChunk, SparseVecBlob,
    SubsettedDenseChunk, SubsettedSparseChunk, TargetSelection,
};
pub use config::{ChunkedMatrixOptions, ExtractOptions, StatsOptions};
pub use coordinator::ChunkCoordinator;
pub use error::{Error, Result};
pub use executor::{parallelize_with_executor, MainThreadExecutor};
pub use matrix::{
    ChunkedDenseMatrix, ChunkedSparseMatrix, DenseExtractor, Matrix, Selection, SparseExtractor, SparseRange,
};
pub use parallel::parallelize;
pub use slab::{DenseSlab, DenseSlabFactory, SparseSlab, SparseSlabFactory, SparseSlabMut, SparseSlabRef};
