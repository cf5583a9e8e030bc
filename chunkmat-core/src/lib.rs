#![no_std]

//! chunkmat-core - Chunk Grid Definitions for Chunked Matrices
//!
//! This crate provides the pure arithmetic and interfaces underneath the
//! `chunkmat` engine: how a dimension splits into chunks, how many slabs a
//! memory budget buys, what an oracle looks like, and how requests are
//! validated. It performs no I/O and never allocates slab memory.

extern crate alloc;

pub mod cache_stats;
pub mod dimension;
pub mod error;
pub mod traits;
pub mod validation;

pub use cache_stats::SlabCacheStats;
pub use dimension::{integer_ceil, ChunkDimensionStats};
pub use error::*;
pub use traits::*;
pub use validation::*;
