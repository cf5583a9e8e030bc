//! Validation of chunk grids and extraction requests
//!
//! Pure checks with no allocation, run when a matrix or extractor is built
//! so that the hot paths can index without further bounds reasoning.

pub mod grid;
pub mod selection;

pub use grid::{validate_chunk_grid, validate_chunk_shape};
pub use selection::{validate_block, validate_index_count, validate_indices};
