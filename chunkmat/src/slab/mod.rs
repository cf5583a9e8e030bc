//! Slab factories
//!
//! A factory allocates one pool sized for `max_slabs` slabs when it is built
//! and hands out lightweight handles into that pool. Handles are plain
//! indices, so caches holding them can be moved freely.

pub mod dense;
pub mod sparse;

pub use dense::{DenseSlab, DenseSlabFactory};
pub use sparse::{SparseSlab, SparseSlabFactory, SparseSlabMut, SparseSlabRef};
