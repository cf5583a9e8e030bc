//! Factory for dense slabs

use chunkmat_core::{MatrixElement, SlabCacheStats};

/// Handle to a dense slab inside a [`DenseSlabFactory`] pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DenseSlab {
    index: usize,
}

impl DenseSlab {
    /// Position of this slab in its factory's pool
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Pool of `max_slabs` dense slabs of `slab_size` elements each
///
/// Each slab is laid out as `target_dim` rows of `non_target_dim` elements.
/// The factory is deliberately not `Clone`: handles refer to its pool.
#[derive(Debug)]
pub struct DenseSlabFactory<V> {
    slab_size: usize,
    max_slabs: usize,
    created: usize,
    pool: Vec<V>,
}

impl<V: MatrixElement> DenseSlabFactory<V> {
    pub fn new(slab_size: usize, max_slabs: usize) -> Self {
        Self {
            slab_size,
            max_slabs,
            created: 0,
            pool: vec![V::zero(); slab_size * max_slabs],
        }
    }

    pub fn from_stats(stats: &SlabCacheStats) -> Self {
        Self::new(stats.slab_size_in_elements, stats.max_slabs_in_cache)
    }

    /// Designate the next unused region of the pool as a slab
    ///
    /// Must not be called more than `max_slabs` times.
    pub fn create(&mut self) -> DenseSlab {
        debug_assert!(
            self.created < self.max_slabs,
            "dense slab factory exhausted after {} slabs",
            self.max_slabs
        );
        let index = self.created;
        self.created += 1;
        DenseSlab { index }
    }

    pub fn slab_size(&self) -> usize {
        self.slab_size
    }

    pub fn max_slabs(&self) -> usize {
        self.max_slabs
    }

    /// Number of slabs handed out so far
    pub fn num_created(&self) -> usize {
        self.created
    }

    pub fn view(&self, slab: DenseSlab) -> &[V] {
        let start = slab.index * self.slab_size;
        &self.pool[start..start + self.slab_size]
    }

    pub fn view_mut(&mut self, slab: DenseSlab) -> &mut [V] {
        let start = slab.index * self.slab_size;
        &mut self.pool[start..start + self.slab_size]
    }
}
