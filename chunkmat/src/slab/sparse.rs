//! Factory for sparse slabs

use chunkmat_core::{MatrixElement, SlabCacheStats};

/// Handle to a sparse slab inside a [`SparseSlabFactory`] pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SparseSlab {
    index: usize,
}

impl SparseSlab {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Pools for the values, indices and counts of `max_slabs` sparse slabs
///
/// Every target element of a slab owns `non_target_dim` slots in the value
/// and index pools. The value or index pool is absent when the caller did
/// not ask for it, while the counts are always present.
#[derive(Debug)]
pub struct SparseSlabFactory<V> {
    target_dim: usize,
    non_target_dim: usize,
    slab_size: usize,
    max_slabs: usize,
    created: usize,
    value_pool: Option<Vec<V>>,
    index_pool: Option<Vec<usize>>,
    number_pool: Vec<usize>,
}

impl<V: MatrixElement> SparseSlabFactory<V> {
    pub fn new(
        target_dim: usize,
        non_target_dim: usize,
        max_slabs: usize,
        needs_value: bool,
        needs_index: bool,
    ) -> Self {
        let slab_size = target_dim * non_target_dim;
        let total = slab_size * max_slabs;
        Self {
            target_dim,
            non_target_dim,
            slab_size,
            max_slabs,
            created: 0,
            value_pool: needs_value.then(|| vec![V::zero(); total]),
            index_pool: needs_index.then(|| vec![0; total]),
            number_pool: vec![0; target_dim * max_slabs],
        }
    }

    pub fn from_stats(
        target_dim: usize,
        non_target_dim: usize,
        stats: &SlabCacheStats,
        needs_value: bool,
        needs_index: bool,
    ) -> Self {
        Self::new(
            target_dim,
            non_target_dim,
            stats.max_slabs_in_cache,
            needs_value,
            needs_index,
        )
    }

    /// Designate the next unused region of each pool as a slab
    ///
    /// Counts of a fresh slab are zero. Must not be called more than
    /// `max_slabs` times.
    pub fn create(&mut self) -> SparseSlab {
        debug_assert!(
            self.created < self.max_slabs,
            "sparse slab factory exhausted after {} slabs",
            self.max_slabs
        );
        let index = self.created;
        self.created += 1;
        SparseSlab { index }
    }

    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    pub fn non_target_dim(&self) -> usize {
        self.non_target_dim
    }

    pub fn max_slabs(&self) -> usize {
        self.max_slabs
    }

    pub fn num_created(&self) -> usize {
        self.created
    }

    pub fn needs_value(&self) -> bool {
        self.value_pool.is_some()
    }

    pub fn needs_index(&self) -> bool {
        self.index_pool.is_some()
    }

    pub fn view(&self, slab: SparseSlab) -> SparseSlabRef<'_, V> {
        let start = slab.index * self.slab_size;
        let nstart = slab.index * self.target_dim;
        SparseSlabRef {
            values: self
                .value_pool
                .as_deref()
                .map(|pool| &pool[start..start + self.slab_size]),
            indices: self
                .index_pool
                .as_deref()
                .map(|pool| &pool[start..start + self.slab_size]),
            number: &self.number_pool[nstart..nstart + self.target_dim],
            capacity: self.non_target_dim,
        }
    }

    pub fn view_mut(&mut self, slab: SparseSlab) -> SparseSlabMut<'_, V> {
        let start = slab.index * self.slab_size;
        let nstart = slab.index * self.target_dim;
        let size = self.slab_size;
        SparseSlabMut {
            values: self
                .value_pool
                .as_deref_mut()
                .map(|pool| &mut pool[start..start + size]),
            indices: self
                .index_pool
                .as_deref_mut()
                .map(|pool| &mut pool[start..start + size]),
            number: &mut self.number_pool[nstart..nstart + self.target_dim],
            capacity: self.non_target_dim,
        }
    }
}

/// Read-only view of one sparse slab
#[derive(Debug, Clone, Copy)]
pub struct SparseSlabRef<'a, V> {
    values: Option<&'a [V]>,
    indices: Option<&'a [usize]>,
    number: &'a [usize],
    capacity: usize,
}

impl<'a, V> SparseSlabRef<'a, V> {
    /// Number of filled entries for target element `p`
    pub fn number(&self, p: usize) -> usize {
        self.number[p]
    }

    /// Filled values for target element `p`, if values are stored
    pub fn values(&self, p: usize) -> Option<&'a [V]> {
        let start = p * self.capacity;
        let n = self.number[p];
        self.values.map(|v| &v[start..start + n])
    }

    /// Filled indices for target element `p`, if indices are stored
    pub fn indices(&self, p: usize) -> Option<&'a [usize]> {
        let start = p * self.capacity;
        let n = self.number[p];
        self.indices.map(|v| &v[start..start + n])
    }
}

/// Writable view of a sparse slab, or of any buffer shaped like one
///
/// Chunks append structural non-zeros through [`SparseSlabMut::push`].
#[derive(Debug)]
pub struct SparseSlabMut<'a, V> {
    values: Option<&'a mut [V]>,
    indices: Option<&'a mut [usize]>,
    number: &'a mut [usize],
    capacity: usize,
}

impl<'a, V: Copy> SparseSlabMut<'a, V> {
    /// Wrap caller-owned buffers holding `number.len()` target elements of
    /// `capacity` slots each
    pub fn new(
        values: Option<&'a mut [V]>,
        indices: Option<&'a mut [usize]>,
        number: &'a mut [usize],
        capacity: usize,
    ) -> Self {
        Self {
            values,
            indices,
            number,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn needs_value(&self) -> bool {
        self.values.is_some()
    }

    pub fn needs_index(&self) -> bool {
        self.indices.is_some()
    }

    pub fn number(&self, p: usize) -> usize {
        self.number[p]
    }

    /// Number of target elements covered by this view
    pub fn target_dim(&self) -> usize {
        self.number.len()
    }

    /// Reset the counts of target elements `[start, start + length)`
    pub fn clear(&mut self, start: usize, length: usize) {
        self.number[start..start + length].fill(0);
    }

    /// Reset the counts of every target element
    pub fn reset(&mut self) {
        self.number.fill(0);
    }

    /// Append a structural non-zero to target element `p`
    #[inline]
    pub fn push(&mut self, p: usize, value: V, index: usize) {
        let slot = p * self.capacity + self.number[p];
        if let Some(values) = self.values.as_deref_mut() {
            values[slot] = value;
        }
        if let Some(indices) = self.indices.as_deref_mut() {
            indices[slot] = index;
        }
        self.number[p] += 1;
    }

    /// Append `count` entries to target element `p`, copying whichever of
    /// `values` and `indices` this view stores
    pub fn extend(&mut self, p: usize, values: Option<&[V]>, indices: Option<&[usize]>, count: usize) {
        let slot = p * self.capacity + self.number[p];
        if let (Some(dest), Some(src)) = (self.values.as_deref_mut(), values) {
            dest[slot..slot + count].copy_from_slice(&src[..count]);
        }
        if let (Some(dest), Some(src)) = (self.indices.as_deref_mut(), indices) {
            dest[slot..slot + count].copy_from_slice(&src[..count]);
        }
        self.number[p] += count;
    }

    /// Read back the filled entries of target element `p`
    pub fn entries(&self, p: usize) -> (Option<&[V]>, Option<&[usize]>) {
        let start = p * self.capacity;
        let n = self.number[p];
        (
            self.values.as_deref().map(|v| &v[start..start + n]),
            self.indices.as_deref().map(|v| &v[start..start + n]),
        )
    }
}
