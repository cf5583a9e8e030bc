//! Oracle-aware slab cache that records which target positions are needed

use std::sync::Arc;

use chunkmat_core::{ChunkError, Oracle};
use hashbrown::HashMap;

/// Shape of the target positions needed from a slab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionType {
    Full,
    Block,
    Index,
}

/// Target positions of a slab that will be read within a horizon
///
/// Starts as a one-element block, grows while requests stay contiguous,
/// and is promoted to an index list otherwise. A slab that may be needed
/// beyond the next horizon is marked [`SelectionType::Full`].
#[derive(Debug, Clone)]
pub struct SelectionDetails {
    selection: SelectionType,
    block_start: usize,
    block_end: usize,
    indices: Vec<usize>,
    mapping: HashMap<usize, usize>,
}

impl Default for SelectionDetails {
    fn default() -> Self {
        Self {
            selection: SelectionType::Full,
            block_start: 0,
            block_end: 0,
            indices: Vec::new(),
            mapping: HashMap::new(),
        }
    }
}

impl SelectionDetails {
    pub fn selection(&self) -> SelectionType {
        self.selection
    }

    pub fn block_start(&self) -> usize {
        self.block_start
    }

    pub fn block_length(&self) -> usize {
        self.block_end - self.block_start
    }

    /// Sorted positions, meaningful for [`SelectionType::Index`]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    fn set(&mut self, i: usize) {
        self.selection = SelectionType::Block;
        self.block_start = i;
        self.block_end = i + 1;
        self.indices.clear();
        self.mapping.clear();
    }

    fn fill_mapping(&mut self) {
        self.mapping.clear();
        for (k, &i) in self.indices.iter().enumerate() {
            self.mapping.insert(i, k);
        }
    }

    fn add(&mut self, i: usize) {
        match self.selection {
            SelectionType::Full => return,
            SelectionType::Block => {
                if i == self.block_end {
                    self.block_end = i + 1;
                    return;
                } else if i + 1 == self.block_start {
                    self.block_start = i;
                    return;
                } else if i >= self.block_start && i < self.block_end {
                    return;
                }
                self.selection = SelectionType::Index;
                self.indices.clear();
                self.indices.extend(self.block_start..self.block_end);
                self.fill_mapping();
            }
            SelectionType::Index => {}
        }

        if !self.mapping.contains_key(&i) {
            self.mapping.insert(i, self.indices.len());
            self.indices.push(i);
        }
    }

    fn finalize(&mut self) {
        if self.selection == SelectionType::Index && !self.indices.windows(2).all(|w| w[0] < w[1]) {
            self.indices.sort_unstable();
            self.fill_mapping();
        }
    }
}

/// Oracular cache that also tracks the subset of each slab to load
///
/// Two horizons are planned at once. The close horizon is loaded now and
/// the far horizon is only used to detect slabs that outlive the close one;
/// those are loaded in full since later needs cannot be known yet.
pub struct OracularSubsettedSlabCache<S> {
    oracle: Arc<dyn Oracle>,
    total: usize,
    counter: usize,
    last_id: usize,
    last_slot: Option<usize>,
    max_slabs: usize,
    all_slabs: Vec<S>,
    current_cache: HashMap<usize, usize>,
    future_cache: HashMap<usize, usize>,
    all_details: Vec<SelectionDetails>,
    free_details: Vec<usize>,
    close_future: HashMap<usize, usize>,
    far_future: HashMap<usize, usize>,
    close_order: Vec<usize>,
    far_order: Vec<usize>,
    close_refresh_point: usize,
    far_refresh_point: usize,
    far_slab_id: usize,
    far_slab_offset: usize,
    to_reassign: Vec<(usize, usize)>,
    to_populate: Vec<(usize, usize, usize)>,
}

impl<S> OracularSubsettedSlabCache<S> {
    pub fn new(oracle: Arc<dyn Oracle>, max_slabs: usize) -> Self {
        let total = oracle.total();
        Self {
            oracle,
            total,
            counter: 0,
            last_id: 0,
            last_slot: None,
            max_slabs,
            all_slabs: Vec::with_capacity(max_slabs),
            current_cache: HashMap::with_capacity(max_slabs),
            future_cache: HashMap::with_capacity(max_slabs),
            all_details: vec![SelectionDetails::default(); max_slabs * 2],
            free_details: (0..max_slabs * 2).collect(),
            close_future: HashMap::with_capacity(max_slabs),
            far_future: HashMap::with_capacity(max_slabs),
            close_order: Vec::with_capacity(max_slabs),
            far_order: Vec::with_capacity(max_slabs),
            close_refresh_point: 0,
            far_refresh_point: 0,
            far_slab_id: 0,
            far_slab_offset: 0,
            to_reassign: Vec::with_capacity(max_slabs),
            to_populate: Vec::with_capacity(max_slabs),
        }
    }

    pub fn max_slabs(&self) -> usize {
        self.max_slabs
    }

    pub fn num_slabs(&self) -> usize {
        self.current_cache.len()
    }

    pub fn predictions_made(&self) -> usize {
        self.counter
    }

    pub fn next_prediction(&mut self) -> Result<usize, ChunkError> {
        if self.counter >= self.total {
            return Err(ChunkError::CacheMisuse);
        }
        let index = self.oracle.get(self.counter);
        self.counter += 1;
        Ok(index)
    }

    /// Fetch the slab for the next prediction
    ///
    /// `populate` receives `(id, slab, details)` for every slab that must be
    /// loaded for the close horizon, in the order the oracle first requests
    /// them, where `details` names the target positions that will be read.
    pub fn next<C, E, I, Cr, P>(
        &mut self,
        ctx: &mut C,
        mut identify: I,
        mut create: Cr,
        populate: P,
    ) -> Result<(&S, usize), E>
    where
        E: From<ChunkError>,
        I: FnMut(usize) -> (usize, usize),
        Cr: FnMut(&mut C) -> S,
        P: FnOnce(&mut C, &mut [(usize, &mut S, &SelectionDetails)]) -> Result<(), E>,
    {
        let index = self.next_prediction()?;
        let (id, offset) = identify(index);
        if let Some(slot) = self.last_slot {
            if id == self.last_id {
                return Ok((&self.all_slabs[slot], offset));
            }
        }
        self.last_id = id;
        self.last_slot = None;

        if self.counter - 1 == self.close_refresh_point {
            self.rebuild(id, offset, ctx, &mut identify, &mut create, populate)?;
        }

        let slot = *self.current_cache.get(&id).ok_or(ChunkError::CacheMisuse)?;
        self.last_slot = Some(slot);
        Ok((&self.all_slabs[slot], offset))
    }

    fn rebuild<C, E, I, Cr, P>(
        &mut self,
        id: usize,
        offset: usize,
        ctx: &mut C,
        identify: &mut I,
        create: &mut Cr,
        populate: P,
    ) -> Result<(), E>
    where
        E: From<ChunkError>,
        I: FnMut(usize) -> (usize, usize),
        Cr: FnMut(&mut C) -> S,
        P: FnOnce(&mut C, &mut [(usize, &mut S, &SelectionDetails)]) -> Result<(), E>,
    {
        if self.all_slabs.is_empty() {
            // First horizon only: later close horizons are the previous far ones.
            self.requisition_close(id, offset)?;
            let mut used_slabs = 1;
            loop {
                self.close_refresh_point += 1;
                if self.close_refresh_point >= self.total {
                    break;
                }
                let (future_id, future_offset) = identify(self.oracle.get(self.close_refresh_point));
                if let Some(&d) = self.close_future.get(&future_id) {
                    self.all_details[d].add(future_offset);
                } else if used_slabs < self.max_slabs {
                    self.requisition_close(future_id, future_offset)?;
                    used_slabs += 1;
                } else {
                    self.far_slab_id = future_id;
                    self.far_slab_offset = future_offset;
                    break;
                }
            }
            self.far_refresh_point = self.close_refresh_point;
        } else {
            self.close_refresh_point = self.far_refresh_point;
        }

        if self.far_refresh_point < self.total {
            self.requisition_far(self.far_slab_id, self.far_slab_offset)?;
            let mut used_slabs = 1;
            loop {
                self.far_refresh_point += 1;
                if self.far_refresh_point >= self.total {
                    break;
                }
                let (future_id, future_offset) = identify(self.oracle.get(self.far_refresh_point));
                if let Some(&d) = self.far_future.get(&future_id) {
                    self.all_details[d].add(future_offset);
                } else if used_slabs < self.max_slabs {
                    self.requisition_far(future_id, future_offset)?;
                    used_slabs += 1;
                } else {
                    self.far_slab_id = future_id;
                    self.far_slab_offset = future_offset;
                    break;
                }
            }
        }

        // Slabs carried over were loaded in full when they entered the far horizon.
        for &close_id in &self.close_order {
            let Some(&d) = self.close_future.get(&close_id) else {
                continue;
            };
            match self.current_cache.remove(&close_id) {
                Some(slot) => {
                    self.future_cache.insert(close_id, slot);
                }
                None => self.to_reassign.push((close_id, d)),
            }
        }

        let mut leftovers = self.current_cache.values().copied();
        for &(needed, d) in &self.to_reassign {
            let slot = match leftovers.next() {
                Some(slot) => slot,
                None => {
                    self.all_slabs.push(create(ctx));
                    self.all_slabs.len() - 1
                }
            };
            self.future_cache.insert(needed, slot);
            self.all_details[d].finalize();
            self.to_populate.push((needed, slot, d));
        }

        tracing::trace!(
            horizon_end = self.close_refresh_point,
            reused = self.future_cache.len() - self.to_reassign.len(),
            populated = self.to_populate.len(),
            "rebuilt subsetted slab cache"
        );
        self.to_reassign.clear();

        {
            let slots: Vec<(usize, usize)> = self.to_populate.iter().map(|&(id, slot, _)| (id, slot)).collect();
            let borrowed = super::borrow_slots(&mut self.all_slabs, &slots);
            let all_details = &self.all_details;
            let mut batch: Vec<(usize, &mut S, &SelectionDetails)> = borrowed
                .into_iter()
                .zip(self.to_populate.iter())
                .map(|((id, slab), &(_, _, d))| (id, slab, &all_details[d]))
                .collect();
            populate(ctx, &mut batch)?;
        }
        self.to_populate.clear();

        self.current_cache.clear();
        std::mem::swap(&mut self.current_cache, &mut self.future_cache);

        self.free_details.extend(self.close_future.values().copied());
        self.close_future.clear();
        std::mem::swap(&mut self.close_future, &mut self.far_future);
        self.close_order.clear();
        std::mem::swap(&mut self.close_order, &mut self.far_order);
        Ok(())
    }

    fn take_details(&mut self) -> Result<usize, ChunkError> {
        self.free_details.pop().ok_or(ChunkError::CacheMisuse)
    }

    fn requisition_close(&mut self, id: usize, offset: usize) -> Result<(), ChunkError> {
        let d = self.take_details()?;
        self.all_details[d].set(offset);
        self.close_future.insert(id, d);
        self.close_order.push(id);
        Ok(())
    }

    fn requisition_far(&mut self, id: usize, offset: usize) -> Result<(), ChunkError> {
        let d = self.take_details()?;
        self.all_details[d].set(offset);
        self.far_future.insert(id, d);
        self.far_order.push(id);

        // Still in use after the close horizon, so later horizons may need
        // any part of it.
        if let Some(&close) = self.close_future.get(&id) {
            self.all_details[d].selection = SelectionType::Full;
            self.all_details[close].selection = SelectionType::Full;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkmat_core::FixedOracle;

    #[derive(Debug, Clone, PartialEq)]
    enum Loaded {
        Full,
        Block(usize, usize),
        Index(Vec<usize>),
    }

    fn describe(details: &SelectionDetails) -> Loaded {
        match details.selection() {
            SelectionType::Full => Loaded::Full,
            SelectionType::Block => Loaded::Block(details.block_start(), details.block_length()),
            SelectionType::Index => Loaded::Index(details.indices().to_vec()),
        }
    }

    fn run(predictions: Vec<usize>, slab_length: usize, max_slabs: usize) -> (Vec<(usize, Loaded)>, Vec<usize>) {
        let total = predictions.len();
        let mut cache = OracularSubsettedSlabCache::<usize>::new(Arc::new(FixedOracle::new(predictions)), max_slabs);
        let mut log: (usize, Vec<(usize, Loaded)>) = (0, Vec::new());
        let mut offsets = Vec::new();
        for _ in 0..total {
            let (_, offset) = cache
                .next(
                    &mut log,
                    |i| (i / slab_length, i % slab_length),
                    |log: &mut (usize, Vec<(usize, Loaded)>)| {
                        log.0 += 1;
                        log.0 - 1
                    },
                    |log: &mut (usize, Vec<(usize, Loaded)>),
                     batch: &mut [(usize, &mut usize, &SelectionDetails)]|
                     -> Result<(), ChunkError> {
                        for (id, _, details) in batch.iter() {
                            log.1.push((*id, describe(details)));
                        }
                        Ok(())
                    },
                )
                .unwrap();
            offsets.push(offset);
        }
        (log.1, offsets)
    }

    #[test]
    fn test_block_promoted_to_index() {
        let (loaded, offsets) = run(vec![5, 7, 5, 9], 10, 2);
        assert_eq!(loaded, vec![(0, Loaded::Index(vec![5, 7, 9]))]);
        assert_eq!(offsets, vec![5, 7, 5, 9]);
    }

    #[test]
    fn test_contiguous_block() {
        let (loaded, _) = run(vec![3, 4, 2, 4], 10, 1);
        assert_eq!(loaded, vec![(0, Loaded::Block(2, 3))]);
    }

    #[test]
    fn test_unsorted_index_is_sorted() {
        let (loaded, _) = run(vec![8, 2, 5], 10, 1);
        assert_eq!(loaded, vec![(0, Loaded::Index(vec![2, 5, 8]))]);
    }

    #[test]
    fn test_slab_in_both_horizons_is_full() {
        // Capacity 1: close horizon is {0}, far horizon is {1}, then {0} again.
        let (loaded, _) = run(vec![0, 11, 1, 12], 10, 1);
        assert_eq!(
            loaded,
            vec![
                (0, Loaded::Block(0, 1)),
                (1, Loaded::Block(1, 1)),
                (0, Loaded::Block(1, 1)),
                (1, Loaded::Block(2, 1)),
            ]
        );

        // Capacity 2: slab 0 is in the close horizon and again in the far one.
        let (loaded, _) = run(vec![0, 11, 1, 22, 2, 3], 10, 2);
        assert_eq!(loaded[0], (0, Loaded::Full));
        assert_eq!(loaded[1], (1, Loaded::Block(1, 1)));
        assert_eq!(loaded[2], (2, Loaded::Block(2, 1)));
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn test_details_transitions() {
        let mut details = SelectionDetails::default();
        details.set(4);
        details.add(5);
        details.add(3);
        details.add(4);
        assert_eq!(details.selection(), SelectionType::Block);
        assert_eq!((details.block_start(), details.block_length()), (3, 3));

        details.add(9);
        details.add(9);
        details.add(0);
        details.finalize();
        assert_eq!(details.selection(), SelectionType::Index);
        assert_eq!(details.indices(), &[0, 3, 4, 5, 9]);

        details.selection = SelectionType::Full;
        details.add(1);
        assert_eq!(details.selection(), SelectionType::Full);
    }
}
