//! Oracle-aware slab cache with fixed-size slabs

use std::sync::Arc;

use chunkmat_core::{ChunkError, Oracle};
use hashbrown::HashMap;

use super::borrow_slots;

/// Cache that reads ahead in an oracle to plan which slabs to load
///
/// Each rebuild covers a horizon of upcoming predictions that touches at
/// most `max_slabs` distinct slabs. Slabs still needed by the new horizon
/// are carried over, the rest are reassigned, and every slab that needs
/// loading is handed to a single `populate` call.
pub struct OracularSlabCache<S> {
    oracle: Arc<dyn Oracle>,
    total: usize,
    counter: usize,
    last_id: usize,
    last_slot: Option<usize>,
    max_slabs: usize,
    all_slabs: Vec<S>,
    current_cache: HashMap<usize, usize>,
    future_cache: HashMap<usize, usize>,
    in_need: Vec<usize>,
    to_populate: Vec<(usize, usize)>,
    refresh_point: usize,
}

impl<S> OracularSlabCache<S> {
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
            in_need: Vec::with_capacity(max_slabs),
            to_populate: Vec::with_capacity(max_slabs),
            refresh_point: 0,
        }
    }

    pub fn max_slabs(&self) -> usize {
        self.max_slabs
    }

    /// Number of slabs in the current horizon
    pub fn num_slabs(&self) -> usize {
        self.current_cache.len()
    }

    /// Number of predictions consumed so far
    pub fn predictions_made(&self) -> usize {
        self.counter
    }

    /// Consume the next prediction without touching the cache
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
    /// `identify` maps a target index to `(slab_id, offset_within_slab)`.
    /// `populate` receives every `(id, slab)` pair that must be loaded for
    /// the new horizon, in the order the oracle first requests them. It is
    /// only called when a horizon is rebuilt.
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
        P: FnOnce(&mut C, &mut [(usize, &mut S)]) -> Result<(), E>,
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

        if self.counter - 1 == self.refresh_point {
            self.rebuild(id, ctx, &mut identify, &mut create, populate)?;
        }

        let slot = *self.current_cache.get(&id).ok_or(ChunkError::CacheMisuse)?;
        self.last_slot = Some(slot);
        Ok((&self.all_slabs[slot], offset))
    }

    fn rebuild<C, E, I, Cr, P>(
        &mut self,
        id: usize,
        ctx: &mut C,
        identify: &mut I,
        create: &mut Cr,
        populate: P,
    ) -> Result<(), E>
    where
        I: FnMut(usize) -> (usize, usize),
        Cr: FnMut(&mut C) -> S,
        P: FnOnce(&mut C, &mut [(usize, &mut S)]) -> Result<(), E>,
    {
        // The slab needed now cannot be in the current horizon, otherwise
        // that horizon would have extended to cover this prediction.
        self.future_cache.insert(id, usize::MAX);
        self.in_need.push(id);
        let mut used_slabs = 1;
        let mut last_future_id = id;

        loop {
            self.refresh_point += 1;
            if self.refresh_point >= self.total {
                break;
            }
            let (future_id, _) = identify(self.oracle.get(self.refresh_point));
            if future_id == last_future_id {
                continue;
            }
            last_future_id = future_id;
            if self.future_cache.contains_key(&future_id) {
                continue;
            }
            if used_slabs == self.max_slabs {
                break;
            }
            used_slabs += 1;

            match self.current_cache.remove(&future_id) {
                Some(slot) => {
                    self.future_cache.insert(future_id, slot);
                }
                None => {
                    self.future_cache.insert(future_id, usize::MAX);
                    self.in_need.push(future_id);
                }
            }
        }

        let mut leftovers = self.current_cache.values().copied();
        for &needed in &self.in_need {
            let slot = match leftovers.next() {
                Some(slot) => slot,
                None => {
                    self.all_slabs.push(create(ctx));
                    self.all_slabs.len() - 1
                }
            };
            self.future_cache.insert(needed, slot);
            self.to_populate.push((needed, slot));
        }

        tracing::trace!(
            horizon_end = self.refresh_point,
            reused = self.future_cache.len() - self.in_need.len(),
            populated = self.to_populate.len(),
            "rebuilt oracular slab cache"
        );
        self.in_need.clear();

        let mut batch = borrow_slots(&mut self.all_slabs, &self.to_populate);
        self.to_populate.clear();
        populate(ctx, &mut batch)?;

        self.current_cache.clear();
        std::mem::swap(&mut self.current_cache, &mut self.future_cache);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkmat_core::FixedOracle;

    #[derive(Default)]
    struct Log {
        created: usize,
        populate_calls: usize,
        populated: Vec<usize>,
    }

    fn step(cache: &mut OracularSlabCache<usize>, log: &mut Log, slab_length: usize) -> (usize, usize) {
        let (slab, offset) = cache
            .next(
                log,
                |i| (i / slab_length, i % slab_length),
                |log: &mut Log| {
                    log.created += 1;
                    log.created - 1
                },
                |log: &mut Log, batch: &mut [(usize, &mut usize)]| -> Result<(), ChunkError> {
                    log.populate_calls += 1;
                    log.populated.extend(batch.iter().map(|(id, _)| *id));
                    Ok(())
                },
            )
            .unwrap();
        (*slab, offset)
    }

    #[test]
    fn test_horizon_reuse() {
        let oracle = Arc::new(FixedOracle::new(vec![0, 0, 1, 2, 0, 2]));
        let mut cache = OracularSlabCache::new(oracle, 2);
        let mut log = Log::default();

        let slabs: Vec<_> = (0..6).map(|_| step(&mut cache, &mut log, 1).0).collect();
        assert_eq!(log.populate_calls, 2);
        assert_eq!(log.populated, vec![0, 1, 2]);
        assert_eq!(log.created, 2);

        // Slab 0 survives into the second horizon, slab 2 takes over from 1.
        assert_eq!(slabs[0], slabs[4]);
        assert_eq!(slabs[2], slabs[3]);
        assert_eq!(slabs[3], slabs[5]);
        assert_eq!(cache.predictions_made(), 6);
    }

    #[test]
    fn test_offsets_within_slab() {
        let oracle = Arc::new(FixedOracle::new(vec![3, 4, 12, 5]));
        let mut cache = OracularSlabCache::new(oracle, 1);
        let mut log = Log::default();

        assert_eq!(step(&mut cache, &mut log, 10).1, 3);
        assert_eq!(step(&mut cache, &mut log, 10).1, 4);
        assert_eq!(step(&mut cache, &mut log, 10).1, 2);
        assert_eq!(step(&mut cache, &mut log, 10).1, 5);
        assert_eq!(log.populated, vec![0, 1, 0]);
        assert_eq!(log.created, 1);
    }

    #[test]
    fn test_overrun_is_misuse() {
        let oracle = Arc::new(FixedOracle::new(vec![1]));
        let mut cache = OracularSlabCache::<usize>::new(oracle, 1);
        let mut log = Log::default();
        step(&mut cache, &mut log, 1);

        let result: Result<(&usize, usize), ChunkError> = cache.next(
            &mut log,
            |i| (i, 0),
            |_| 0,
            |_, _| Ok(()),
        );
        assert_eq!(result.err(), Some(ChunkError::CacheMisuse));
    }
}
