//! Oracle-aware slab cache for slabs of varying size

use std::sync::Arc;

use chunkmat_core::{ChunkError, Oracle};
use hashbrown::HashMap;

/// Oracular cache bounded by the total size of its slabs
///
/// Slabs are caller-defined and may differ in size, e.g. sparse slabs
/// holding a varying number of non-zeros. A horizon keeps adding slabs while
/// the estimated size of new slabs plus the actual size of reused slabs fits
/// in `max_size`. `populate` gets the whole slab vector so that it may
/// compact or resize slabs as it fills them.
pub struct OracularVariableSlabCache<S> {
    oracle: Arc<dyn Oracle>,
    total: usize,
    counter: usize,
    last_id: usize,
    last_slot: Option<usize>,
    max_size: usize,
    used_size: usize,
    all_slabs: Vec<S>,
    current_cache: HashMap<usize, usize>,
    future_cache: HashMap<usize, usize>,
    to_populate: Vec<(usize, usize)>,
    to_reuse: Vec<(usize, usize)>,
    in_need: Vec<usize>,
    free_pool: Vec<usize>,
    refresh_point: usize,
}

impl<S> OracularVariableSlabCache<S> {
    pub fn new(oracle: Arc<dyn Oracle>, max_size: usize) -> Self {
        let total = oracle.total();
        Self {
            oracle,
            total,
            counter: 0,
            last_id: 0,
            last_slot: None,
            max_size,
            used_size: 0,
            all_slabs: Vec::new(),
            current_cache: HashMap::new(),
            future_cache: HashMap::new(),
            to_populate: Vec::new(),
            to_reuse: Vec::new(),
            in_need: Vec::new(),
            free_pool: Vec::new(),
            refresh_point: 0,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Size of the slabs in the current horizon, as counted when it was built
    pub fn used_size(&self) -> usize {
        self.used_size
    }

    pub fn num_slabs(&self) -> usize {
        self.current_cache.len()
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
    /// `estimated_size` bounds the size of a slab before it is loaded and
    /// `actual_size` reports the size of a loaded slab. `populate` receives
    /// `(id, slot)` pairs to load and to keep, with `slot` indexing the slab
    /// vector it is given.
    pub fn next<C, E, I, Es, As, Cr, P>(
        &mut self,
        ctx: &mut C,
        mut identify: I,
        mut estimated_size: Es,
        mut actual_size: As,
        mut create: Cr,
        populate: P,
    ) -> Result<(&S, usize), E>
    where
        E: From<ChunkError>,
        I: FnMut(usize) -> (usize, usize),
        Es: FnMut(usize) -> usize,
        As: FnMut(usize, &S) -> usize,
        Cr: FnMut(&mut C) -> S,
        P: FnOnce(&mut C, &[(usize, usize)], &[(usize, usize)], &mut Vec<S>) -> Result<(), E>,
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
            self.used_size = estimated_size(id);
            self.requisition_new_slab(id);

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

                if let Some(&slot) = self.current_cache.get(&future_id) {
                    let candidate = self.used_size + actual_size(future_id, &self.all_slabs[slot]);
                    if candidate > self.max_size {
                        break;
                    }
                    self.used_size = candidate;
                    self.future_cache.insert(future_id, slot);
                    self.to_reuse.push((future_id, slot));
                    self.current_cache.remove(&future_id);
                } else {
                    let candidate = self.used_size + estimated_size(future_id);
                    if candidate > self.max_size {
                        break;
                    }
                    self.used_size = candidate;
                    self.requisition_new_slab(future_id);
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
                self.to_populate.push((needed, slot));
                self.future_cache.insert(needed, slot);
            }
            self.free_pool.extend(leftovers);
            self.in_need.clear();

            tracing::trace!(
                horizon_end = self.refresh_point,
                used_size = self.used_size,
                reused = self.to_reuse.len(),
                populated = self.to_populate.len(),
                "rebuilt variable slab cache"
            );

            let result = populate(ctx, &self.to_populate, &self.to_reuse, &mut self.all_slabs);
            self.to_populate.clear();
            self.to_reuse.clear();
            result?;

            self.current_cache.clear();
            std::mem::swap(&mut self.current_cache, &mut self.future_cache);
        }

        let slot = *self.current_cache.get(&id).ok_or(ChunkError::CacheMisuse)?;
        self.last_slot = Some(slot);
        Ok((&self.all_slabs[slot], offset))
    }

    fn requisition_new_slab(&mut self, id: usize) {
        match self.free_pool.pop() {
            Some(slot) => {
                self.future_cache.insert(id, slot);
                self.to_populate.push((id, slot));
            }
            None => {
                self.future_cache.insert(id, usize::MAX);
                self.in_need.push(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkmat_core::FixedOracle;

    type Populated = Vec<(Vec<usize>, Vec<usize>)>;

    /// Slab `id` holds `id + 1` elements, each equal to `id`.
    fn run(predictions: Vec<usize>, max_size: usize) -> (Vec<usize>, Populated, usize) {
        let total = predictions.len();
        let mut cache = OracularVariableSlabCache::<Vec<usize>>::new(
            Arc::new(FixedOracle::new(predictions)),
            max_size,
        );
        let mut state: (usize, Populated) = (0, Vec::new());
        let mut seen = Vec::new();
        for _ in 0..total {
            let (slab, _) = cache
                .next(
                    &mut state,
                    |i| (i, 0),
                    |id| id + 1,
                    |_, slab: &Vec<usize>| slab.len(),
                    |state: &mut (usize, Populated)| {
                        state.0 += 1;
                        Vec::new()
                    },
                    |state: &mut (usize, Populated),
                     to_populate: &[(usize, usize)],
                     to_reuse: &[(usize, usize)],
                     all: &mut Vec<Vec<usize>>|
                     -> Result<(), ChunkError> {
                        for &(id, slot) in to_populate {
                            all[slot] = vec![id; id + 1];
                        }
                        state.1.push((
                            to_populate.iter().map(|p| p.0).collect(),
                            to_reuse.iter().map(|p| p.0).collect(),
                        ));
                        Ok(())
                    },
                )
                .unwrap();
            seen.push(slab[0]);
        }
        (seen, state.1, state.0)
    }

    #[test]
    fn test_size_bounded_horizons() {
        // Sizes 1, 2, 3: {0, 1} fits in 5, then {2} plus the loaded {1} does.
        let (seen, populated, created) = run(vec![0, 1, 2, 1], 5);
        assert_eq!(seen, vec![0, 1, 2, 1]);
        assert_eq!(populated, vec![(vec![0, 1], vec![]), (vec![2], vec![1])]);
        assert_eq!(created, 2);
    }

    #[test]
    fn test_released_slabs_are_recycled() {
        let (seen, populated, created) = run(vec![0, 1, 2, 1, 0], 4);
        assert_eq!(seen, vec![0, 1, 2, 1, 0]);
        assert_eq!(
            populated,
            vec![
                (vec![0, 1], vec![]),
                (vec![2], vec![]),
                (vec![1, 0], vec![]),
            ]
        );
        assert_eq!(created, 2);
    }

    #[test]
    fn test_single_horizon() {
        let (seen, populated, created) = run(vec![0, 1, 0, 1], 10);
        assert_eq!(seen, vec![0, 1, 0, 1]);
        assert_eq!(populated, vec![(vec![0, 1], vec![])]);
        assert_eq!(created, 2);
    }
}
