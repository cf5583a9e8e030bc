//! Slab caches
//!
//! Every cache is generic over the slab type `S` and never touches slab
//! contents itself. Callers pass a context (usually the slab factory) that
//! is lent to the `create` and `populate` callbacks, so that populating a
//! slab may borrow the factory mutably while the cache is borrowed too.

pub mod lru;
pub mod oracular;
pub mod subsetted;
pub mod variable;

pub use lru::LruSlabCache;
pub use oracular::OracularSlabCache;
pub use subsetted::{OracularSubsettedSlabCache, SelectionDetails, SelectionType};
pub use variable::OracularVariableSlabCache;

/// Collect mutable references to the slabs at `slots`, paired with their ids
///
/// Slots must be distinct, which every cache guarantees because each slab
/// is assigned to exactly one id per horizon.
pub(crate) fn borrow_slots<'a, S>(
    all_slabs: &'a mut [S],
    slots: &[(usize, usize)],
) -> Vec<(usize, &'a mut S)> {
    let mut available: Vec<Option<&'a mut S>> = all_slabs.iter_mut().map(Some).collect();
    slots
        .iter()
        .filter_map(|&(id, slot)| available[slot].take().map(|slab| (id, slab)))
        .collect()
}
