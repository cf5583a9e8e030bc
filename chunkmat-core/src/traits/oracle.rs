//! Predictions of upcoming accesses along the target dimension

use alloc::vec::Vec;

/// Sequence of target-dimension indices that an extractor will be asked for
///
/// Oracular caches read the oracle ahead of the caller to plan which slabs
/// to load. `get(i)` must be valid for every `i < total()`.
pub trait Oracle: Send + Sync {
    /// Number of predictions available
    fn total(&self) -> usize;

    /// The `i`-th predicted index
    fn get(&self, i: usize) -> usize;
}

/// Oracle over a contiguous run of indices `[start, start + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsecutiveOracle {
    start: usize,
    length: usize,
}

impl ConsecutiveOracle {
    /// Create an oracle yielding `start, start + 1, ..., start + length - 1`
    pub const fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }
}

impl Oracle for ConsecutiveOracle {
    fn total(&self) -> usize {
        self.length
    }

    fn get(&self, i: usize) -> usize {
        self.start + i
    }
}

/// Oracle over an explicit list of predictions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedOracle {
    predictions: Vec<usize>,
}

impl FixedOracle {
    pub fn new(predictions: Vec<usize>) -> Self {
        Self { predictions }
    }
}

impl Oracle for FixedOracle {
    fn total(&self) -> usize {
        self.predictions.len()
    }

    fn get(&self, i: usize) -> usize {
        self.predictions[i]
    }
}

impl<O: Oracle + ?Sized> Oracle for alloc::sync::Arc<O> {
    fn total(&self) -> usize {
        (**self).total()
    }

    fn get(&self, i: usize) -> usize {
        (**self).get(i)
    }
}

impl<O: Oracle + ?Sized> Oracle for alloc::boxed::Box<O> {
    fn total(&self) -> usize {
        (**self).total()
    }

    fn get(&self, i: usize) -> usize {
        (**self).get(i)
    }
}
