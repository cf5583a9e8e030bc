//! Row and column access over chunked matrices
//!
//! A [`Matrix`] hands out extractors. Each extractor iterates over one
//! dimension (the target) and returns, for every requested target index,
//! a selection of the other dimension. Extractors own their slab cache and
//! are used from a single thread; parallel consumers create one extractor
//! per worker.

pub mod dense;
pub mod sparse;

use std::sync::Arc;

use chunkmat_core::{validate_block, validate_indices, ChunkError, MatrixElement, Oracle};

use crate::chunk::NonTargetSelection;
use crate::config::ExtractOptions;
use crate::error::Result;

pub use dense::ChunkedDenseMatrix;
pub use sparse::ChunkedSparseMatrix;

/// Non-target positions requested from an extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The whole non-target dimension
    Full,
    /// Positions `[start, start + length)`
    Block { start: usize, length: usize },
    /// Strictly increasing positions
    Index(Vec<usize>),
}

impl Selection {
    /// Check the selection against the non-target extent
    pub fn validate(&self, extent: usize) -> Result<()> {
        match self {
            Selection::Full => Ok(()),
            Selection::Block { start, length } => Ok(validate_block(*start, *length, extent)?),
            Selection::Index(indices) => Ok(validate_indices(indices, extent)?),
        }
    }

    /// Number of positions selected out of `extent`
    pub fn len(&self, extent: usize) -> usize {
        match self {
            Selection::Full => extent,
            Selection::Block { length, .. } => *length,
            Selection::Index(indices) => indices.len(),
        }
    }

    pub(crate) fn as_non_target(&self, extent: usize) -> NonTargetSelection<'_> {
        match self {
            Selection::Full => NonTargetSelection::Block {
                start: 0,
                length: extent,
            },
            Selection::Block { start, length } => NonTargetSelection::Block {
                start: *start,
                length: *length,
            },
            Selection::Index(indices) => NonTargetSelection::Index(indices),
        }
    }

    /// Matrix-level position of the `k`-th selected element, for every `k`
    pub(crate) fn positions(&self, extent: usize) -> Vec<usize> {
        match self {
            Selection::Full => (0..extent).collect(),
            Selection::Block { start, length } => (*start..*start + *length).collect(),
            Selection::Index(indices) => indices.clone(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Selection::Full => "full",
            Selection::Block { .. } => "block",
            Selection::Index(_) => "index",
        }
    }
}

/// Non-zeros of one target element
///
/// `values` and `indices` point either into the caller's buffers or into
/// the extractor's cache, and are `None` when not requested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseRange<'a, V> {
    pub number: usize,
    pub values: Option<&'a [V]>,
    pub indices: Option<&'a [usize]>,
}

/// Extractor returning every selected value of a target element
pub trait DenseExtractor<V> {
    /// Fetch target element `i`
    ///
    /// The result holds one value per selected position and may point into
    /// `buffer` or into the extractor's cache. Oracular extractors ignore
    /// `i` and return the oracle's next prediction.
    fn fetch<'a>(&'a mut self, i: usize, buffer: &'a mut [V]) -> Result<&'a [V]>;
}

/// Extractor returning the structural non-zeros of a target element
pub trait SparseExtractor<V> {
    /// Fetch target element `i`, with indices in increasing order
    fn fetch<'a>(
        &'a mut self,
        i: usize,
        value_buffer: &'a mut [V],
        index_buffer: &'a mut [usize],
    ) -> Result<SparseRange<'a, V>>;
}

/// A two-dimensional matrix readable by rows or columns
pub trait Matrix: Send + Sync {
    /// The element type stored in this matrix
    type Element: MatrixElement;

    fn nrow(&self) -> usize;

    fn ncol(&self) -> usize;

    /// Whether the matrix stores only structural non-zeros
    fn is_sparse(&self) -> bool;

    /// Whether iterating over rows is cheaper than over columns
    fn prefer_rows(&self) -> bool;

    fn dense(
        &self,
        row: bool,
        selection: Selection,
        options: &ExtractOptions,
    ) -> Result<Box<dyn DenseExtractor<Self::Element> + '_>>;

    fn dense_oracular(
        &self,
        row: bool,
        oracle: Arc<dyn Oracle>,
        selection: Selection,
        options: &ExtractOptions,
    ) -> Result<Box<dyn DenseExtractor<Self::Element> + '_>>;

    fn sparse(
        &self,
        row: bool,
        selection: Selection,
        options: &ExtractOptions,
    ) -> Result<Box<dyn SparseExtractor<Self::Element> + '_>>;

    fn sparse_oracular(
        &self,
        row: bool,
        oracle: Arc<dyn Oracle>,
        selection: Selection,
        options: &ExtractOptions,
    ) -> Result<Box<dyn SparseExtractor<Self::Element> + '_>>;

    /// Length of the target dimension
    fn target_dim(&self, row: bool) -> usize {
        if row {
            self.nrow()
        } else {
            self.ncol()
        }
    }

    /// Length of the non-target dimension
    fn non_target_dim(&self, row: bool) -> usize {
        if row {
            self.ncol()
        } else {
            self.nrow()
        }
    }
}

/// Source of target indices for extractors without a cache
pub(crate) enum SoloCursor {
    Myopic,
    Oracular { oracle: Arc<dyn Oracle>, used: usize },
}

impl SoloCursor {
    pub(crate) fn new(oracle: Option<Arc<dyn Oracle>>) -> Self {
        match oracle {
            Some(oracle) => SoloCursor::Oracular { oracle, used: 0 },
            None => SoloCursor::Myopic,
        }
    }

    /// Resolve the index to fetch, consuming a prediction if oracular
    pub(crate) fn next(&mut self, i: usize) -> Result<usize> {
        match self {
            SoloCursor::Myopic => Ok(i),
            SoloCursor::Oracular { oracle, used } => {
                if *used >= oracle.total() {
                    return Err(ChunkError::CacheMisuse.into());
                }
                let index = oracle.get(*used);
                *used += 1;
                Ok(index)
            }
        }
    }
}

/// Scatters sparse entries into a zeroed dense selection
pub(crate) struct Densifier {
    start: usize,
    // Position within the selection of each index past `start`, plus one.
    remap: Option<Vec<usize>>,
}

impl Densifier {
    pub(crate) fn new(selection: &Selection) -> Self {
        match selection {
            Selection::Full => Self {
                start: 0,
                remap: None,
            },
            Selection::Block { start, .. } => Self {
                start: *start,
                remap: None,
            },
            Selection::Index(indices) => {
                let start = indices.first().copied().unwrap_or(0);
                let span = indices.last().map_or(0, |&last| last + 1 - start);
                let mut remap = vec![0; span];
                for (k, &i) in indices.iter().enumerate() {
                    remap[i - start] = k + 1;
                }
                Self {
                    start,
                    remap: Some(remap),
                }
            }
        }
    }

    pub(crate) fn scatter<V: MatrixElement>(&self, values: &[V], indices: &[usize], output: &mut [V]) {
        output.fill(V::zero());
        match &self.remap {
            None => {
                for (&v, &i) in values.iter().zip(indices) {
                    output[i - self.start] = v;
                }
            }
            Some(remap) => {
                for (&v, &i) in values.iter().zip(indices) {
                    let k = remap[i - self.start];
                    if k > 0 {
                        output[k - 1] = v;
                    }
                }
            }
        }
    }
}
