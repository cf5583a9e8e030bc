//! Chunk interfaces consumed by the coordinator
//!
//! A chunk is a rectangular tile of the matrix that can only be read by
//! materializing it. The coordinator asks a chunk for a selection of its
//! target positions crossed with a selection of its non-target positions,
//! and the chunk writes the result straight into a slab.
//!
//! Target positions are always chunk-local and absolute: target position
//! `p` of a dense request lands at `output[p * stride..]`, and for a sparse
//! request it is appended to entry `p` of the output slab. Non-target
//! positions are chunk-local on input; sparse indices are reported relative
//! to the matrix by adding the caller's `shift`.

pub mod blob;
pub mod dense;
pub mod sparse;

use chunkmat_core::MatrixElement;

use crate::error::Result;
use crate::slab::SparseSlabMut;

pub use blob::{DenseBlob, DenseBytesBlob, DenseVecBlob, SparseBlob, SparseVecBlob};
pub use dense::{BlobDenseChunk, SimpleDenseChunk, SubsettedDenseChunk};
pub use sparse::{BlobSparseChunk, SimpleSparseChunk, SparseWorkspace, SubsettedSparseChunk};

/// Target positions requested from a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSelection<'a> {
    /// Every target position of the chunk
    Full,
    /// Positions `[start, start + length)`
    Block { start: usize, length: usize },
    /// Strictly increasing positions
    Index(&'a [usize]),
}

impl TargetSelection<'_> {
    /// Visit each requested position of a chunk with `extent` target positions
    pub fn for_each(&self, extent: usize, mut f: impl FnMut(usize)) {
        match *self {
            TargetSelection::Full => (0..extent).for_each(f),
            TargetSelection::Block { start, length } => (start..start + length).for_each(f),
            TargetSelection::Index(indices) => indices.iter().for_each(|&p| f(p)),
        }
    }

    /// Half-open range covering every requested position
    pub fn bounds(&self, extent: usize) -> (usize, usize) {
        match *self {
            TargetSelection::Full => (0, extent),
            TargetSelection::Block { start, length } => (start, start + length),
            TargetSelection::Index(indices) => match (indices.first(), indices.last()) {
                (Some(&first), Some(&last)) => (first, last + 1),
                _ => (0, 0),
            },
        }
    }
}

/// Non-target positions requested from a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonTargetSelection<'a> {
    /// Positions `[start, start + length)`
    Block { start: usize, length: usize },
    /// Strictly increasing, non-empty positions
    Index(&'a [usize]),
}

impl NonTargetSelection<'_> {
    /// Number of requested positions
    pub fn len(&self) -> usize {
        match *self {
            NonTargetSelection::Block { length, .. } => length,
            NonTargetSelection::Index(indices) => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shape shared by every chunk
pub trait Chunk: Send + Sync {
    fn nrow(&self) -> usize;

    fn ncol(&self) -> usize;
}

/// A chunk that extracts into dense slabs
pub trait DenseChunk: Chunk {
    type Value: MatrixElement;

    /// Scratch space reused across extractions by the same extractor
    type Workspace: Default + Send;

    /// Whether extracting a subset of target positions is cheaper than
    /// extracting all of them. If false, the coordinator only ever requests
    /// [`TargetSelection::Full`].
    const USE_SUBSET: bool;

    /// Write the requested values, placing target position `p` and the
    /// `k`-th requested non-target position at `output[p * stride + k]`
    fn extract(
        &self,
        row: bool,
        target: TargetSelection<'_>,
        non_target: NonTargetSelection<'_>,
        work: &mut Self::Workspace,
        output: &mut [Self::Value],
        stride: usize,
    ) -> Result<()>;
}

/// A chunk that extracts into sparse slabs
pub trait SparseChunk: Chunk {
    type Value: MatrixElement;

    type Workspace: Default + Send;

    const USE_SUBSET: bool;

    /// Append the structural non-zeros of each requested target position,
    /// in increasing non-target order, with indices offset by `shift`
    fn extract(
        &self,
        row: bool,
        target: TargetSelection<'_>,
        non_target: NonTargetSelection<'_>,
        work: &mut Self::Workspace,
        output: &mut SparseSlabMut<'_, Self::Value>,
        shift: usize,
    ) -> Result<()>;
}
