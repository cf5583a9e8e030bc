//! Dense chunks over whole-payload blobs

use chunkmat_core::ChunkError;

use super::{Chunk, DenseBlob, DenseChunk, NonTargetSelection, TargetSelection};
use crate::error::Result;

/// Dense chunk that inflates its blob on every extraction
///
/// With `SUBSET = false` the coordinator always asks for every target
/// position, which suits payloads whose decoding cost does not depend on
/// how much of them is read.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobDenseChunk<B, const SUBSET: bool> {
    blob: B,
}

/// Dense chunk that is always extracted in full along the target dimension
pub type SimpleDenseChunk<B> = BlobDenseChunk<B, false>;

/// Dense chunk that accepts target subsets
pub type SubsettedDenseChunk<B> = BlobDenseChunk<B, true>;

impl<B: DenseBlob, const SUBSET: bool> BlobDenseChunk<B, SUBSET> {
    pub fn new(blob: B) -> Self {
        Self { blob }
    }

    pub fn blob(&self) -> &B {
        &self.blob
    }
}

impl<B: DenseBlob, const SUBSET: bool> Chunk for BlobDenseChunk<B, SUBSET> {
    fn nrow(&self) -> usize {
        self.blob.nrow()
    }

    fn ncol(&self) -> usize {
        self.blob.ncol()
    }
}

impl<B: DenseBlob, const SUBSET: bool> DenseChunk for BlobDenseChunk<B, SUBSET> {
    type Value = B::Value;
    type Workspace = Vec<B::Value>;
    const USE_SUBSET: bool = SUBSET;

    fn extract(
        &self,
        row: bool,
        target: TargetSelection<'_>,
        non_target: NonTargetSelection<'_>,
        work: &mut Vec<B::Value>,
        output: &mut [B::Value],
        stride: usize,
    ) -> Result<()> {
        self.blob.inflate(work)?;
        let (target_dim, non_target_dim) = if row {
            (self.blob.nrow(), self.blob.ncol())
        } else {
            (self.blob.ncol(), self.blob.nrow())
        };
        if work.len() != target_dim * non_target_dim {
            return Err(ChunkError::InvalidChunkData.into());
        }

        if self.blob.is_row_major() == row {
            // Each target position is a contiguous run in the workspace.
            target.for_each(target_dim, |p| {
                let src = &work[p * non_target_dim..(p + 1) * non_target_dim];
                let out = &mut output[p * stride..];
                match non_target {
                    NonTargetSelection::Block { start, length } => {
                        out[..length].copy_from_slice(&src[start..start + length]);
                    }
                    NonTargetSelection::Index(indices) => {
                        for (o, &s) in out.iter_mut().zip(indices) {
                            *o = src[s];
                        }
                    }
                }
            });
        } else {
            target.for_each(target_dim, |p| {
                let out = &mut output[p * stride..];
                match non_target {
                    NonTargetSelection::Block { start, length } => {
                        for (k, o) in out[..length].iter_mut().enumerate() {
                            *o = work[(start + k) * target_dim + p];
                        }
                    }
                    NonTargetSelection::Index(indices) => {
                        for (o, &s) in out.iter_mut().zip(indices) {
                            *o = work[s * target_dim + p];
                        }
                    }
                }
            });
        }
        Ok(())
    }
}
