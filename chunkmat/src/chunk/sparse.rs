//! Sparse chunks over compressed blobs

use chunkmat_core::ChunkError;

use super::{Chunk, NonTargetSelection, SparseBlob, SparseChunk, TargetSelection};
use crate::error::Result;
use crate::slab::SparseSlabMut;

/// Scratch space for inflating a compressed payload
#[derive(Debug, Clone)]
pub struct SparseWorkspace<V> {
    values: Vec<V>,
    indices: Vec<usize>,
    pointers: Vec<usize>,
    // Presence flags for indexed selections, reset after every use.
    remap: Vec<u8>,
}

impl<V> Default for SparseWorkspace<V> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            indices: Vec::new(),
            pointers: Vec::new(),
            remap: Vec::new(),
        }
    }
}

impl<V> SparseWorkspace<V> {
    fn configure_remap(&mut self, selected: &[usize], extent: usize) {
        if self.remap.len() < extent {
            self.remap.resize(extent, 0);
        }
        for &i in selected {
            self.remap[i] = 1;
        }
    }

    fn reset_remap(&mut self, selected: &[usize]) {
        for &i in selected {
            self.remap[i] = 0;
        }
    }
}

/// Narrow `[start, end)` of a compressed line to the entries whose index
/// lies in `[desired_start, desired_end)`
fn refine_start_and_end(
    indices: &[usize],
    start: usize,
    end: usize,
    desired_start: usize,
    desired_end: usize,
    max_end: usize,
) -> (usize, usize) {
    let mut start = start;
    let mut end = end;
    if desired_start > 0 {
        start += indices[start..end].partition_point(|&i| i < desired_start);
    }
    if desired_end != max_end {
        if desired_end == desired_start + 1 {
            end = if start != end && indices[start] == desired_start {
                start + 1
            } else {
                start
            };
        } else {
            end = start + indices[start..end].partition_point(|&i| i < desired_end);
        }
    }
    (start, end)
}

/// Sparse chunk that inflates its blob on every extraction
#[derive(Debug, Clone, PartialEq)]
pub struct BlobSparseChunk<B, const SUBSET: bool> {
    blob: B,
}

/// Sparse chunk that is always extracted in full along the target dimension
pub type SimpleSparseChunk<B> = BlobSparseChunk<B, false>;

/// Sparse chunk that accepts target subsets
pub type SubsettedSparseChunk<B> = BlobSparseChunk<B, true>;

impl<B: SparseBlob, const SUBSET: bool> BlobSparseChunk<B, SUBSET> {
    pub fn new(blob: B) -> Self {
        Self { blob }
    }

    pub fn blob(&self) -> &B {
        &self.blob
    }

    /// Walk compressed line `p` of a payload compressed along the target
    fn fill_target(
        &self,
        p: usize,
        non_target: NonTargetSelection<'_>,
        non_target_dim: usize,
        work: &SparseWorkspace<B::Value>,
        output: &mut SparseSlabMut<'_, B::Value>,
        shift: usize,
    ) {
        let (start, end) = (work.pointers[p], work.pointers[p + 1]);
        if start >= end {
            return;
        }
        match non_target {
            NonTargetSelection::Block { start: from, length } => {
                let (start, end) =
                    refine_start_and_end(&work.indices, start, end, from, from + length, non_target_dim);
                for i in start..end {
                    output.push(p, work.values[i], work.indices[i] + shift);
                }
            }
            NonTargetSelection::Index(selected) => {
                let (Some(&first), Some(&last)) = (selected.first(), selected.last()) else {
                    return;
                };
                let (start, end) =
                    refine_start_and_end(&work.indices, start, end, first, last + 1, non_target_dim);
                for i in start..end {
                    let s = work.indices[i];
                    if work.remap[s] != 0 {
                        output.push(p, work.values[i], s + shift);
                    }
                }
            }
        }
    }

    /// Walk compressed line `s` of a payload compressed along the non-target
    fn fill_secondary(
        &self,
        s: usize,
        target: TargetSelection<'_>,
        target_dim: usize,
        work: &SparseWorkspace<B::Value>,
        output: &mut SparseSlabMut<'_, B::Value>,
        shift: usize,
    ) {
        let (start, end) = (work.pointers[s], work.pointers[s + 1]);
        if start >= end {
            return;
        }
        let (target_start, target_end) = target.bounds(target_dim);
        let (start, end) =
            refine_start_and_end(&work.indices, start, end, target_start, target_end, target_dim);
        match target {
            TargetSelection::Full | TargetSelection::Block { .. } => {
                for i in start..end {
                    output.push(work.indices[i], work.values[i], s + shift);
                }
            }
            TargetSelection::Index(_) => {
                for i in start..end {
                    let p = work.indices[i];
                    if work.remap[p] != 0 {
                        output.push(p, work.values[i], s + shift);
                    }
                }
            }
        }
    }
}

impl<B: SparseBlob, const SUBSET: bool> Chunk for BlobSparseChunk<B, SUBSET> {
    fn nrow(&self) -> usize {
        self.blob.nrow()
    }

    fn ncol(&self) -> usize {
        self.blob.ncol()
    }
}

impl<B: SparseBlob, const SUBSET: bool> SparseChunk for BlobSparseChunk<B, SUBSET> {
    type Value = B::Value;
    type Workspace = SparseWorkspace<B::Value>;
    const USE_SUBSET: bool = SUBSET;

    fn extract(
        &self,
        row: bool,
        target: TargetSelection<'_>,
        non_target: NonTargetSelection<'_>,
        work: &mut SparseWorkspace<B::Value>,
        output: &mut SparseSlabMut<'_, B::Value>,
        shift: usize,
    ) -> Result<()> {
        self.blob
            .inflate(&mut work.values, &mut work.indices, &mut work.pointers)?;
        let (target_dim, non_target_dim) = if row {
            (self.blob.nrow(), self.blob.ncol())
        } else {
            (self.blob.ncol(), self.blob.nrow())
        };
        let by_target = self.blob.is_csr() == row;
        let primary = if by_target { target_dim } else { non_target_dim };
        if work.pointers.len() != primary + 1
            || work.pointers.last() != Some(&work.values.len())
            || work.values.len() != work.indices.len()
        {
            return Err(ChunkError::InvalidChunkData.into());
        }

        if by_target {
            if let NonTargetSelection::Index(selected) = non_target {
                work.configure_remap(selected, non_target_dim);
            }
            target.for_each(target_dim, |p| {
                self.fill_target(p, non_target, non_target_dim, work, output, shift);
            });
            if let NonTargetSelection::Index(selected) = non_target {
                work.reset_remap(selected);
            }
        } else {
            if let TargetSelection::Index(selected) = target {
                work.configure_remap(selected, target_dim);
            }
            match non_target {
                NonTargetSelection::Block { start, length } => {
                    for s in start..start + length {
                        self.fill_secondary(s, target, target_dim, work, output, shift);
                    }
                }
                NonTargetSelection::Index(selected) => {
                    for &s in selected {
                        self.fill_secondary(s, target, target_dim, work, output, shift);
                    }
                }
            }
            if let TargetSelection::Index(selected) = target {
                work.reset_remap(selected);
            }
        }
        Ok(())
    }
}
