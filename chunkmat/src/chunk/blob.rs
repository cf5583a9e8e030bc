//! Chunk payloads that can only be inflated as a whole

use chunkmat_core::{ChunkError, MatrixElement};

use crate::error::Result;

/// A dense chunk payload
pub trait DenseBlob: Send + Sync {
    type Value: MatrixElement;

    fn nrow(&self) -> usize;

    fn ncol(&self) -> usize;

    /// Whether inflated values are stored row by row
    fn is_row_major(&self) -> bool;

    /// Write all `nrow * ncol` values into `buffer` in storage order
    fn inflate(&self, buffer: &mut Vec<Self::Value>) -> Result<()>;
}

/// A compressed sparse chunk payload
pub trait SparseBlob: Send + Sync {
    type Value: MatrixElement;

    fn nrow(&self) -> usize;

    fn ncol(&self) -> usize;

    /// Whether the payload is compressed by row (CSR) rather than by column
    fn is_csr(&self) -> bool;

    /// Write the compressed values, indices and pointers of the payload
    ///
    /// Indices within each compressed line must be strictly increasing.
    fn inflate(
        &self,
        values: &mut Vec<Self::Value>,
        indices: &mut Vec<usize>,
        pointers: &mut Vec<usize>,
    ) -> Result<()>;
}

/// Dense payload held as an owned vector
#[derive(Debug, Clone, PartialEq)]
pub struct DenseVecBlob<V> {
    nrow: usize,
    ncol: usize,
    row_major: bool,
    data: Vec<V>,
}

impl<V: MatrixElement> DenseVecBlob<V> {
    pub fn new(nrow: usize, ncol: usize, row_major: bool, data: Vec<V>) -> Result<Self> {
        if data.len() != nrow * ncol {
            return Err(ChunkError::ChunkDimensionMismatch.into());
        }
        Ok(Self {
            nrow,
            ncol,
            row_major,
            data,
        })
    }
}

impl<V: MatrixElement> DenseBlob for DenseVecBlob<V> {
    type Value = V;

    fn nrow(&self) -> usize {
        self.nrow
    }

    fn ncol(&self) -> usize {
        self.ncol
    }

    fn is_row_major(&self) -> bool {
        self.row_major
    }

    fn inflate(&self, buffer: &mut Vec<V>) -> Result<()> {
        buffer.clear();
        buffer.extend_from_slice(&self.data);
        Ok(())
    }
}

/// Dense payload kept as raw bytes and decoded on every inflation
///
/// Stands in for a chunk that is compressed in memory. Values are stored
/// in native byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseBytesBlob<V> {
    nrow: usize,
    ncol: usize,
    row_major: bool,
    bytes: Vec<u8>,
    _marker: core::marker::PhantomData<fn() -> V>,
}

impl<V: MatrixElement + bytemuck::Pod> DenseBytesBlob<V> {
    /// Encode `values` as bytes
    pub fn encode(nrow: usize, ncol: usize, row_major: bool, values: &[V]) -> Result<Self> {
        if values.len() != nrow * ncol {
            return Err(ChunkError::ChunkDimensionMismatch.into());
        }
        Ok(Self::from_bytes(
            nrow,
            ncol,
            row_major,
            bytemuck::cast_slice(values).to_vec(),
        ))
    }

    /// Wrap bytes without checking them; malformed payloads fail on inflation
    pub fn from_bytes(nrow: usize, ncol: usize, row_major: bool, bytes: Vec<u8>) -> Self {
        Self {
            nrow,
            ncol,
            row_major,
            bytes,
            _marker: core::marker::PhantomData,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<V: MatrixElement + bytemuck::Pod> DenseBlob for DenseBytesBlob<V> {
    type Value = V;

    fn nrow(&self) -> usize {
        self.nrow
    }

    fn ncol(&self) -> usize {
        self.ncol
    }

    fn is_row_major(&self) -> bool {
        self.row_major
    }

    fn inflate(&self, buffer: &mut Vec<V>) -> Result<()> {
        let size = core::mem::size_of::<V>();
        if size == 0 || self.bytes.len() % size != 0 || self.bytes.len() / size != self.nrow * self.ncol {
            return Err(ChunkError::InvalidChunkData.into());
        }
        buffer.clear();
        buffer.extend(
            self.bytes
                .chunks_exact(size)
                .map(bytemuck::pod_read_unaligned::<V>),
        );
        Ok(())
    }
}

/// Compressed sparse payload held as owned vectors
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVecBlob<V> {
    nrow: usize,
    ncol: usize,
    csr: bool,
    values: Vec<V>,
    indices: Vec<usize>,
    pointers: Vec<usize>,
}

impl<V: MatrixElement> SparseVecBlob<V> {
    /// Validate and wrap a compressed sparse payload
    ///
    /// `pointers` has one entry more than the number of compressed lines,
    /// and the indices of each line must be strictly increasing.
    pub fn new(
        nrow: usize,
        ncol: usize,
        csr: bool,
        values: Vec<V>,
        indices: Vec<usize>,
        pointers: Vec<usize>,
    ) -> Result<Self> {
        let (primary, secondary) = if csr { (nrow, ncol) } else { (ncol, nrow) };
        if pointers.len() != primary + 1
            || pointers.first() != Some(&0)
            || pointers.last() != Some(&values.len())
            || values.len() != indices.len()
            || pointers.windows(2).any(|w| w[0] > w[1])
        {
            return Err(ChunkError::InvalidChunkData.into());
        }
        for line in pointers.windows(2) {
            chunkmat_core::validate_indices(&indices[line[0]..line[1]], secondary)?;
        }
        Ok(Self {
            nrow,
            ncol,
            csr,
            values,
            indices,
            pointers,
        })
    }

    /// Compress a dense row-major buffer, keeping every non-zero value
    pub fn from_dense(nrow: usize, ncol: usize, csr: bool, dense: &[V]) -> Result<Self> {
        if dense.len() != nrow * ncol {
            return Err(ChunkError::ChunkDimensionMismatch.into());
        }
        let (primary, secondary) = if csr { (nrow, ncol) } else { (ncol, nrow) };
        let mut values = Vec::new();
        let mut indices = Vec::new();
        let mut pointers = Vec::with_capacity(primary + 1);
        pointers.push(0);
        for p in 0..primary {
            for s in 0..secondary {
                let v = if csr { dense[p * ncol + s] } else { dense[s * ncol + p] };
                if v != V::zero() {
                    values.push(v);
                    indices.push(s);
                }
            }
            pointers.push(values.len());
        }
        Ok(Self {
            nrow,
            ncol,
            csr,
            values,
            indices,
            pointers,
        })
    }

    /// Number of stored non-zeros
    pub fn nnz(&self) -> usize {
        self.values.len()
    }
}

impl<V: MatrixElement> SparseBlob for SparseVecBlob<V> {
    type Value = V;

    fn nrow(&self) -> usize {
        self.nrow
    }

    fn ncol(&self) -> usize {
        self.ncol
    }

    fn is_csr(&self) -> bool {
        self.csr
    }

    fn inflate(
        &self,
        values: &mut Vec<V>,
        indices: &mut Vec<usize>,
        pointers: &mut Vec<usize>,
    ) -> Result<()> {
        values.clear();
        values.extend_from_slice(&self.values);
        indices.clear();
        indices.extend_from_slice(&self.indices);
        pointers.clear();
        pointers.extend_from_slice(&self.pointers);
        Ok(())
    }
}
