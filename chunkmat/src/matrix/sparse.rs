//! Sparse chunked matrices

use std::sync::Arc;

use chunkmat_core::{validate_index_count, ChunkDimensionStats, MatrixElement, Oracle, SlabCacheStats};

use super::{Densifier, DenseExtractor, Matrix, Selection, SoloCursor, SparseExtractor, SparseRange};
use crate::cache::LruSlabCache;
use crate::chunk::SparseChunk;
use crate::config::{ChunkedMatrixOptions, ExtractOptions};
use crate::coordinator::sparse::SparseFetchWork;
use crate::coordinator::{ChunkCoordinator, OracularCache};
use crate::error::Result;
use crate::slab::{SparseSlab, SparseSlabFactory, SparseSlabMut};

/// Matrix of sparse chunks laid out on a regular grid
pub struct ChunkedSparseMatrix<C: SparseChunk> {
    coordinator: ChunkCoordinator<C>,
    cache_size_in_bytes: usize,
    require_minimum_cache: bool,
}

impl<C: SparseChunk> ChunkedSparseMatrix<C> {
    /// Build a matrix from `chunks`, ordered row-major over the chunk grid
    /// if `row_major` and column-major otherwise
    pub fn new(
        nrow: usize,
        ncol: usize,
        chunk_nrow: usize,
        chunk_ncol: usize,
        chunks: Vec<C>,
        row_major: bool,
        options: &ChunkedMatrixOptions,
    ) -> Result<Self> {
        let coordinator = ChunkCoordinator::new(
            ChunkDimensionStats::new(nrow, chunk_nrow),
            ChunkDimensionStats::new(ncol, chunk_ncol),
            chunks,
            row_major,
        )?;
        Ok(Self {
            coordinator,
            cache_size_in_bytes: options.resolved_cache_size(),
            require_minimum_cache: options.require_minimum_cache,
        })
    }

    pub fn coordinator(&self) -> &ChunkCoordinator<C> {
        &self.coordinator
    }

    fn core(
        &self,
        row: bool,
        oracle: Option<Arc<dyn Oracle>>,
        selection: Selection,
        needs_value: bool,
        needs_index: bool,
    ) -> Result<SparseCore<'_, C>> {
        let coordinator = &self.coordinator;
        let extent = coordinator.secondary_dim(row);
        selection.validate(extent)?;
        let length = selection.len(extent);

        let mut element_size = 0;
        if needs_value {
            element_size += C::Value::size_bytes();
        }
        if needs_index {
            element_size += std::mem::size_of::<usize>();
        }
        let target_length = coordinator.primary_chunkdim(row);
        let stats = SlabCacheStats::with_bytes(
            target_length,
            length,
            coordinator.num_primary_chunks(row),
            self.cache_size_in_bytes,
            element_size,
            self.require_minimum_cache,
        );
        let max_slabs = stats.max_slabs_in_cache;
        let mode = if max_slabs == 0 {
            SparseMode::Solo(SoloCursor::new(oracle))
        } else if let Some(oracle) = oracle {
            SparseMode::Oracular(OracularCache::new(oracle, max_slabs, C::USE_SUBSET))
        } else {
            SparseMode::Myopic(LruSlabCache::new(max_slabs))
        };
        tracing::debug!(
            row,
            selection = selection.kind(),
            path = mode.name(),
            max_slabs,
            slab_size = stats.slab_size_in_elements,
            needs_value,
            needs_index,
            "created sparse extractor"
        );

        Ok(SparseCore {
            coordinator,
            row,
            selection,
            extent,
            length,
            needs_value,
            needs_index,
            work: SparseFetchWork::default(),
            factory: SparseSlabFactory::from_stats(target_length, length, &stats, needs_value, needs_index),
            mode,
        })
    }
}

enum SparseMode {
    Solo(SoloCursor),
    Myopic(LruSlabCache<SparseSlab>),
    Oracular(OracularCache<SparseSlab>),
}

impl SparseMode {
    fn name(&self) -> &'static str {
        match self {
            SparseMode::Solo(_) => "solo",
            SparseMode::Myopic(_) => "myopic",
            SparseMode::Oracular(_) => "oracular",
        }
    }
}

struct SparseCore<'a, C: SparseChunk> {
    coordinator: &'a ChunkCoordinator<C>,
    row: bool,
    selection: Selection,
    extent: usize,
    length: usize,
    needs_value: bool,
    needs_index: bool,
    work: SparseFetchWork<C>,
    factory: SparseSlabFactory<C::Value>,
    mode: SparseMode,
}

impl<C: SparseChunk> SparseExtractor<C::Value> for SparseCore<'_, C> {
    fn fetch<'b>(
        &'b mut self,
        i: usize,
        value_buffer: &'b mut [C::Value],
        index_buffer: &'b mut [usize],
    ) -> Result<SparseRange<'b, C::Value>> {
        let SparseCore {
            coordinator,
            row,
            selection,
            extent,
            length,
            needs_value,
            needs_index,
            work,
            factory,
            mode,
        } = self;
        let non_target = selection.as_non_target(*extent);
        let (length, needs_value, needs_index) = (*length, *needs_value, *needs_index);

        let (slab, offset) = match mode {
            SparseMode::Solo(cursor) => {
                let i = cursor.next(i)?;
                if needs_value {
                    validate_index_count(value_buffer.len(), length)?;
                }
                if needs_index {
                    validate_index_count(index_buffer.len(), length)?;
                }
                let mut number = [0];
                {
                    let values = if needs_value {
                        Some(&mut value_buffer[..length])
                    } else {
                        None
                    };
                    let indices = if needs_index {
                        Some(&mut index_buffer[..length])
                    } else {
                        None
                    };
                    let mut output = SparseSlabMut::new(values, indices, &mut number, length);
                    coordinator.fetch_sparse_single(*row, i, non_target, work, &mut output)?;
                }
                let number = number[0];
                return Ok(SparseRange {
                    number,
                    values: if needs_value {
                        Some(&value_buffer[..number])
                    } else {
                        None
                    },
                    indices: if needs_index {
                        Some(&index_buffer[..number])
                    } else {
                        None
                    },
                });
            }
            SparseMode::Myopic(cache) => coordinator.fetch_sparse_myopic(*row, i, non_target, work, factory, cache)?,
            SparseMode::Oracular(cache) => coordinator.fetch_sparse_oracular(*row, non_target, work, factory, cache)?,
        };
        let factory: &'b SparseSlabFactory<C::Value> = factory;
        let view = factory.view(slab);
        Ok(SparseRange {
            number: view.number(offset),
            values: view.values(offset),
            indices: view.indices(offset),
        })
    }
}

/// Zero-fills the selection and scatters the non-zeros of a sparse matrix
struct DensifiedCore<'a, C: SparseChunk> {
    core: SparseCore<'a, C>,
    densifier: Densifier,
    values: Vec<C::Value>,
    indices: Vec<usize>,
}

impl<'a, C: SparseChunk> DensifiedCore<'a, C> {
    fn new(core: SparseCore<'a, C>) -> Self {
        Self {
            densifier: Densifier::new(&core.selection),
            values: vec![C::Value::zero(); core.length],
            indices: vec![0; core.length],
            core,
        }
    }
}

impl<C: SparseChunk> DenseExtractor<C::Value> for DensifiedCore<'_, C> {
    fn fetch<'b>(&'b mut self, i: usize, buffer: &'b mut [C::Value]) -> Result<&'b [C::Value]> {
        let DensifiedCore {
            core,
            densifier,
            values,
            indices,
        } = self;
        let length = core.length;
        validate_index_count(buffer.len(), length)?;
        let range = core.fetch(i, values, indices)?;
        densifier.scatter(
            range.values.unwrap_or_default(),
            range.indices.unwrap_or_default(),
            &mut buffer[..length],
        );
        Ok(&buffer[..length])
    }
}

impl<C: SparseChunk> Matrix for ChunkedSparseMatrix<C> {
    type Element = C::Value;

    fn nrow(&self) -> usize {
        self.coordinator.nrow()
    }

    fn ncol(&self) -> usize {
        self.coordinator.ncol()
    }

    fn is_sparse(&self) -> bool {
        true
    }

    fn prefer_rows(&self) -> bool {
        self.coordinator.prefer_rows()
    }

    fn dense(
        &self,
        row: bool,
        selection: Selection,
        _options: &ExtractOptions,
    ) -> Result<Box<dyn DenseExtractor<C::Value> + '_>> {
        let core = self.core(row, None, selection, true, true)?;
        Ok(Box::new(DensifiedCore::new(core)))
    }

    fn dense_oracular(
        &self,
        row: bool,
        oracle: Arc<dyn Oracle>,
        selection: Selection,
        _options: &ExtractOptions,
    ) -> Result<Box<dyn DenseExtractor<C::Value> + '_>> {
        let core = self.core(row, Some(oracle), selection, true, true)?;
        Ok(Box::new(DensifiedCore::new(core)))
    }

    // Chunks always report indices in increasing order, so
    // `sparse_ordered_index` needs no extra work.
    fn sparse(
        &self,
        row: bool,
        selection: Selection,
        options: &ExtractOptions,
    ) -> Result<Box<dyn SparseExtractor<C::Value> + '_>> {
        let core = self.core(
            row,
            None,
            selection,
            options.sparse_extract_value,
            options.sparse_extract_index,
        )?;
        Ok(Box::new(core))
    }

    fn sparse_oracular(
        &self,
        row: bool,
        oracle: Arc<dyn Oracle>,
        selection: Selection,
        options: &ExtractOptions,
    ) -> Result<Box<dyn SparseExtractor<C::Value> + '_>> {
        let core = self.core(
            row,
            Some(oracle),
            selection,
            options.sparse_extract_value,
            options.sparse_extract_index,
        )?;
        Ok(Box::new(core))
    }
}
