//! Dense chunked matrices

use std::sync::Arc;

use chunkmat_core::{ChunkDimensionStats, MatrixElement, Oracle, SlabCacheStats};

use super::{DenseExtractor, Matrix, Selection, SoloCursor, SparseExtractor, SparseRange};
use crate::cache::LruSlabCache;
use crate::chunk::DenseChunk;
use crate::config::{ChunkedMatrixOptions, ExtractOptions};
use crate::coordinator::dense::DenseFetchWork;
use crate::coordinator::{ChunkCoordinator, OracularCache};
use crate::error::Result;
use crate::slab::{DenseSlab, DenseSlabFactory};

/// Matrix of dense chunks laid out on a regular grid
pub struct ChunkedDenseMatrix<C: DenseChunk> {
    coordinator: ChunkCoordinator<C>,
    cache_size_in_bytes: usize,
    require_minimum_cache: bool,
}

impl<C: DenseChunk> ChunkedDenseMatrix<C> {
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

    fn core(&self, row: bool, oracle: Option<Arc<dyn Oracle>>, selection: Selection) -> Result<DenseCore<'_, C>> {
        let coordinator = &self.coordinator;
        let extent = coordinator.secondary_dim(row);
        selection.validate(extent)?;
        let length = selection.len(extent);

        let stats = SlabCacheStats::with_bytes(
            coordinator.primary_chunkdim(row),
            length,
            coordinator.num_primary_chunks(row),
            self.cache_size_in_bytes,
            C::Value::size_bytes(),
            self.require_minimum_cache,
        );
        let max_slabs = stats.max_slabs_in_cache;
        let mode = if max_slabs == 0 {
            DenseMode::Solo(SoloCursor::new(oracle))
        } else if let Some(oracle) = oracle {
            DenseMode::Oracular(OracularCache::new(oracle, max_slabs, C::USE_SUBSET))
        } else {
            DenseMode::Myopic(LruSlabCache::new(max_slabs))
        };
        tracing::debug!(
            row,
            selection = selection.kind(),
            path = mode.name(),
            max_slabs,
            slab_size = stats.slab_size_in_elements,
            "created dense extractor"
        );

        Ok(DenseCore {
            coordinator,
            row,
            selection,
            extent,
            length,
            work: DenseFetchWork::default(),
            factory: DenseSlabFactory::from_stats(&stats),
            mode,
        })
    }
}

enum DenseMode {
    Solo(SoloCursor),
    Myopic(LruSlabCache<DenseSlab>),
    Oracular(OracularCache<DenseSlab>),
}

impl DenseMode {
    fn name(&self) -> &'static str {
        match self {
            DenseMode::Solo(_) => "solo",
            DenseMode::Myopic(_) => "myopic",
            DenseMode::Oracular(_) => "oracular",
        }
    }
}

struct DenseCore<'a, C: DenseChunk> {
    coordinator: &'a ChunkCoordinator<C>,
    row: bool,
    selection: Selection,
    extent: usize,
    length: usize,
    work: DenseFetchWork<C>,
    factory: DenseSlabFactory<C::Value>,
    mode: DenseMode,
}

impl<C: DenseChunk> DenseExtractor<C::Value> for DenseCore<'_, C> {
    fn fetch<'b>(&'b mut self, i: usize, buffer: &'b mut [C::Value]) -> Result<&'b [C::Value]> {
        let DenseCore {
            coordinator,
            row,
            selection,
            extent,
            length,
            work,
            factory,
            mode,
        } = self;
        let non_target = selection.as_non_target(*extent);
        let (slab, offset) = match mode {
            DenseMode::Solo(cursor) => {
                let i = cursor.next(i)?;
                coordinator.fetch_dense_single(*row, i, non_target, work, buffer)?;
                return Ok(&buffer[..*length]);
            }
            DenseMode::Myopic(cache) => coordinator.fetch_dense_myopic(*row, i, non_target, work, factory, cache)?,
            DenseMode::Oracular(cache) => coordinator.fetch_dense_oracular(*row, non_target, work, factory, cache)?,
        };
        let factory: &'b DenseSlabFactory<C::Value> = factory;
        let start = offset * *length;
        Ok(&factory.view(slab)[start..start + *length])
    }
}

/// Reports every selected value of a dense matrix as a structural non-zero
struct SparsifiedCore<'a, C: DenseChunk> {
    core: DenseCore<'a, C>,
    holding: Vec<C::Value>,
    positions: Vec<usize>,
    needs_value: bool,
    needs_index: bool,
}

impl<'a, C: DenseChunk> SparsifiedCore<'a, C> {
    fn new(core: DenseCore<'a, C>, options: &ExtractOptions) -> Self {
        Self {
            holding: vec![C::Value::zero(); core.length],
            positions: core.selection.positions(core.extent),
            needs_value: options.sparse_extract_value,
            needs_index: options.sparse_extract_index,
            core,
        }
    }
}

impl<C: DenseChunk> SparseExtractor<C::Value> for SparsifiedCore<'_, C> {
    fn fetch<'b>(
        &'b mut self,
        i: usize,
        _value_buffer: &'b mut [C::Value],
        _index_buffer: &'b mut [usize],
    ) -> Result<SparseRange<'b, C::Value>> {
        let SparsifiedCore {
            core,
            holding,
            positions,
            needs_value,
            needs_index,
        } = self;
        let values = core.fetch(i, holding)?;
        Ok(SparseRange {
            number: positions.len(),
            values: needs_value.then_some(values),
            indices: needs_index.then_some(positions.as_slice()),
        })
    }
}

impl<C: DenseChunk> Matrix for ChunkedDenseMatrix<C> {
    type Element = C::Value;

    fn nrow(&self) -> usize {
        self.coordinator.nrow()
    }

    fn ncol(&self) -> usize {
        self.coordinator.ncol()
    }

    fn is_sparse(&self) -> bool {
        false
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
        Ok(Box::new(self.core(row, None, selection)?))
    }

    fn dense_oracular(
        &self,
        row: bool,
        oracle: Arc<dyn Oracle>,
        selection: Selection,
        _options: &ExtractOptions,
    ) -> Result<Box<dyn DenseExtractor<C::Value> + '_>> {
        Ok(Box::new(self.core(row, Some(oracle), selection)?))
    }

    fn sparse(
        &self,
        row: bool,
        selection: Selection,
        options: &ExtractOptions,
    ) -> Result<Box<dyn SparseExtractor<C::Value> + '_>> {
        let core = self.core(row, None, selection)?;
        Ok(Box::new(SparsifiedCore::new(core, options)))
    }

    fn sparse_oracular(
        &self,
        row: bool,
        oracle: Arc<dyn Oracle>,
        selection: Selection,
        options: &ExtractOptions,
    ) -> Result<Box<dyn SparseExtractor<C::Value> + '_>> {
        let core = self.core(row, Some(oracle), selection)?;
        Ok(Box::new(SparsifiedCore::new(core, options)))
    }
}
