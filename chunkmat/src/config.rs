//! Options for chunked matrices, extractors and statistics

/// Environment variable consulted when no cache size is configured
pub const CACHE_SIZE_ENV: &str = "CHUNKMAT_MAXIMUM_CACHE_SIZE";

/// Cache size in bytes used when neither the options nor the environment set one
pub const DEFAULT_MAXIMUM_CACHE_SIZE: usize = 100_000_000;

/// Options for a chunked matrix
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChunkedMatrixOptions {
    /// Slab cache budget per extractor, in bytes. `None` defers to the
    /// environment and then to [`DEFAULT_MAXIMUM_CACHE_SIZE`].
    pub maximum_cache_size: Option<usize>,
    /// Keep at least one slab even when the budget is smaller than a slab
    pub require_minimum_cache: bool,
}

impl ChunkedMatrixOptions {
    /// Set the cache budget in bytes
    pub fn with_maximum_cache_size(mut self, bytes: usize) -> Self {
        self.maximum_cache_size = Some(bytes);
        self
    }

    /// Set whether a single slab is always kept
    pub fn with_require_minimum_cache(mut self, require: bool) -> Self {
        self.require_minimum_cache = require;
        self
    }

    /// Resolve the cache budget in bytes
    pub fn resolved_cache_size(&self) -> usize {
        if let Some(size) = self.maximum_cache_size {
            return size;
        }
        match std::env::var(CACHE_SIZE_ENV) {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(size) => size,
                Err(_) => {
                    tracing::warn!(
                        variable = CACHE_SIZE_ENV,
                        value = %raw,
                        "ignoring unparsable cache size"
                    );
                    DEFAULT_MAXIMUM_CACHE_SIZE
                }
            },
            Err(_) => DEFAULT_MAXIMUM_CACHE_SIZE,
        }
    }

    /// Parse options from JSON, filling missing fields with defaults
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for ChunkedMatrixOptions {
    fn default() -> Self {
        Self {
            maximum_cache_size: None,
            require_minimum_cache: true,
        }
    }
}

/// Per-extractor options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExtractOptions {
    /// Report the values of structural non-zeros
    pub sparse_extract_value: bool,
    /// Report the indices of structural non-zeros
    pub sparse_extract_index: bool,
    /// Indices of structural non-zeros must be increasing
    pub sparse_ordered_index: bool,
}

impl ExtractOptions {
    pub fn with_sparse_extract_value(mut self, extract: bool) -> Self {
        self.sparse_extract_value = extract;
        self
    }

    pub fn with_sparse_extract_index(mut self, extract: bool) -> Self {
        self.sparse_extract_index = extract;
        self
    }

    pub fn with_sparse_ordered_index(mut self, ordered: bool) -> Self {
        self.sparse_ordered_index = ordered;
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            sparse_extract_value: true,
            sparse_extract_index: true,
            sparse_ordered_index: true,
        }
    }
}

/// Options shared by every statistic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StatsOptions {
    /// Exclude NaN observations instead of letting them propagate
    pub skip_nan: bool,
    /// Number of worker threads
    pub num_threads: usize,
}

impl StatsOptions {
    pub fn with_skip_nan(mut self, skip_nan: bool) -> Self {
        self.skip_nan = skip_nan;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            skip_nan: false,
            num_threads: 1,
        }
    }
}
