//! Sizing of slab caches from a memory budget

/// Slab size and cache capacity for one extractor
///
/// A slab holds every target element of one chunk, restricted to the
/// requested non-target selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabCacheStats {
    /// Number of elements in a single slab
    pub slab_size_in_elements: usize,
    /// Number of slabs that fit in the cache
    pub max_slabs_in_cache: usize,
}

impl SlabCacheStats {
    /// Size the cache from a budget counted in elements
    pub const fn new(
        target_length: usize,
        non_target_length: usize,
        target_num_slabs: usize,
        cache_size_in_elements: usize,
        require_minimum_cache: bool,
    ) -> Self {
        let slab_size_in_elements = target_length * non_target_length;
        Self {
            slab_size_in_elements,
            max_slabs_in_cache: compute_max_slabs_in_cache(
                slab_size_in_elements,
                target_num_slabs,
                cache_size_in_elements,
                require_minimum_cache,
            ),
        }
    }

    /// Size the cache from a budget counted in bytes
    ///
    /// An `element_size` of zero means slabs cost nothing, so every slab
    /// along the target dimension is allowed.
    pub const fn with_bytes(
        target_length: usize,
        non_target_length: usize,
        target_num_slabs: usize,
        cache_size_in_bytes: usize,
        element_size: usize,
        require_minimum_cache: bool,
    ) -> Self {
        let slab_size_in_elements = target_length * non_target_length;
        let max_slabs_in_cache = if element_size == 0 {
            target_num_slabs
        } else {
            compute_max_slabs_in_cache(
                slab_size_in_elements,
                target_num_slabs,
                cache_size_in_bytes / element_size,
                require_minimum_cache,
            )
        };
        Self {
            slab_size_in_elements,
            max_slabs_in_cache,
        }
    }
}

const fn compute_max_slabs_in_cache(
    slab_size_in_elements: usize,
    num_slabs: usize,
    cache_size_in_elements: usize,
    require_minimum_cache: bool,
) -> usize {
    if slab_size_in_elements == 0 {
        return num_slabs;
    }
    let tmp = cache_size_in_elements / slab_size_in_elements;
    if tmp == 0 && require_minimum_cache {
        return 1;
    }
    if tmp < num_slabs {
        tmp
    } else {
        num_slabs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_budget() {
        let stats = SlabCacheStats::new(10, 20, 5, 1000, false);
        assert_eq!(stats.slab_size_in_elements, 200);
        assert_eq!(stats.max_slabs_in_cache, 5);

        let stats = SlabCacheStats::new(10, 20, 50, 1000, false);
        assert_eq!(stats.max_slabs_in_cache, 5);
    }

    #[test]
    fn test_minimum_cache() {
        assert_eq!(SlabCacheStats::new(10, 20, 5, 100, false).max_slabs_in_cache, 0);
        assert_eq!(SlabCacheStats::new(10, 20, 5, 100, true).max_slabs_in_cache, 1);
    }

    #[test]
    fn test_empty_slabs() {
        let stats = SlabCacheStats::new(10, 0, 7, 0, false);
        assert_eq!(stats.slab_size_in_elements, 0);
        assert_eq!(stats.max_slabs_in_cache, 7);
    }

    #[test]
    fn test_byte_budget() {
        let stats = SlabCacheStats::with_bytes(10, 20, 50, 8000, 8, false);
        assert_eq!(stats.max_slabs_in_cache, 5);

        let stats = SlabCacheStats::with_bytes(10, 20, 50, 8000, 0, false);
        assert_eq!(stats.max_slabs_in_cache, 50);

        let stats = SlabCacheStats::with_bytes(10, 20, 50, 100, 16, true);
        assert_eq!(stats.max_slabs_in_cache, 1);
    }
}
