//! Least-recently-used slab cache

use chunkmat_core::ChunkError;
use hashbrown::HashMap;

#[derive(Debug)]
struct Node<S> {
    slab: S,
    id: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Fixed-capacity cache that evicts the least recently used slab on a miss
///
/// Nodes live in a vector and are linked by position, so the recency list
/// can be spliced in constant time and the cache can be moved freely.
/// The list runs from the least recently used slab at the head to the most
/// recently used at the tail.
#[derive(Debug)]
pub struct LruSlabCache<S> {
    max_slabs: usize,
    nodes: Vec<Node<S>>,
    head: Option<usize>,
    tail: Option<usize>,
    map: HashMap<usize, usize>,
    last_id: usize,
    last_node: Option<usize>,
}

impl<S> LruSlabCache<S> {
    pub fn new(max_slabs: usize) -> Self {
        Self {
            max_slabs,
            nodes: Vec::with_capacity(max_slabs),
            head: None,
            tail: None,
            map: HashMap::with_capacity(max_slabs),
            last_id: 0,
            last_node: None,
        }
    }

    pub fn max_slabs(&self) -> usize {
        self.max_slabs
    }

    /// Number of slabs currently cached
    pub fn num_slabs(&self) -> usize {
        self.nodes.len()
    }

    /// Cached ids from most to least recently used
    pub fn ids(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.tail;
        while let Some(node) = cursor {
            out.push(self.nodes[node].id);
            cursor = self.nodes[node].prev;
        }
        out
    }

    /// Fetch the slab for `id`, populating a slab on a miss
    ///
    /// `create` is called at most `max_slabs` times over the lifetime of the
    /// cache. `populate` is called exactly once per miss, with the slab that
    /// now belongs to `id`. If `populate` fails, the cache must not be used
    /// again.
    pub fn find<C, E, Cr, P>(
        &mut self,
        id: usize,
        ctx: &mut C,
        create: Cr,
        populate: P,
    ) -> Result<&S, E>
    where
        E: From<ChunkError>,
        Cr: FnOnce(&mut C) -> S,
        P: FnOnce(&mut C, usize, &mut S) -> Result<(), E>,
    {
        if let Some(node) = self.last_node {
            if id == self.last_id {
                return Ok(&self.nodes[node].slab);
            }
        }
        if self.max_slabs == 0 {
            return Err(ChunkError::CacheMisuse.into());
        }
        self.last_id = id;

        if let Some(&node) = self.map.get(&id) {
            self.move_to_tail(node);
            self.last_node = Some(node);
            return Ok(&self.nodes[node].slab);
        }

        let node = if self.nodes.len() < self.max_slabs {
            let node = self.nodes.len();
            self.nodes.push(Node {
                slab: create(ctx),
                id,
                prev: None,
                next: None,
            });
            self.push_tail(node);
            node
        } else {
            // Capacity is non-zero and reached, so the list has a head.
            let node = self.head.ok_or(ChunkError::CacheMisuse)?;
            let evicted = self.nodes[node].id;
            tracing::trace!(evicted, replacement = id, "evicting slab");
            self.map.remove(&evicted);
            self.nodes[node].id = id;
            self.move_to_tail(node);
            node
        };

        self.map.insert(id, node);
        // Only remember the slab once it is fully populated.
        self.last_node = None;
        populate(ctx, id, &mut self.nodes[node].slab)?;
        self.last_node = Some(node);
        Ok(&self.nodes[node].slab)
    }

    fn unlink(&mut self, node: usize) {
        let (prev, next) = (self.nodes[node].prev, self.nodes[node].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[node].prev = None;
        self.nodes[node].next = None;
    }

    fn push_tail(&mut self, node: usize) {
        self.nodes[node].prev = self.tail;
        self.nodes[node].next = None;
        match self.tail {
            Some(t) => self.nodes[t].next = Some(node),
            None => self.head = Some(node),
        }
        self.tail = Some(node);
    }

    fn move_to_tail(&mut self, node: usize) {
        if self.tail != Some(node) {
            self.unlink(node);
            self.push_tail(node);
        }
    }
}
