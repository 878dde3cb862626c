// Chunk allocator backing every packet in a MultiBuffer.
// One flat byte arena split into fixed-size chunks, linked by u32 indices.

mod debug;
mod getters;

/// Marks the end of a chunk chain or an empty free list.
const NIL: u32 = u32::MAX;

/// Non-owning reference to one chunk in a [`ChunkPool`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkHandle(pub(crate) u32);

impl ChunkHandle {
    /// Position of this chunk inside the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-capacity pool of equally sized chunks.
///
/// The pool owns the only free list in the system. A chunk is either on that
/// list or linked into exactly one packet's chain; the pool tracks which via
/// a per-chunk flag so that a double free is caught at the call site.
pub struct ChunkPool {
    /// Backing storage, `chunk_count * chunk_size` bytes.
    data: Box<[u8]>,
    /// Singly linked "next" pointer for every chunk, shared by the free list
    /// and by packet chains.
    links: Box<[u32]>,
    /// True while the chunk sits on the free list.
    is_free: Box<[bool]>,
    free_head: u32,
    free_count: usize,
    chunk_size: usize,
}

impl ChunkPool {
    /// Create a pool of `chunk_count` chunks of `chunk_size` bytes each.
    /// All chunks start on the free list, in ascending order.
    pub fn new(chunk_count: u32, chunk_size: usize) -> Self {
        let count = chunk_count as usize;
        let links: Box<[u32]> = (0..chunk_count)
            .map(|i| if i + 1 < chunk_count { i + 1 } else { NIL })
            .collect();

        Self {
            data: vec![0u8; count * chunk_size].into_boxed_slice(),
            links,
            is_free: vec![true; count].into_boxed_slice(),
            free_head: if chunk_count > 0 { 0 } else { NIL },
            free_count: count,
            chunk_size,
        }
    }

    /// Pop one chunk off the free list, or `None` when the pool is exhausted.
    /// Exhaustion is ordinary back-pressure, not an error.
    pub fn alloc_chunk(&mut self) -> Option<ChunkHandle> {
        if self.free_head == NIL {
            tracing::trace!(chunk_size = self.chunk_size, "chunk pool exhausted");
            return None;
        }
        let idx = self.free_head;
        self.free_head = self.links[idx as usize];
        self.links[idx as usize] = NIL;
        self.is_free[idx as usize] = false;
        self.free_count -= 1;
        Some(ChunkHandle(idx))
    }

    /// Return a chunk to the free list.
    ///
    /// # Panics
    /// Panics if the chunk is already free or does not belong to this pool.
    /// Either case means the caller's bookkeeping is corrupt.
    pub fn free_chunk(&mut self, chunk: ChunkHandle) {
        let idx = chunk.index();
        assert!(idx < self.is_free.len(), "chunk {idx} out of range");
        assert!(!self.is_free[idx], "double free of chunk {idx}");
        self.is_free[idx] = true;
        self.links[idx] = self.free_head;
        self.free_head = chunk.0;
        self.free_count += 1;
    }

    /// Free every chunk of a chain starting at `head`. Returns the number of
    /// chunks released.
    pub fn free_chain(&mut self, head: Option<ChunkHandle>) -> usize {
        let mut count = 0;
        let mut next = head;
        while let Some(chunk) = next {
            next = self.next(chunk);
            self.free_chunk(chunk);
            count += 1;
        }
        count
    }

    /// Link `next` after `prev` in a packet chain.
    pub fn link(&mut self, prev: ChunkHandle, next: ChunkHandle) {
        self.links[prev.index()] = next.0;
    }

    /// Follow a packet chain one step.
    pub fn next(&self, chunk: ChunkHandle) -> Option<ChunkHandle> {
        match self.links[chunk.index()] {
            NIL => None,
            idx => Some(ChunkHandle(idx)),
        }
    }

    /// Read-only view of one chunk's storage.
    pub fn chunk(&self, chunk: ChunkHandle) -> &[u8] {
        let start = chunk.index() * self.chunk_size;
        &self.data[start..start + self.chunk_size]
    }

    /// Mutable view of one chunk's storage. Only the writer that holds the
    /// chunk may call this.
    pub fn chunk_mut(&mut self, chunk: ChunkHandle) -> &mut [u8] {
        let start = chunk.index() * self.chunk_size;
        &mut self.data[start..start + self.chunk_size]
    }

    /// Remaining capacity: free chunk count times chunk size.
    pub fn get_free_bytes(&self) -> usize {
        self.free_count * self.chunk_size
    }

    /// Structural self-check of the free list alone.
    pub fn consistency(&self) -> bool {
        self.consistency_with(std::iter::empty())
    }

    /// Structural self-check covering the free list and every chain in
    /// `chains` (one head per live packet).
    ///
    /// Passes only if every chunk is visited exactly once across all of them,
    /// the free flags agree with list membership, and the free count matches.
    /// O(n) in the number of chunks; meant for tests and periodic assertions.
    pub fn consistency_with<I>(&self, chains: I) -> bool
    where
        I: IntoIterator<Item = Option<ChunkHandle>>,
    {
        let total = self.links.len();
        let mut seen = vec![false; total];

        // Walk the free list. A loop shows up as a revisited chunk.
        let mut free_seen = 0;
        let mut cursor = self.free_head;
        while cursor != NIL {
            let idx = cursor as usize;
            if idx >= total || seen[idx] || !self.is_free[idx] {
                return false;
            }
            seen[idx] = true;
            free_seen += 1;
            cursor = self.links[idx];
        }
        if free_seen != self.free_count {
            return false;
        }

        let mut used_seen = 0;
        for head in chains {
            let mut next = head;
            while let Some(chunk) = next {
                let idx = chunk.index();
                if idx >= total || seen[idx] || self.is_free[idx] {
                    return false;
                }
                seen[idx] = true;
                used_seen += 1;
                next = self.next(chunk);
            }
        }

        free_seen + used_seen == total
    }
}
