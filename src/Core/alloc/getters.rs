use super::*;

/// Getter methods for ChunkPool
///
/// These expose sizing and occupancy for monitoring, and are used by the
/// MultiBuffer when it computes write space and capacity.
impl ChunkPool {
    /// Size of one chunk in bytes.
    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Total number of chunks in the arena.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.links.len()
    }

    /// Number of chunks currently on the free list.
    #[inline]
    pub fn free_chunks(&self) -> usize {
        self.free_count
    }

    /// Total capacity in bytes, i.e. `get_free_bytes()` of an idle pool.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.chunk_count() * self.chunk_size
    }

    /// Bytes currently held by packets (in progress or committed).
    #[inline]
    pub fn used_bytes(&self) -> usize {
        self.capacity() - self.get_free_bytes()
    }

    /// Check whether a chunk is on the free list.
    pub fn is_free(&self, chunk: ChunkHandle) -> bool {
        self.is_free.get(chunk.index()).copied().unwrap_or(false)
    }
}
