use std::fmt;
use crate::Core::alloc::ChunkPool;
use crate::MPMC::{MultiBuffer, MultiReader, MultiWriter};

// These never block: a handle whose buffer is locked (for example by a live
// peek guard) is rendered as locked instead of waiting on the mutex.

/// Debug function for ChunkPool
///
/// Shows chunk geometry and occupancy, not the raw bytes.
pub fn debug_chunk_pool(pool: &ChunkPool, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChunkPool")
        .field("chunk_size", &pool.chunk_size())
        .field("chunk_count", &pool.chunk_count())
        .field("free_chunks", &pool.free_chunks())
        .field("free_bytes", &pool.get_free_bytes())
        .finish()
}

/// Debug function for MultiBuffer
///
/// Shows:
/// - Pool occupancy
/// - Live and pending packet counts
/// - Attached port counts
/// - Counters
pub fn debug_multi_buffer(buffer: &MultiBuffer, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let Some(shared) = buffer.shared.try_lock() else {
        return f.debug_struct("MultiBuffer").field("state", &"<locked>").finish();
    };
    f.debug_struct("MultiBuffer")
        .field("pool", &shared.store.pool)
        .field("live_packets", &shared.store.packets.live())
        .field("pending", &shared.pending.len())
        .field("writers", &shared.writers.iter().flatten().count())
        .field("readers", &shared.readers.iter().flatten().count())
        .field("pcount", &shared.arrivals)
        .field("stats", &shared.stats)
        .finish()
}

/// Debug function for MultiWriter
///
/// Shows the port slot and the state of the packet being written.
pub fn debug_multi_writer(writer: &MultiWriter, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut out = f.debug_struct("MultiWriter");
    out.field("id", &writer.id);
    match writer.shared.try_lock() {
        Some(shared) => match shared.writers.get(writer.id).and_then(Option::as_ref) {
            Some(port) => out
                .field("open", &port.packet.is_some())
                .field("partial", &port.len)
                .field("failed", &port.failed)
                .field("max_len", &port.max_len)
                .finish(),
            None => out.finish_non_exhaustive(),
        },
        None => out.field("state", &"<locked>").finish(),
    }
}

/// Debug function for MultiReader
///
/// Shows the port slot, ordering, and backlog.
pub fn debug_multi_reader(reader: &MultiReader, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut out = f.debug_struct("MultiReader");
    out.field("id", &reader.id).field("kind", &reader.kind());
    match reader.shared.try_lock() {
        Some(shared) => match shared.readers.get(reader.id).and_then(Option::as_ref) {
            Some(port) => out
                .field("enabled", &port.enabled)
                .field("reading", &port.cursor.is_some())
                .field("queued", &port.queue.len())
                .finish(),
            None => out.finish_non_exhaustive(),
        },
        None => out.field("state", &"<locked>").finish(),
    }
}
