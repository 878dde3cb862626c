// This is the shared packet arena for MPMC - one pool, many writer and reader ports

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::layout::Config;
use crate::Core::alloc::ChunkPool;
use crate::Core::io::Writeable;
use crate::MPMC::consumer::ReaderPort;
use crate::MPMC::producer::WriterPort;
use crate::MPMC::Structs::Buffer_Structs::{PacketHandle, PacketTable};

/// Monotonic counters describing what the buffer has done so far.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Packets committed by writers.
    pub committed: u64,
    /// Reader acceptances; a packet broadcast to three readers counts three.
    pub delivered: u64,
    /// Committed packets that no reader accepted.
    pub undeliverable: u64,
    /// Times an enabled reader turned a packet away because its queue was full.
    pub shed: u64,
    /// Packets dropped for exceeding the length limit or exhausting the pool.
    pub write_overflows: u64,
    /// Partial packets reclaimed from stalled writers.
    pub write_timeouts: u64,
    /// Backlogs reclaimed from stalled readers.
    pub read_timeouts: u64,
}

/// Chunk pool plus the packet records that own chains of its chunks.
pub(crate) struct Store {
    pub(crate) pool: ChunkPool,
    pub(crate) packets: PacketTable,
}

/// All state behind a MultiBuffer. Every port reaches it through the same
/// mutex, and every public operation runs to completion under one lock.
pub(crate) struct Shared {
    pub(crate) config: Config,
    pub(crate) store: Store,
    /// Committed packets waiting for the next service pass.
    pub(crate) pending: VecDeque<PacketHandle>,
    pub(crate) writers: Vec<Option<WriterPort>>,
    pub(crate) readers: Vec<Option<ReaderPort>>,
    /// Arrival index for the next committed packet.
    pub(crate) arrivals: u64,
    /// Clock of the most recent service pass. Watchdogs are armed against it.
    pub(crate) now: Instant,
    pub(crate) stats: BufferStats,
    /// Optional carbon-copy sink for every delivered packet.
    pub(crate) debug: Option<Box<dyn Writeable + Send>>,
}

/// A multi-source, multi-sink packet buffer.
///
/// ### Design:
/// - **Pool**: a single arena split into fine-grained chunks. Writers draw
///   chunks as bytes arrive; a packet is a chain of chunks plus metadata.
/// - **Commit**: `write_finalize` stamps an arrival index and queues the
///   packet. The next `service` pass broadcasts it to every enabled reader
///   with room and sets its reference count to the number that accepted.
/// - **Reclaim**: each reader releases its reference on `read_finalize`;
///   the last release returns the chunks to the pool.
/// - **Watchdogs**: `service` also reclaims partial packets from stalled
///   writers and backlogs from stalled readers.
///
/// The handle is cheap to clone; all clones and all ports share one arena.
/// Ports must not be used from inside a debug tap attached to the same
/// buffer, since the tap runs while the buffer is locked.
#[derive(Clone)]
pub struct MultiBuffer {
    pub(crate) shared: Arc<Mutex<Shared>>,
}
