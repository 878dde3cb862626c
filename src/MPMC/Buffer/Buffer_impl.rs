use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::layout::Config;
use super::queue::QueueEntry;
use super::Buffer::{BufferStats, MultiBuffer, Shared, Store};
use crate::Core::alloc::ChunkPool;
use crate::Core::io::Writeable;
use crate::MPMC::consumer::{Acceptance, MultiReaderPriority, MultiReaderSimple};
use crate::MPMC::producer::MultiWriter;
use crate::MPMC::Structs::Buffer_Structs::{PacketHandle, PacketMeta, PacketState, PacketTable};

impl Store {
    pub(crate) fn new(chunk_count: u32, chunk_size: usize) -> Self {
        Self {
            pool: ChunkPool::new(chunk_count, chunk_size),
            // Every live packet holds at least one chunk.
            packets: PacketTable::with_capacity(chunk_count as usize),
        }
    }

    /// Drop one reference to a committed packet, freeing it at zero.
    /// Returns true if this call freed the packet.
    pub(crate) fn release(&mut self, packet: PacketHandle) -> bool {
        let Some(record) = self.packets.get_mut(packet) else {
            return false;
        };
        record.refcount = record.refcount.saturating_sub(1);
        if record.refcount == 0 {
            self.free_packet(packet);
            true
        } else {
            false
        }
    }

    /// Immediately return every chunk of a packet to the pool.
    pub(crate) fn free_packet(&mut self, packet: PacketHandle) {
        if let Some(record) = self.packets.remove(packet) {
            let chunks = self.pool.free_chain(record.head);
            tracing::debug!(
                index = record.meta.index,
                length = record.meta.length,
                chunks,
                "packet freed"
            );
        }
    }

    pub(crate) fn meta(&self, packet: PacketHandle) -> Option<PacketMeta> {
        self.packets.get(packet).map(|r| r.meta)
    }

    /// Write a committed packet's contents to `dst` and finalize it.
    pub(crate) fn copy_packet(&self, packet: PacketHandle, dst: &mut dyn Writeable) -> bool {
        let Some(record) = self.packets.get(packet) else {
            return false;
        };
        let mut remaining = record.meta.length;
        let mut next = record.head;
        while let (Some(chunk), true) = (next, remaining > 0) {
            let n = remaining.min(self.pool.chunk_size());
            dst.write_bytes(&self.pool.chunk(chunk)[..n]);
            remaining -= n;
            next = self.pool.next(chunk);
        }
        dst.write_finalize()
    }
}

impl Shared {
    pub(crate) fn new(config: Config, chunk_count: u32) -> Self {
        let store = Store::new(chunk_count, config.chunk_size);
        Self {
            store,
            pending: VecDeque::with_capacity(chunk_count as usize),
            writers: Vec::new(),
            readers: Vec::new(),
            arrivals: 0,
            now: Instant::now(),
            stats: BufferStats::default(),
            debug: None,
            config,
        }
    }

    /// Make a finalized packet shared and immutable, and queue it for the
    /// next delivery pass. Until then the delivery queue holds its only
    /// reference.
    pub(crate) fn commit(&mut self, packet: PacketHandle) {
        let Some(record) = self.store.packets.get_mut(packet) else {
            return;
        };
        record.state = PacketState::Committed;
        record.refcount = 1;
        record.meta.index = self.arrivals;
        self.arrivals += 1;
        self.stats.committed += 1;
        tracing::debug!(
            index = record.meta.index,
            length = record.meta.length,
            priority = record.meta.priority,
            "packet committed"
        );
        self.pending.push_back(packet);
    }

    /// One cooperative scheduling pass: watchdogs, then delivery.
    pub(crate) fn service(&mut self, now: Instant) {
        self.now = now;
        self.expire_writers(now);
        self.expire_readers(now);
        while let Some(packet) = self.pending.pop_front() {
            self.deliver(packet, now);
        }
    }

    fn expire_writers(&mut self, now: Instant) {
        let Shared {
            store,
            writers,
            stats,
            ..
        } = self;
        for port in writers.iter_mut().flatten() {
            if port.deadline.is_some_and(|d| d <= now) {
                if port.is_active() {
                    tracing::warn!(partial = port.len, "writer stalled, partial packet discarded");
                    stats.write_timeouts += 1;
                }
                port.abort(store);
            }
        }
    }

    fn expire_readers(&mut self, now: Instant) {
        let Shared {
            store,
            readers,
            stats,
            ..
        } = self;
        for port in readers.iter_mut().flatten() {
            if port.cursor.is_some() && port.deadline.is_some_and(|d| d <= now) {
                let released = port.drain(store);
                tracing::warn!(released, "reader stalled, backlog discarded");
                stats.read_timeouts += 1;
            }
        }
    }

    /// Broadcast one committed packet to every reader. The refcount becomes
    /// the number of readers that accepted it; with none, it is freed.
    fn deliver(&mut self, packet: PacketHandle, now: Instant) {
        let Some(meta) = self.store.meta(packet) else {
            return;
        };
        if let Some(debug) = self.debug.as_mut() {
            self.store.copy_packet(packet, &mut **debug);
        }

        let entry = QueueEntry {
            packet,
            priority: meta.priority,
            index: meta.index,
        };
        let Shared {
            store,
            readers,
            stats,
            ..
        } = self;
        let mut accepted = 0u32;
        for port in readers.iter_mut().flatten() {
            match port.accept(store, entry, now) {
                Acceptance::Accepted => accepted += 1,
                Acceptance::Full => {
                    stats.shed += 1;
                    tracing::warn!(index = meta.index, "reader queue full, packet shed");
                }
                Acceptance::Skipped => {}
            }
        }

        if accepted == 0 {
            stats.undeliverable += 1;
            tracing::warn!(index = meta.index, "no reader accepted packet");
            store.free_packet(packet);
        } else {
            stats.delivered += u64::from(accepted);
            if let Some(record) = store.packets.get_mut(packet) {
                record.refcount = accepted;
            }
        }
    }

    /// Full structural check: pool membership, reader queue ordering, and
    /// every refcount against the references actually held.
    pub(crate) fn consistency(&self) -> bool {
        let heads = self.store.packets.iter().map(|(_, r)| r.head);
        if !self.store.pool.consistency_with(heads) {
            return false;
        }

        let mut held: HashMap<PacketHandle, u32> = HashMap::new();
        for &packet in &self.pending {
            *held.entry(packet).or_default() += 1;
        }
        for port in self.writers.iter().flatten() {
            if let Some(packet) = port.packet {
                *held.entry(packet).or_default() += 1;
            }
        }
        for port in self.readers.iter().flatten() {
            if !port.queue.consistency() {
                return false;
            }
            let current = port.cursor.as_ref().map(|c| c.packet);
            for packet in current.into_iter().chain(port.queue.packets()) {
                *held.entry(packet).or_default() += 1;
            }
        }

        self.store.packets.iter().all(|(handle, record)| {
            let refs = held.get(&handle).copied().unwrap_or(0);
            let building_ok = record.state == PacketState::Committed || refs == 1;
            building_ok && refs == record.refcount
        }) && held.len() == self.store.packets.live()
    }
}

impl MultiBuffer {
    /// Create a buffer with default settings and the given arena size.
    pub fn new(capacity: usize) -> Result<Self, crate::MPMC::MultiBufferError> {
        crate::MPMC::MultiBufferBuilder::new()
            .with_capacity(capacity)
            .build()
    }

    pub(crate) fn from_parts(config: Config, chunk_count: u32) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::new(config, chunk_count))),
        }
    }

    /// Create a writer port on this buffer.
    pub fn writer(&self) -> MultiWriter {
        MultiWriter::new(self)
    }

    /// Create a first-in, first-out reader port on this buffer.
    pub fn reader_simple(&self) -> MultiReaderSimple {
        MultiReaderSimple::new(self)
    }

    /// Create a priority-ordered reader port on this buffer.
    pub fn reader_priority(&self) -> MultiReaderPriority {
        MultiReaderPriority::new(self)
    }

    /// Run one scheduling pass at the current time.
    pub fn service(&self) {
        self.service_at(Instant::now());
    }

    /// Run one scheduling pass at `now`: reclaim stalled writers and
    /// readers, then deliver every packet committed since the last pass.
    /// `now` should not go backwards between calls.
    pub fn service_at(&self, now: Instant) {
        self.shared.lock().service(now);
    }

    /// Clock of the most recent service pass (creation time before the first).
    pub fn now(&self) -> Instant {
        self.shared.lock().now
    }

    /// Query remaining buffer capacity.
    pub fn get_free_bytes(&self) -> usize {
        self.shared.lock().store.pool.get_free_bytes()
    }

    /// Total arena capacity, i.e. free bytes when nothing is held.
    pub fn capacity(&self) -> usize {
        self.shared.lock().store.pool.capacity()
    }

    /// Number of packets committed so far; also the arrival index the next
    /// commit will receive.
    pub fn get_pcount(&self) -> u64 {
        self.shared.lock().arrivals
    }

    /// Packets currently alive, whether being written, awaiting delivery,
    /// or held by readers.
    pub fn packet_count(&self) -> usize {
        self.shared.lock().store.packets.live()
    }

    /// Committed packets waiting for the next service pass.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn stats(&self) -> BufferStats {
        self.shared.lock().stats
    }

    pub fn config(&self) -> Config {
        self.shared.lock().config.clone()
    }

    /// Attach or detach a sink that gets a carbon copy of each packet as it
    /// is delivered. The sink must not be a port of this same buffer.
    pub fn set_debug(&self, debug: Option<Box<dyn Writeable + Send>>) {
        self.shared.lock().debug = debug;
    }

    /// Internal consistency self-test. O(n); intended for tests and
    /// periodic assertions, not the packet path.
    pub fn consistency(&self) -> bool {
        self.shared.lock().consistency()
    }
}
