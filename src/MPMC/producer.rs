// In src/MPMC/producer.rs
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::Core::alloc::ChunkHandle;
use crate::Core::io::Writeable;
use crate::MPMC::Buffer::layout::USER_SLOTS;
use crate::MPMC::Buffer::{BufferStats, MultiBuffer, Shared, Store};
use crate::MPMC::Structs::Buffer_Structs::PacketHandle;

/// Per-writer state kept inside the shared buffer.
#[derive(Debug)]
pub(crate) struct WriterPort {
    /// Packet being built, private to this writer until commit.
    pub(crate) packet: Option<PacketHandle>,
    /// Last chunk of the open packet, the one being filled.
    tail: Option<ChunkHandle>,
    /// Write offset inside `tail`.
    pos: usize,
    /// Bytes written to the open packet so far.
    pub(crate) len: usize,
    /// Latched on overflow; cleared by abort or finalize.
    pub(crate) failed: bool,
    pub(crate) max_len: usize,
    pub(crate) timeout: Duration,
    pub(crate) deadline: Option<Instant>,
}

impl WriterPort {
    pub(crate) fn new(max_len: usize, timeout: Duration) -> Self {
        Self {
            packet: None,
            tail: None,
            pos: 0,
            len: 0,
            failed: false,
            max_len,
            timeout,
            deadline: None,
        }
    }

    /// True while there is anything for the watchdog to reclaim.
    pub(crate) fn is_active(&self) -> bool {
        self.packet.is_some() || self.failed
    }

    /// Remaining space, limited by the packet budget and by pool capacity.
    pub(crate) fn write_space(&self, store: &Store) -> usize {
        if self.failed || self.len >= self.max_len {
            return 0;
        }
        let budget = self.max_len - self.len;
        let mut room = store.pool.get_free_bytes();
        if self.tail.is_some() {
            room += store.pool.chunk_size() - self.pos;
        }
        budget.min(room)
    }

    /// Open the packet or extend its chain as needed.
    /// Returns the bytes writable into the current tail chunk, zero if the
    /// pool cannot supply another chunk.
    fn prep(&mut self, store: &mut Store) -> usize {
        let chunk_size = store.pool.chunk_size();
        match (self.packet, self.tail) {
            (Some(_), Some(_)) if self.pos < chunk_size => {}
            (Some(_), Some(tail)) => {
                let Some(chunk) = store.pool.alloc_chunk() else {
                    return 0;
                };
                store.pool.link(tail, chunk);
                self.tail = Some(chunk);
                self.pos = 0;
            }
            _ => {
                let Some(first) = store.pool.alloc_chunk() else {
                    return 0;
                };
                self.packet = Some(store.packets.open(first));
                self.tail = Some(first);
                self.pos = 0;
                self.len = 0;
            }
        }
        chunk_size - self.pos
    }

    pub(crate) fn write_bytes(
        &mut self,
        store: &mut Store,
        stats: &mut BufferStats,
        src: &[u8],
        now: Instant,
    ) {
        self.deadline = Some(now + self.timeout);
        if self.failed {
            return;
        }
        if src.len() > self.write_space(store) {
            self.overflow(store, stats, src.len());
            return;
        }

        let mut written = 0;
        while written < src.len() {
            let room = self.prep(store);
            let Some(tail) = self.tail.filter(|_| room > 0) else {
                self.overflow(store, stats, src.len() - written);
                return;
            };
            let n = room.min(src.len() - written);
            store.pool.chunk_mut(tail)[self.pos..self.pos + n]
                .copy_from_slice(&src[written..written + n]);
            written += n;
            self.pos += n;
            self.len += n;
        }
    }

    /// Drop the open packet and latch the failure until abort or finalize.
    fn overflow(&mut self, store: &mut Store, stats: &mut BufferStats, requested: usize) {
        tracing::debug!(
            written = self.len,
            requested,
            max_len = self.max_len,
            free_bytes = store.pool.get_free_bytes(),
            "writer overflow, packet dropped"
        );
        if let Some(packet) = self.packet.take() {
            store.free_packet(packet);
        }
        self.tail = None;
        self.pos = 0;
        self.len = 0;
        self.failed = true;
        stats.write_overflows += 1;
    }

    /// Free any open packet and return to idle.
    pub(crate) fn abort(&mut self, store: &mut Store) {
        if let Some(packet) = self.packet.take() {
            store.free_packet(packet);
        }
        self.reset();
    }

    /// Hand the open packet over for commit. Returns None, after discarding
    /// whatever was open, if the writer failed or never wrote a byte.
    pub(crate) fn finalize(&mut self, store: &mut Store) -> Option<PacketHandle> {
        if self.failed || self.len == 0 {
            self.abort(store);
            return None;
        }
        let packet = self.packet.take()?;
        if let Some(record) = store.packets.get_mut(packet) {
            record.meta.length = self.len;
        }
        self.reset();
        Some(packet)
    }

    fn reset(&mut self) {
        self.packet = None;
        self.tail = None;
        self.pos = 0;
        self.len = 0;
        self.failed = false;
        self.deadline = None;
    }
}

/// A port for writing packets into a MultiBuffer.
///
/// Implements [`Writeable`]: bytes accumulate in a private packet that
/// becomes visible to readers only after a successful `write_finalize`
/// and the following service pass.
pub struct MultiWriter {
    pub(crate) shared: Arc<Mutex<Shared>>,
    pub(crate) id: usize,
}

impl MultiWriter {
    /// Create this port and link it to the destination buffer.
    pub fn new(dst: &MultiBuffer) -> Self {
        let shared = Arc::clone(&dst.shared);
        let id = {
            let mut guard = shared.lock();
            let port = WriterPort::new(guard.config.max_packet, guard.config.write_timeout);
            match guard.writers.iter().position(Option::is_none) {
                Some(id) => {
                    guard.writers[id] = Some(port);
                    id
                }
                None => {
                    guard.writers.push(Some(port));
                    guard.writers.len() - 1
                }
            }
        };
        Self { shared, id }
    }

    /// Run `f` on this port's state with the rest of the buffer alongside.
    /// The port is lifted out of its slot for the duration of the call.
    fn with_port<R: Default>(&self, f: impl FnOnce(&mut WriterPort, &mut Shared) -> R) -> R {
        let mut guard = self.shared.lock();
        let shared = &mut *guard;
        let Some(mut port) = shared.writers.get_mut(self.id).and_then(Option::take) else {
            return R::default();
        };
        let result = f(&mut port, shared);
        shared.writers[self.id] = Some(port);
        result
    }

    /// Update the maximum allowed packet length for later writes.
    pub fn set_max_packet(&mut self, max_bytes: usize) {
        self.with_port(|port, _| port.max_len = max_bytes);
    }

    /// Update the watchdog interval. The watchdog is re-armed by every write;
    /// a partial packet left idle longer than this is discarded.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.with_port(|port, _| port.timeout = timeout);
    }

    /// Set the priority of the open packet. No effect when nothing is open.
    pub fn set_priority(&mut self, priority: u16) {
        self.with_port(|port, shared| {
            if let Some(record) = port.packet.and_then(|p| shared.store.packets.get_mut(p)) {
                record.meta.priority = priority;
            }
        });
    }

    /// Set one user tag on the open packet. No effect when nothing is open
    /// or the slot is out of range.
    pub fn set_user(&mut self, slot: usize, value: u32) {
        if slot >= USER_SLOTS {
            return;
        }
        self.with_port(|port, shared| {
            if let Some(record) = port.packet.and_then(|p| shared.store.packets.get_mut(p)) {
                record.meta.user[slot] = value;
            }
        });
    }

    /// Bytes written to the open packet so far.
    pub fn get_write_partial(&self) -> usize {
        self.with_port(|port, _| port.len)
    }

    /// True once the open packet has overflowed and will fail to finalize.
    pub fn is_failed(&self) -> bool {
        self.with_port(|port, _| port.failed)
    }
}

impl Writeable for MultiWriter {
    fn get_write_space(&self) -> usize {
        self.with_port(|port, shared| port.write_space(&shared.store))
    }

    fn write_bytes(&mut self, src: &[u8]) {
        self.with_port(|port, shared| {
            let now = Instant::now().max(shared.now);
            port.write_bytes(&mut shared.store, &mut shared.stats, src, now)
        });
    }

    fn write_abort(&mut self) {
        self.with_port(|port, shared| port.abort(&mut shared.store));
    }

    fn write_finalize(&mut self) -> bool {
        self.with_port(|port, shared| match port.finalize(&mut shared.store) {
            Some(packet) => {
                shared.commit(packet);
                true
            }
            None => false,
        })
    }
}

impl Drop for MultiWriter {
    fn drop(&mut self) {
        // Cleanup any work in progress.
        let mut guard = self.shared.lock();
        let shared = &mut *guard;
        if let Some(mut port) = shared.writers[self.id].take() {
            port.abort(&mut shared.store);
        }
    }
}
