// src/MPMC/consumer.rs

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};

use crate::Core::alloc::{ChunkHandle, ChunkPool};
use crate::Core::io::Readable;
use crate::MPMC::Buffer::queue::{QueueEntry, QueueKind, ReadQueue};
use crate::MPMC::Buffer::{MultiBuffer, Shared, Store};
use crate::MPMC::Structs::Buffer_Structs::{PacketHandle, PacketMeta};

/// Outcome of offering a packet to one reader.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Acceptance {
    Accepted,
    /// Port disabled, or enabled only after the packet was committed.
    Skipped,
    /// Port enabled but its queue is full.
    Full,
}

/// Read position inside the packet at the head of a reader.
#[derive(Debug)]
pub(crate) struct ReadCursor {
    pub(crate) packet: PacketHandle,
    chunk: Option<ChunkHandle>,
    pos: usize,
    remaining: usize,
    meta: PacketMeta,
}

/// Per-reader state kept inside the shared buffer.
#[derive(Debug)]
pub(crate) struct ReaderPort {
    pub(crate) queue: ReadQueue,
    /// Packet currently being read. Popped from the queue, so later
    /// arrivals cannot preempt it.
    pub(crate) cursor: Option<ReadCursor>,
    pub(crate) enabled: bool,
    /// Arrival index of the first packet this port may see.
    pub(crate) enabled_since: u64,
    pub(crate) timeout: Duration,
    pub(crate) deadline: Option<Instant>,
}

impl ReaderPort {
    pub(crate) fn new(kind: QueueKind, depth: usize, timeout: Duration, enabled_since: u64) -> Self {
        Self {
            queue: ReadQueue::new(kind, depth),
            cursor: None,
            enabled: true,
            enabled_since,
            timeout,
            deadline: None,
        }
    }

    pub(crate) fn can_accept(&self) -> bool {
        self.enabled && !self.queue.is_full()
    }

    pub(crate) fn accept(&mut self, store: &Store, entry: QueueEntry, now: Instant) -> Acceptance {
        if !self.enabled || entry.index < self.enabled_since {
            return Acceptance::Skipped;
        }
        if !self.queue.push(entry) {
            return Acceptance::Full;
        }
        // If we were idle, load the packet right away.
        if self.cursor.is_none() {
            self.load_next(store, now);
        }
        Acceptance::Accepted
    }

    /// Start the next queued packet, or go idle. Arms or clears the watchdog.
    fn load_next(&mut self, store: &Store, now: Instant) {
        self.cursor = None;
        while let Some(entry) = self.queue.pop() {
            if let Some(record) = store.packets.get(entry.packet) {
                self.cursor = Some(ReadCursor {
                    packet: entry.packet,
                    chunk: record.head,
                    pos: 0,
                    remaining: record.meta.length,
                    meta: record.meta,
                });
                break;
            }
        }
        self.deadline = self.cursor.as_ref().map(|_| now + self.timeout);
    }

    /// Release the current packet and move to the next one.
    pub(crate) fn finalize(&mut self, store: &mut Store, now: Instant) {
        if let Some(cursor) = self.cursor.take() {
            store.release(cursor.packet);
            self.load_next(store, now);
        }
    }

    /// Release the current packet and everything queued behind it.
    /// Returns the number of packets released.
    pub(crate) fn drain(&mut self, store: &mut Store) -> usize {
        let mut count = 0;
        if let Some(cursor) = self.cursor.take() {
            store.release(cursor.packet);
            count += 1;
        }
        while let Some(entry) = self.queue.pop() {
            store.release(entry.packet);
            count += 1;
        }
        self.deadline = None;
        count
    }

    pub(crate) fn set_enable(&mut self, store: &mut Store, enable: bool, next_arrival: u64) {
        if enable && !self.enabled {
            // Only packets committed from now on.
            self.enabled_since = next_arrival;
        } else if !enable && self.enabled {
            let dropped = self.drain(store);
            tracing::debug!(dropped, "reader disabled, backlog released");
        }
        self.enabled = enable;
    }

    fn read_ready(&self) -> usize {
        self.cursor.as_ref().map_or(0, |c| c.remaining)
    }

    /// Copy (or skip, if `dst` is None) `nbytes` from the current packet.
    /// All-or-nothing: fails without moving if fewer bytes are ready.
    fn read(&mut self, pool: &ChunkPool, mut dst: Option<&mut [u8]>, nbytes: usize) -> bool {
        let Some(cursor) = self.cursor.as_mut() else {
            return nbytes == 0;
        };
        if nbytes > cursor.remaining {
            return false;
        }
        let chunk_size = pool.chunk_size();
        let mut done = 0;
        while done < nbytes {
            // Stop at end of request or end of chunk, whichever comes first.
            let Some(chunk) = cursor.chunk else {
                break;
            };
            let n = (nbytes - done).min(chunk_size - cursor.pos);
            if let Some(dst) = dst.as_deref_mut() {
                dst[done..done + n].copy_from_slice(&pool.chunk(chunk)[cursor.pos..cursor.pos + n]);
            }
            done += n;
            cursor.pos += n;
            cursor.remaining -= n;
            if cursor.pos == chunk_size {
                cursor.chunk = pool.next(chunk);
                cursor.pos = 0;
            }
        }
        done == nbytes
    }

    /// Location of the next `nbytes` if they are ready and contiguous.
    fn peek_range(&self, chunk_size: usize, nbytes: usize) -> Option<(ChunkHandle, usize)> {
        let cursor = self.cursor.as_ref()?;
        let chunk = cursor.chunk?;
        (nbytes <= cursor.remaining && cursor.pos + nbytes <= chunk_size).then_some((chunk, cursor.pos))
    }
}

/// Read-only view of bytes at the head of a reader, returned by `peek`.
///
/// Committed packets are shared by every reader that accepted them, so the
/// view only derefs to `&[u8]`:
///
/// ```compile_fail
/// use dmxp_mbuff::{MultiBuffer, Readable, Writeable};
///
/// let buffer = MultiBuffer::new(1024).unwrap();
/// let mut writer = buffer.writer();
/// let reader = buffer.reader_simple();
/// writer.write_bytes(b"ABCD");
/// writer.write_finalize();
/// buffer.service();
///
/// let mut view = reader.peek(4).unwrap();
/// view[0] = b'Z';
/// ```
///
/// The view holds the buffer lock. Every other call on the same buffer,
/// from any port and from this thread too, blocks until it is dropped, so
/// copy out what you need and drop it before touching the buffer again.
pub struct PeekView<'a>(MappedMutexGuard<'a, [u8]>);

impl Deref for PeekView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// A port for reading packets from a MultiBuffer.
///
/// Implements [`Readable`], scoped to the packet at the head of this port.
/// `read_finalize` releases that packet and moves to the next one.
/// Use [`MultiReaderSimple`] or [`MultiReaderPriority`] to pick the order.
pub struct MultiReader {
    pub(crate) shared: Arc<Mutex<Shared>>,
    pub(crate) id: usize,
    kind: QueueKind,
}

impl MultiReader {
    /// Create this port and link it to the source buffer.
    pub fn new(src: &MultiBuffer, kind: QueueKind) -> Self {
        let shared = Arc::clone(&src.shared);
        let id = {
            let mut guard = shared.lock();
            let port = ReaderPort::new(
                kind,
                guard.config.queue_depth,
                guard.config.read_timeout,
                guard.arrivals,
            );
            match guard.readers.iter().position(Option::is_none) {
                Some(id) => {
                    guard.readers[id] = Some(port);
                    id
                }
                None => {
                    guard.readers.push(Some(port));
                    guard.readers.len() - 1
                }
            }
        };
        Self { shared, id, kind }
    }

    /// Run `f` on this port's state with the rest of the buffer alongside.
    fn with_port<R: Default>(&self, f: impl FnOnce(&mut ReaderPort, &mut Shared) -> R) -> R {
        let mut guard = self.shared.lock();
        let shared = &mut *guard;
        let Some(mut port) = shared.readers.get_mut(self.id).and_then(Option::take) else {
            return R::default();
        };
        let result = f(&mut port, shared);
        shared.readers[self.id] = Some(port);
        result
    }

    /// Ordering applied by this port.
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Enable or disable this port.
    ///
    /// Disabling releases the current packet and the whole backlog at once.
    /// A re-enabled port only sees packets committed after re-enabling.
    pub fn set_port_enable(&mut self, enable: bool) {
        self.with_port(|port, shared| {
            let next_arrival = shared.arrivals;
            port.set_enable(&mut shared.store, enable, next_arrival)
        });
    }

    pub fn is_enabled(&self) -> bool {
        self.with_port(|port, _| port.enabled)
    }

    /// Update the watchdog interval. The watchdog is armed when a packet
    /// reaches the head of this port; if it is not finalized in time, the
    /// port's entire backlog is discarded.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.with_port(|port, _| port.timeout = timeout);
    }

    /// Can this port take another packet right now?
    pub fn can_accept(&self) -> bool {
        self.with_port(|port, _| port.can_accept())
    }

    /// Packets waiting behind the current one.
    pub fn queue_len(&self) -> usize {
        self.with_port(|port, _| port.queue.len())
    }

    /// Metadata of the packet currently being read.
    pub fn packet_meta(&self) -> Option<PacketMeta> {
        self.with_port(|port, _| port.cursor.as_ref().map(|c| c.meta))
    }

    /// Internal consistency self-test of this port's queue ordering.
    pub fn consistency(&self) -> bool {
        self.with_port(|port, _| port.queue.consistency())
    }
}

impl Readable for MultiReader {
    type Peek<'a> = PeekView<'a>;

    fn get_read_ready(&self) -> usize {
        self.with_port(|port, _| port.read_ready())
    }

    fn read_bytes(&mut self, dst: &mut [u8]) -> bool {
        let nbytes = dst.len();
        self.with_port(|port, shared| port.read(&shared.store.pool, Some(dst), nbytes))
    }

    fn read_consume(&mut self, nbytes: usize) -> bool {
        self.with_port(|port, shared| port.read(&shared.store.pool, None, nbytes))
    }

    /// Zero-copy view of the next `nbytes`. See [`PeekView`]: the buffer
    /// stays locked until the view is dropped.
    fn peek(&self, nbytes: usize) -> Option<PeekView<'_>> {
        let guard = self.shared.lock();
        let port = guard.readers.get(self.id)?.as_ref()?;
        if nbytes == 0 {
            return Some(PeekView(MutexGuard::map(guard, |_| <&mut [u8]>::default())));
        }
        let (chunk, pos) = port.peek_range(guard.store.pool.chunk_size(), nbytes)?;
        Some(PeekView(MutexGuard::map(guard, |s| {
            &mut s.store.pool.chunk_mut(chunk)[pos..pos + nbytes]
        })))
    }

    fn read_finalize(&mut self) {
        self.with_port(|port, shared| {
            // Arm the next packet's watchdog from now, not from the last pass.
            let now = Instant::now().max(shared.now);
            port.finalize(&mut shared.store, now)
        });
    }
}

impl Drop for MultiReader {
    fn drop(&mut self) {
        // Release everything still held by this port, then free the slot.
        let mut guard = self.shared.lock();
        let shared = &mut *guard;
        if let Some(mut port) = shared.readers.get_mut(self.id).and_then(Option::take) {
            port.drain(&mut shared.store);
        }
    }
}

macro_rules! reader_variant {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        pub struct $name(MultiReader);

        impl $name {
            /// Create this port and link it to the source buffer.
            pub fn new(src: &MultiBuffer) -> Self {
                Self(MultiReader::new(src, $kind))
            }
        }

        impl Deref for $name {
            type Target = MultiReader;

            fn deref(&self) -> &MultiReader {
                &self.0
            }
        }

        impl DerefMut for $name {
            fn deref_mut(&mut self) -> &mut MultiReader {
                &mut self.0
            }
        }

        impl Readable for $name {
            type Peek<'a> = PeekView<'a>;

            fn get_read_ready(&self) -> usize {
                self.0.get_read_ready()
            }

            fn read_bytes(&mut self, dst: &mut [u8]) -> bool {
                self.0.read_bytes(dst)
            }

            fn read_consume(&mut self, nbytes: usize) -> bool {
                self.0.read_consume(nbytes)
            }

            fn peek(&self, nbytes: usize) -> Option<PeekView<'_>> {
                self.0.peek(nbytes)
            }

            fn read_finalize(&mut self) {
                self.0.read_finalize()
            }
        }
    };
}

reader_variant!(
    /// A reader that delivers packets in commit order.
    MultiReaderSimple,
    QueueKind::Fifo
);

reader_variant!(
    /// A reader that delivers the highest-priority queued packet first,
    /// oldest first among equals. The packet being read is never preempted.
    MultiReaderPriority,
    QueueKind::Priority
);
