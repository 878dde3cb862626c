// Streaming byte contracts shared by the buffer ports and every protocol
// layer that sits on top of them.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;

/// Sequential byte consumption, one packet at a time.
///
/// All reads are all-or-nothing: a request for more bytes than
/// [`get_read_ready`](Readable::get_read_ready) reports fails without
/// consuming anything.
pub trait Readable {
    /// Zero-copy view returned by [`peek`](Readable::peek).
    type Peek<'a>: Deref<Target = [u8]>
    where
        Self: 'a;

    /// Bytes remaining in the current packet.
    fn get_read_ready(&self) -> usize;

    /// Fill `dst` from the current packet. Returns false, with no side
    /// effects, if fewer than `dst.len()` bytes are ready.
    fn read_bytes(&mut self, dst: &mut [u8]) -> bool;

    /// Skip ahead `nbytes`. Same failure rule as `read_bytes`.
    fn read_consume(&mut self, nbytes: usize) -> bool;

    /// Look at the next `nbytes` without consuming them. Returns `None` if
    /// the bytes are not ready or are not contiguous in storage.
    ///
    /// The view is read-only. Implementations backed by a shared buffer may
    /// keep it locked while the view lives; drop the view before any other
    /// call on that buffer.
    fn peek(&self, nbytes: usize) -> Option<Self::Peek<'_>>;

    /// Discard whatever is left of the current packet and move to the next.
    fn read_finalize(&mut self);

    fn read_u8(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf).then_some(buf[0])
    }

    fn read_u16(&mut self) -> Option<u16> {
        let mut buf = [0u8; 2];
        self.read_bytes(&mut buf).then(|| u16::from_be_bytes(buf))
    }

    fn read_u32(&mut self) -> Option<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf).then(|| u32::from_be_bytes(buf))
    }

    fn read_u64(&mut self) -> Option<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf).then(|| u64::from_be_bytes(buf))
    }

    /// Copy the rest of the current packet into `dst` without finalizing
    /// either side. Returns false if `dst` reports too little space.
    fn copy_to(&mut self, dst: &mut dyn Writeable) -> bool {
        let total = self.get_read_ready();
        if total > dst.get_write_space() {
            return false;
        }
        let mut buf = [0u8; 64];
        while self.get_read_ready() > 0 {
            let n = self.get_read_ready().min(buf.len());
            if !self.read_bytes(&mut buf[..n]) {
                return false;
            }
            dst.write_bytes(&buf[..n]);
        }
        true
    }

    /// Copy the rest of the current packet into `dst`, then finalize both.
    fn copy_and_finalize(&mut self, dst: &mut dyn Writeable) -> bool {
        let copied = self.copy_to(dst);
        self.read_finalize();
        if copied {
            dst.write_finalize()
        } else {
            dst.write_abort();
            false
        }
    }
}

/// Sequential byte production with a commit protocol.
///
/// Writes accumulate into one private packet; nothing becomes visible to
/// readers until [`write_finalize`](Writeable::write_finalize) succeeds.
pub trait Writeable {
    /// Bytes that can still be appended to the current packet.
    fn get_write_space(&self) -> usize;

    /// Append bytes. Failures are latched and reported by `write_finalize`.
    fn write_bytes(&mut self, src: &[u8]);

    /// Drop the current packet. Always safe, idempotent when idle.
    fn write_abort(&mut self);

    /// Commit the current packet. Returns false if it was empty or failed.
    fn write_finalize(&mut self) -> bool;

    fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_be_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_be_bytes());
    }

    fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_be_bytes());
    }
}

/// Readable view over a borrowed byte slice, treated as a single packet.
#[derive(Debug, Clone)]
pub struct ArrayRead<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ArrayRead<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl Readable for ArrayRead<'_> {
    type Peek<'b> = &'b [u8] where Self: 'b;

    fn get_read_ready(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_bytes(&mut self, dst: &mut [u8]) -> bool {
        if dst.len() > self.get_read_ready() {
            return false;
        }
        dst.copy_from_slice(&self.data[self.pos..self.pos + dst.len()]);
        self.pos += dst.len();
        true
    }

    fn read_consume(&mut self, nbytes: usize) -> bool {
        if nbytes > self.get_read_ready() {
            return false;
        }
        self.pos += nbytes;
        true
    }

    fn peek(&self, nbytes: usize) -> Option<&[u8]> {
        (nbytes <= self.get_read_ready()).then(|| &self.data[self.pos..self.pos + nbytes])
    }

    fn read_finalize(&mut self) {
        self.pos = self.data.len();
    }
}

/// Writeable sink that collects finalized packets in memory.
///
/// Clones share the same packet list, so one clone can be handed to a
/// buffer (for example as its debug tap) while another inspects the output.
#[derive(Debug, Clone, Default)]
pub struct PacketCollector {
    packets: Arc<Mutex<VecDeque<Vec<u8>>>>,
    partial: Vec<u8>,
}

impl PacketCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of finalized packets waiting to be taken.
    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the oldest finalized packet.
    pub fn pop(&self) -> Option<Vec<u8>> {
        self.packets.lock().pop_front()
    }
}

impl Writeable for PacketCollector {
    fn get_write_space(&self) -> usize {
        usize::MAX - self.partial.len()
    }

    fn write_bytes(&mut self, src: &[u8]) {
        self.partial.extend_from_slice(src);
    }

    fn write_abort(&mut self) {
        self.partial.clear();
    }

    fn write_finalize(&mut self) -> bool {
        if self.partial.is_empty() {
            return false;
        }
        let packet = std::mem::take(&mut self.partial);
        self.packets.lock().push_back(packet);
        true
    }
}
