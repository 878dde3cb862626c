// Packet records for the multi-buffer.
//
// A packet's bytes live in a chain of pool chunks; its metadata lives here,
// in a slot table owned by the buffer. Ports hold PacketHandles, which carry
// the slot's generation so a handle to a freed packet is never mistaken for
// whatever reuses the slot.

use crate::Core::alloc::ChunkHandle;
use crate::MPMC::Buffer::layout::USER_SLOTS;

/// Non-owning reference to a packet record.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PacketHandle {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

/// Lifecycle of a packet record.
///
/// Failed and Freed are not stored: a failed packet is released on the spot,
/// and a freed packet's slot simply stops answering to old handles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketState {
    /// Private to the writer that is filling it.
    Building,
    /// Immutable and shared by every reader that accepted it.
    Committed,
}

/// Metadata snapshot handed to readers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PacketMeta {
    /// Total payload length in bytes.
    pub length: usize,
    /// Delivery priority, higher first. Zero is the default and lowest.
    pub priority: u16,
    /// Arrival index assigned at commit, strictly increasing.
    pub index: u64,
    /// Opaque application tags, e.g. the ingress port number.
    pub user: [u32; USER_SLOTS],
}

/// One live packet.
#[derive(Debug)]
pub(crate) struct PacketRecord {
    pub(crate) state: PacketState,
    pub(crate) head: Option<ChunkHandle>,
    pub(crate) refcount: u32,
    pub(crate) meta: PacketMeta,
}

#[derive(Debug)]
struct PacketSlot {
    generation: u32,
    record: Option<PacketRecord>,
}

/// Slot table of packet records with generation-checked handles.
#[derive(Debug, Default)]
pub(crate) struct PacketTable {
    slots: Vec<PacketSlot>,
    vacant: Vec<u32>,
    live: usize,
}

impl PacketTable {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            vacant: Vec::with_capacity(capacity),
            live: 0,
        }
    }

    /// Open a new packet in the Building state, holding one reference
    /// (the writer's).
    pub(crate) fn open(&mut self, first: ChunkHandle) -> PacketHandle {
        let record = PacketRecord {
            state: PacketState::Building,
            head: Some(first),
            refcount: 1,
            meta: PacketMeta::default(),
        };
        self.live += 1;
        match self.vacant.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.record = Some(record);
                PacketHandle {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(PacketSlot {
                    generation: 0,
                    record: Some(record),
                });
                PacketHandle {
                    slot,
                    generation: 0,
                }
            }
        }
    }

    pub(crate) fn get(&self, handle: PacketHandle) -> Option<&PacketRecord> {
        self.slots
            .get(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.record.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: PacketHandle) -> Option<&mut PacketRecord> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.record.as_mut())
    }

    /// Retire a record and bump its slot generation. Returns the record so
    /// the caller can hand its chunks back to the pool.
    pub(crate) fn remove(&mut self, handle: PacketHandle) -> Option<PacketRecord> {
        let slot = self.slots.get_mut(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(handle.slot);
        self.live -= 1;
        Some(record)
    }

    /// Number of packets currently alive (building or committed).
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Iterate every live record with its current handle.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (PacketHandle, &PacketRecord)> {
        self.slots.iter().enumerate().filter_map(|(slot, s)| {
            s.record.as_ref().map(|record| {
                let handle = PacketHandle {
                    slot: slot as u32,
                    generation: s.generation,
                };
                (handle, record)
            })
        })
    }
}
