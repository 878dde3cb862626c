use std::time::Duration;

/// Default size of one pool chunk in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 64;

/// Default arena size in bytes.
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

/// Default maximum bytes per packet. Longer packets are dropped by the
/// writer to keep one port from hogging the pool.
pub const DEFAULT_MAX_PACKET: usize = 2048;

/// Default depth of each reader's packet queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 32;

/// Default watchdog interval for stalled writers and readers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Number of opaque user tag slots carried by every packet.
/// This must be a constant to allow a fixed-size array in PacketMeta.
pub const USER_SLOTS: usize = 8;

/// Sizing and policy for one MultiBuffer.
///
/// Built by `MultiBufferBuilder`; the writer and reader values are the
/// initial settings for each new port and can be changed per port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Arena size in bytes, rounded down to a whole number of chunks.
    pub capacity: usize,

    /// Size of one chunk in bytes.
    pub chunk_size: usize,

    /// Maximum packet length accepted by a new writer.
    pub max_packet: usize,

    /// Packets each reader may hold before it starts shedding.
    pub queue_depth: usize,

    /// Watchdog for a reader that sits on a packet without finalizing it.
    pub read_timeout: Duration,

    /// Watchdog for a writer that leaves a partial packet open.
    pub write_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_packet: DEFAULT_MAX_PACKET,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Config {
    /// Number of chunks that fit in the configured capacity.
    pub fn chunk_count(&self) -> usize {
        if self.chunk_size == 0 {
            0
        } else {
            self.capacity / self.chunk_size
        }
    }
}
