pub mod alloc;
pub mod io;

pub use alloc::{ChunkHandle, ChunkPool};
pub use io::{ArrayRead, PacketCollector, Readable, Writeable};
