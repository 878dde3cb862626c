// Module naming follows project convention (MPMC = Multi-Producer Multi-Consumer)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod MPMC;
#[allow(non_snake_case)]
pub mod Debug;
pub mod ffi;

pub use Core::io::{ArrayRead, PacketCollector, Readable, Writeable};
pub use MPMC::Structs::PacketMeta;
pub use MPMC::{
    BufferStats, MultiBuffer, MultiBufferBuilder, MultiBufferError, MultiReader,
    MultiReaderPriority, MultiReaderSimple, MultiWriter, PeekView, QueueKind,
};
