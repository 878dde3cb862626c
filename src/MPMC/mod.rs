mod builder;
mod consumer;
mod producer;

pub use builder::{MultiBufferBuilder, MultiBufferError};
pub use consumer::{MultiReader, MultiReaderPriority, MultiReaderSimple, PeekView};
pub use producer::MultiWriter;

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod layout;
    pub mod queue;
    pub use queue::QueueKind;
    pub use Buffer::{BufferStats, MultiBuffer}; // re-export for stable path
    pub(crate) use Buffer::{Shared, Store};
}

pub mod Structs {
    pub mod Buffer_Structs;
    pub use Buffer_Structs::{PacketHandle, PacketMeta, PacketState}; // re-export for stable path
}

pub use Buffer::{BufferStats, MultiBuffer, QueueKind};
