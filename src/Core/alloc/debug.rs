use super::*;
use crate::MPMC::{MultiBuffer, MultiReader, MultiReaderPriority, MultiReaderSimple, MultiWriter};
use std::fmt;

// Debug proxy implementations that call the standalone debug functions
impl fmt::Debug for ChunkPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_chunk_pool(self, f)
    }
}

impl fmt::Debug for MultiBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_multi_buffer(self, f)
    }
}

impl fmt::Debug for MultiWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_multi_writer(self, f)
    }
}

impl fmt::Debug for MultiReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_multi_reader(self, f)
    }
}

impl fmt::Debug for MultiReaderSimple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_multi_reader(self, f)
    }
}

impl fmt::Debug for MultiReaderPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_multi_reader(self, f)
    }
}
