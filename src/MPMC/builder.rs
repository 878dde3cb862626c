use std::time::Duration;

use super::Buffer::layout::Config;
use super::Buffer::MultiBuffer;

/// Reasons a buffer configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MultiBufferError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,
    #[error("capacity {capacity} is smaller than one chunk of {chunk_size} bytes")]
    CapacityTooSmall { capacity: usize, chunk_size: usize },
    #[error("capacity holds {chunks} chunks, more than a u32 handle can address")]
    TooManyChunks { chunks: usize },
    #[error("reader queue depth must be greater than zero")]
    ZeroQueueDepth,
}

impl From<MultiBufferError> for std::io::Error {
    fn from(err: MultiBufferError) -> Self {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, err)
    }
}

pub struct MultiBufferBuilder {
    config: Config,
}

impl Default for MultiBufferBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(), // 16 KiB of 64-byte chunks
        }
    }
}

impl MultiBufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(mut self, bytes: usize) -> Self {
        self.config.capacity = bytes;
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.config.chunk_size = bytes;
        self
    }

    pub fn with_max_packet(mut self, bytes: usize) -> Self {
        self.config.max_packet = bytes;
        self
    }

    pub fn with_queue_depth(mut self, packets: usize) -> Self {
        self.config.queue_depth = packets;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Start from an existing configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<MultiBuffer, MultiBufferError> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(MultiBufferError::ZeroChunkSize);
        }
        if config.queue_depth == 0 {
            return Err(MultiBufferError::ZeroQueueDepth);
        }
        let chunks = config.chunk_count();
        if chunks == 0 {
            return Err(MultiBufferError::CapacityTooSmall {
                capacity: config.capacity,
                chunk_size: config.chunk_size,
            });
        }
        // u32::MAX is reserved as the end-of-chain marker.
        let chunk_count = u32::try_from(chunks)
            .ok()
            .filter(|&n| n < u32::MAX)
            .ok_or(MultiBufferError::TooManyChunks { chunks })?;

        tracing::debug!(
            capacity = chunk_count as usize * config.chunk_size,
            chunk_size = config.chunk_size,
            chunks = chunk_count,
            "multi-buffer created"
        );
        Ok(MultiBuffer::from_parts(config, chunk_count))
    }
}
