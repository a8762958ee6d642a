//! Per-relation storage options.

use crate::error::{Result, StorageError};
use common::api::{DEFAULT_BLOCK_SIZE, MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use compressed_stream::BackendKind;

/// Which codec compresses a relation's blocks, and how hard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompressionSpec {
    pub kind: BackendKind,
    /// `0` selects the codec's default level.
    pub level: u32,
}

impl CompressionSpec {
    pub fn new(kind: BackendKind, level: u32) -> Self {
        Self { kind, level }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageOptions {
    /// Maximum uncompressed size of one block.
    pub block_size: usize,
    pub compression: CompressionSpec,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            compression: CompressionSpec::none(),
        }
    }
}

impl StorageOptions {
    pub fn with_compression(mut self, kind: BackendKind, level: u32) -> Self {
        self.compression = CompressionSpec::new(kind, level);
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Checks the block size bounds and resolves the compression level.
    pub fn validate(mut self) -> Result<Self> {
        if self.block_size < MIN_BLOCK_SIZE
            || self.block_size > MAX_BLOCK_SIZE
            || self.block_size % MIN_BLOCK_SIZE != 0
        {
            return Err(StorageError::InvalidOption(format!(
                "block size {} must be a multiple of {} between {} and {}",
                self.block_size, MIN_BLOCK_SIZE, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        self.compression.level = self.compression.kind.resolve_level(self.compression.level)?;
        Ok(self)
    }
}
