//! Compression backends and the factory that selects one by kind.

mod identity;
mod lz4;
mod zlib;
mod zstandard;

pub use identity::IdentityBackend;
pub use lz4::Lz4Backend;
pub use zlib::ZlibBackend;
pub use zstandard::ZstdBackend;

use crate::error::{Result, StreamError};
use std::fs::File;
use std::io;
use std::str::FromStr;

/// How a stream uses its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Read,
    /// Write-only, appending from the current position.
    Append,
}

impl std::fmt::Display for StreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamMode::Read => write!(f, "read"),
            StreamMode::Append => write!(f, "append"),
        }
    }
}

/// The capability set every compression backend provides.
///
/// `read` and `write` follow `std::io` conventions: they may transfer fewer
/// bytes than requested, `Ok(0)` from `read` is end of stream, and errors carry
/// an [`io::ErrorKind`] that [`crate::is_retryable`] classifies.
pub trait CompressionBackend: Send {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn flush(&mut self) -> io::Result<()>;

    /// Finishes the codec and releases the file. Consumes the backend so it
    /// cannot be closed twice.
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// The compression algorithms a stream can be opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    #[default]
    None,
    Zlib,
    Zstd,
    Lz4,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::None => "none",
            BackendKind::Zlib => "zlib",
            BackendKind::Zstd => "zstd",
            BackendKind::Lz4 => "lz4",
        }
    }

    /// The accepted range of compression levels.
    pub fn level_range(&self) -> (u32, u32) {
        match self {
            BackendKind::None => (0, 0),
            BackendKind::Zlib => (1, 9),
            BackendKind::Zstd => (1, 19),
            BackendKind::Lz4 => (1, 1),
        }
    }

    pub fn default_level(&self) -> u32 {
        match self {
            BackendKind::None => 0,
            BackendKind::Zlib | BackendKind::Zstd | BackendKind::Lz4 => 1,
        }
    }

    /// Maps a requested level onto the accepted range. Level 0 means the
    /// backend default.
    pub fn resolve_level(&self, level: u32) -> Result<u32> {
        if level == 0 {
            return Ok(self.default_level());
        }
        let (min, max) = self.level_range();
        if level < min || level > max {
            return Err(StreamError::InvalidLevel {
                kind: *self,
                level,
                min,
                max,
            });
        }
        Ok(level)
    }

    /// Allocates backend state for `file`.
    pub fn create(
        &self,
        file: File,
        mode: StreamMode,
        level: u32,
    ) -> Result<Box<dyn CompressionBackend>> {
        let level = self.resolve_level(level)?;
        let backend: Box<dyn CompressionBackend> = match self {
            BackendKind::None => Box::new(IdentityBackend::new(file, mode)),
            BackendKind::Zlib => Box::new(ZlibBackend::new(file, mode, level)),
            BackendKind::Lz4 => Box::new(Lz4Backend::new(file, mode)),
            BackendKind::Zstd => {
                let backend = ZstdBackend::new(file, mode, level).map_err(|source| {
                    StreamError::Resource {
                        kind: *self,
                        source,
                    }
                })?;
                Box::new(backend)
            }
        };
        Ok(backend)
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for BackendKind {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => Ok(BackendKind::None),
            "zlib" => Ok(BackendKind::Zlib),
            "zstd" => Ok(BackendKind::Zstd),
            "lz4" => Ok(BackendKind::Lz4),
            other => Err(StreamError::UnknownKind(other.to_string())),
        }
    }
}

fn wrong_mode(op: &str, mode: StreamMode) -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        format!("{} on a {} mode backend", op, mode),
    )
}
