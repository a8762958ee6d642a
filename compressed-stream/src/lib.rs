//! Byte streams over temporary files with a pluggable compression backend.
//!
//! A [`CompressedStream`] owns its file and a [`CompressionBackend`] chosen at
//! open time by [`BackendKind`]. Callers write, read and close without knowing
//! which codec is active:
//!
//! ```no_run
//! use compressed_stream::{BackendKind, CompressedStream, StreamMode};
//!
//! let file = std::fs::File::create("spill.tmp")?;
//! let mut stream = CompressedStream::open(file, StreamMode::Append, BackendKind::Zlib)?;
//! stream.write(b"spilled bytes")?;
//! stream.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
mod error;
pub mod retry;
mod stream;

pub use backend::{BackendKind, CompressionBackend, StreamMode};
pub use error::{Result, StreamError};
pub use retry::is_retryable;
pub use stream::CompressedStream;
