use crate::backend::{BackendKind, StreamMode};
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Backend state could not be allocated or the codec failed to initialize.
    /// Nothing from the failed open is left alive.
    #[error("could not initialize {kind} compression backend: {source}")]
    Resource {
        kind: BackendKind,
        #[source]
        source: io::Error,
    },

    #[error("could not {op} temporary file: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("cannot {op} a stream opened in {mode} mode")]
    WrongMode { op: &'static str, mode: StreamMode },

    #[error("stream is closed")]
    Closed,

    #[error("unknown compression type: {0}")]
    UnknownKind(String),

    #[error("compression level {level} is out of range {min}..={max} for {kind}")]
    InvalidLevel {
        kind: BackendKind,
        level: u32,
        min: u32,
        max: u32,
    },
}

pub type Result<T, E = StreamError> = std::result::Result<T, E>;
