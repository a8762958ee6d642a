//! Classification of I/O faults raised by compression backends.

use std::io::ErrorKind;

/// How many consecutive transient faults an operation tolerates before the
/// fault is reported. Progress resets the count.
pub const MAX_TRANSIENT_RETRIES: usize = 64;

/// Returns true if an operation that failed with `kind` may be retried as is.
///
/// Only interruptions are transient. Everything else, including a write that
/// made no progress, is fatal to the stream.
pub fn is_retryable(kind: ErrorKind) -> bool {
    kind == ErrorKind::Interrupted
}
