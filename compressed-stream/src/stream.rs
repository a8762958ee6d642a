use crate::backend::{BackendKind, CompressionBackend, StreamMode};
use crate::error::{Result, StreamError};
use crate::retry::{is_retryable, MAX_TRANSIENT_RETRIES};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// A byte stream over an exclusively owned file, compressed by a backend chosen
/// at open time.
///
/// The backend (and with it the file) is released exactly once: by
/// [`CompressedStream::close`], or by `Drop` when the owner is torn down
/// without closing.
pub struct CompressedStream {
    backend: Option<Box<dyn CompressionBackend>>,
    kind: BackendKind,
    mode: StreamMode,
    bytes: u64,
}

impl CompressedStream {
    /// Opens a stream over `file` with the default level of `kind`.
    pub fn open(file: File, mode: StreamMode, kind: BackendKind) -> Result<Self> {
        Self::open_with_level(file, mode, kind, 0)
    }

    /// Opens a stream over `file`. `file` must have been opened for reading in
    /// `Read` mode and for writing in `Append` mode. On failure the file is
    /// closed before the error is returned.
    pub fn open_with_level(file: File, mode: StreamMode, kind: BackendKind, level: u32) -> Result<Self> {
        let backend = kind.create(file, mode, level)?;
        debug!(%kind, %mode, "opened compressed stream");
        Ok(Self::from_backend(backend, kind, mode))
    }

    /// Creates (or truncates) the file at `path` and opens a stream appending to it.
    pub fn create_path(path: impl AsRef<Path>, kind: BackendKind, level: u32) -> Result<Self> {
        let file = File::create(path.as_ref()).map_err(|source| StreamError::Io {
            op: "create",
            source,
        })?;
        Self::open_with_level(file, StreamMode::Append, kind, level)
    }

    /// Opens the file at `path` for reading through `kind`.
    pub fn open_path(path: impl AsRef<Path>, kind: BackendKind) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|source| StreamError::Io {
            op: "open",
            source,
        })?;
        Self::open(file, StreamMode::Read, kind)
    }

    /// Wraps an already constructed backend.
    pub fn from_backend(backend: Box<dyn CompressionBackend>, kind: BackendKind, mode: StreamMode) -> Self {
        Self {
            backend: Some(backend),
            kind,
            mode,
            bytes: 0,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }

    /// Uncompressed bytes written or read so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes
    }

    fn backend_for(&mut self, op: &'static str, mode: StreamMode) -> Result<&mut Box<dyn CompressionBackend>> {
        if self.mode != mode {
            return Err(StreamError::WrongMode { op, mode: self.mode });
        }
        self.backend.as_mut().ok_or(StreamError::Closed)
    }

    /// Writes all of `buf`.
    ///
    /// Partial writes are continued, interrupted writes are retried. A write
    /// that reports no progress fails with `WriteZero` rather than spinning.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        let backend = self.backend_for("write", StreamMode::Append)?;
        let mut written = 0;
        let mut transient = 0;
        while written < buf.len() {
            match backend.write(&buf[written..]) {
                Ok(0) => {
                    return Err(StreamError::Io {
                        op: "write to",
                        source: io::Error::new(io::ErrorKind::WriteZero, "backend made no progress"),
                    })
                }
                Ok(n) => {
                    written += n;
                    transient = 0;
                }
                Err(e) if is_retryable(e.kind()) && transient < MAX_TRANSIENT_RETRIES => {
                    transient += 1;
                }
                Err(source) => {
                    return Err(StreamError::Io {
                        op: "write to",
                        source,
                    })
                }
            }
        }
        self.bytes += written as u64;
        Ok(())
    }

    /// Reads up to `buf.len()` bytes, returning how many were read. `0` means
    /// end of stream; a short read is not an error.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let backend = self.backend_for("read", StreamMode::Read)?;
        let mut transient = 0;
        let n = loop {
            match backend.read(buf) {
                Ok(n) => break n,
                Err(e) if is_retryable(e.kind()) && transient < MAX_TRANSIENT_RETRIES => {
                    transient += 1;
                }
                Err(source) => {
                    return Err(StreamError::Io {
                        op: "read from",
                        source,
                    })
                }
            }
        };
        self.bytes += n as u64;
        Ok(n)
    }

    /// Reads until `buf` is full or the stream ends, returning the bytes read.
    pub fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    pub fn flush(&mut self) -> Result<()> {
        let backend = self.backend.as_mut().ok_or(StreamError::Closed)?;
        backend.flush().map_err(|source| StreamError::Io {
            op: "flush",
            source,
        })
    }

    /// Finishes the codec and releases the file. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let Some(backend) = self.backend.take() else {
            return Ok(());
        };
        debug!(kind = %self.kind, mode = %self.mode, bytes = self.bytes, "closing compressed stream");
        backend.close().map_err(|source| StreamError::Io {
            op: "close",
            source,
        })
    }
}

impl Drop for CompressedStream {
    fn drop(&mut self) {
        // Runs on teardown paths, so failures are logged, never raised.
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close compressed stream on drop");
        }
    }
}

impl std::fmt::Debug for CompressedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressedStream")
            .field("kind", &self.kind)
            .field("mode", &self.mode)
            .field("bytes", &self.bytes)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Accepts at most `chunk` bytes per call and records everything written.
    struct ShortWriter {
        chunk: usize,
        sink: Arc<Mutex<Vec<u8>>>,
        calls: Arc<AtomicUsize>,
    }

    impl CompressionBackend for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = buf.len().min(self.chunk);
            self.sink.lock().unwrap().extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn close(self: Box<Self>) -> io::Result<()> {
            Ok(())
        }
    }

    struct StuckWriter {
        calls: Arc<AtomicUsize>,
    }

    impl CompressionBackend for StuckWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn close(self: Box<Self>) -> io::Result<()> {
            Ok(())
        }
    }

    /// Fails the first `interrupts` calls with `Interrupted`, then fails or
    /// succeeds according to `then`.
    struct FlakyBackend {
        interrupts: usize,
        then: Option<io::ErrorKind>,
        /// Keep failing with `then` instead of failing once.
        sticky: bool,
        closes: Arc<AtomicUsize>,
    }

    impl FlakyBackend {
        fn step(&mut self, n: usize) -> io::Result<usize> {
            if self.interrupts > 0 {
                self.interrupts -= 1;
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            match self.then {
                Some(kind) => {
                    if !self.sticky {
                        self.then = None;
                    }
                    Err(io::Error::from(kind))
                }
                None => Ok(n),
            }
        }
    }

    impl CompressionBackend for FlakyBackend {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.step(buf.len())
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step(buf.len())?;
            buf[..n].fill(7);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn close(self: Box<Self>) -> io::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn flaky(interrupts: usize, then: Option<io::ErrorKind>) -> (Box<FlakyBackend>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let backend = Box::new(FlakyBackend {
            interrupts,
            then,
            sticky: true,
            closes: closes.clone(),
        });
        (backend, closes)
    }

    #[test]
    fn test_short_writes_are_continued() {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = Box::new(ShortWriter {
            chunk: 3,
            sink: sink.clone(),
            calls: calls.clone(),
        });
        let mut stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Append);

        let data: Vec<u8> = (0..10).collect();
        stream.write(&data).unwrap();

        assert_eq!(*sink.lock().unwrap(), data);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(stream.bytes_transferred(), 10);
    }

    #[test]
    fn test_zero_progress_write_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = Box::new(StuckWriter { calls: calls.clone() });
        let mut stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Append);

        let err = stream.write(b"abc").unwrap_err();
        match err {
            StreamError::Io { source, .. } => assert_eq!(source.kind(), io::ErrorKind::WriteZero),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_interrupted_write_is_retried() {
        let (backend, _) = flaky(3, None);
        let mut stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Append);
        stream.write(b"payload").unwrap();
        assert_eq!(stream.bytes_transferred(), 7);
    }

    #[test]
    fn test_backend_fault_is_not_retried() {
        let (backend, _) = flaky(1, Some(io::ErrorKind::PermissionDenied));
        let mut stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Append);
        let err = stream.write(b"payload").unwrap_err();
        assert!(matches!(err, StreamError::Io { ref source, .. } if source.kind() == io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn test_wouldblock_is_not_retried() {
        // Fails once with WouldBlock, then accepts everything.
        let backend = Box::new(FlakyBackend {
            interrupts: 0,
            then: Some(io::ErrorKind::WouldBlock),
            sticky: false,
            closes: Arc::new(AtomicUsize::new(0)),
        });
        let mut stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Append);
        let err = stream.write(b"payload").unwrap_err();
        assert!(matches!(err, StreamError::Io { ref source, .. } if source.kind() == io::ErrorKind::WouldBlock));
        assert_eq!(stream.bytes_transferred(), 0);
    }

    #[test]
    fn test_persistent_interrupts_eventually_fail() {
        let (backend, _) = flaky(usize::MAX, None);
        let mut stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Read);
        let mut buf = [0u8; 4];
        let err = stream.read(&mut buf).unwrap_err();
        assert!(matches!(err, StreamError::Io { ref source, .. } if source.kind() == io::ErrorKind::Interrupted));
    }

    #[test]
    fn test_interrupted_read_is_retried() {
        let (backend, _) = flaky(2, None);
        let mut stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Read);
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [7; 4]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (backend, closes) = flaky(0, None);
        let mut stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Append);
        stream.close().unwrap();
        stream.close().unwrap();
        drop(stream);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes_backend() {
        let (backend, closes) = flaky(0, None);
        let stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Read);
        drop(stream);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_operations_after_close_fail() {
        let (backend, _) = flaky(0, None);
        let mut stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Append);
        stream.close().unwrap();
        assert!(matches!(stream.write(b"x"), Err(StreamError::Closed)));
        assert!(matches!(stream.flush(), Err(StreamError::Closed)));
    }

    #[test]
    fn test_wrong_mode_is_rejected() {
        let (backend, _) = flaky(0, None);
        let mut stream = CompressedStream::from_backend(backend, BackendKind::None, StreamMode::Read);
        assert!(matches!(
            stream.write(b"x"),
            Err(StreamError::WrongMode { op: "write", mode: StreamMode::Read })
        ));
    }
}
