use common::api::{MvccSnapshot, ScanDirection, Snapshot};
use std::path::PathBuf;
use std::sync::Arc;
use storage_engine::CompressionSpec;

/// Per-query execution state handed to every executor call.
#[derive(Debug, Clone)]
pub struct ExecContext {
    /// Decides which rows a scan returns.
    pub snapshot: Arc<Snapshot>,
    /// The snapshot of the running transaction. Segment file metadata is read
    /// with it whenever the data snapshot is [`Snapshot::Any`].
    pub transaction_snapshot: Arc<Snapshot>,
    pub direction: ScanDirection,
    pub workfile_dir: PathBuf,
    pub workfile_compression: CompressionSpec,
}

impl ExecContext {
    /// A forward-scanning context whose data snapshot is the transaction
    /// snapshot.
    pub fn new(transaction_snapshot: MvccSnapshot) -> Self {
        let snapshot = Arc::new(Snapshot::Mvcc(transaction_snapshot));
        Self {
            snapshot: Arc::clone(&snapshot),
            transaction_snapshot: snapshot,
            direction: ScanDirection::Forward,
            workfile_dir: std::env::temp_dir(),
            workfile_compression: CompressionSpec::none(),
        }
    }

    pub fn with_data_snapshot(mut self, snapshot: Snapshot) -> Self {
        self.snapshot = Arc::new(snapshot);
        self
    }

    pub fn with_direction(mut self, direction: ScanDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_workfiles(mut self, dir: impl Into<PathBuf>, compression: CompressionSpec) -> Self {
        self.workfile_dir = dir.into();
        self.workfile_compression = compression;
        self
    }

    /// The snapshot segment file metadata is read with. `Snapshot::Any` would
    /// see every version of every segment, so the transaction snapshot stands
    /// in for it.
    pub fn metadata_snapshot(&self) -> Arc<Snapshot> {
        if self.snapshot.is_any() {
            Arc::clone(&self.transaction_snapshot)
        } else {
            Arc::clone(&self.snapshot)
        }
    }
}
