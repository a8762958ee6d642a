//! Defines the common vocabulary shared by the storage and executor layers:
//! identifiers, size limits, scan direction and visibility snapshots.

/// Identifies a transaction. `INVALID_TRANSACTION_ID` is never visible.
pub type TransactionId = u64;

/// Identifies a relation in the catalog.
pub type RelationId = u32;

/// Identifies a segment file of an append-only relation.
pub type SegmentNumber = u32;

/// A constant to represent an invalid transaction ID.
pub const INVALID_TRANSACTION_ID: TransactionId = 0;

/// The number of segment numbers reserved per column when naming columnar files.
pub const MAX_SEGMENTS_PER_COLUMN: u32 = 128;

/// The default size of a storage block in bytes, before compression.
pub const DEFAULT_BLOCK_SIZE: usize = 32 * 1024;

/// The smallest allowed block size. Block sizes must be a multiple of it.
pub const MIN_BLOCK_SIZE: usize = 8 * 1024;

/// The largest allowed block size.
pub const MAX_BLOCK_SIZE: usize = 2 * 1024 * 1024;

/// The direction in which an executor walks a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    #[default]
    Forward,
    Backward,
}

impl std::fmt::Display for ScanDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanDirection::Forward => write!(f, "forward"),
            ScanDirection::Backward => write!(f, "backward"),
        }
    }
}

/// An MVCC snapshot: transactions below `xmin` are finished, transactions at or
/// above `xmax` had not started, and `in_progress` lists the ones in between that
/// were still running when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MvccSnapshot {
    pub xmin: TransactionId,
    pub xmax: TransactionId,
    pub in_progress: Vec<TransactionId>,
}

impl MvccSnapshot {
    pub fn new(xmin: TransactionId, xmax: TransactionId, in_progress: Vec<TransactionId>) -> Self {
        Self {
            xmin,
            xmax,
            in_progress,
        }
    }

    /// A snapshot that sees every transaction below `xmax`.
    pub fn up_to(xmax: TransactionId) -> Self {
        Self::new(xmax, xmax, Vec::new())
    }

    /// Returns true if the effects of `xid` are visible to this snapshot.
    pub fn xid_visible(&self, xid: TransactionId) -> bool {
        if xid == INVALID_TRANSACTION_ID || xid >= self.xmax {
            return false;
        }
        xid < self.xmin || !self.in_progress.contains(&xid)
    }
}

/// The visibility context of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// Sees every tuple version, committed or not, deleted or not.
    Any,
    /// Sees the versions committed before the snapshot was taken.
    Mvcc(MvccSnapshot),
}

impl Snapshot {
    pub fn is_any(&self) -> bool {
        matches!(self, Snapshot::Any)
    }

    /// Returns true if a version created by `xmin` and possibly deleted by `xmax`
    /// is visible.
    pub fn version_visible(&self, xmin: TransactionId, xmax: Option<TransactionId>) -> bool {
        match self {
            Snapshot::Any => true,
            Snapshot::Mvcc(snapshot) => {
                snapshot.xid_visible(xmin) && !xmax.is_some_and(|x| snapshot.xid_visible(x))
            }
        }
    }

    /// Returns true if a deletion performed by `deleter` hides the row from this
    /// snapshot. `Snapshot::Any` sees deleted rows.
    pub fn sees_deletion(&self, deleter: TransactionId) -> bool {
        match self {
            Snapshot::Any => false,
            Snapshot::Mvcc(snapshot) => snapshot.xid_visible(deleter),
        }
    }
}
