//! Versioned metadata of the segment files of one append-only relation.
//!
//! The committed end of each segment file lives here, not in the file system.
//! Every committed insert publishes a new version of its segment's entry and
//! retires the previous one, so a scan sees exactly the data committed as of
//! its metadata snapshot.

use common::api::{SegmentNumber, Snapshot, TransactionId};
use parking_lot::RwLock;
use tracing::debug;

/// One version of a segment file's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegFileEntry {
    pub segno: SegmentNumber,
    /// Committed end of file, one per physical file: a single entry for row
    /// relations, one per column for columnar relations.
    pub eof: Vec<u64>,
    pub tuple_count: u64,
    pub xmin: TransactionId,
    pub xmax: Option<TransactionId>,
}

#[derive(Debug, Default)]
pub struct SegFileCatalog {
    versions: RwLock<Vec<SegFileEntry>>,
}

impl SegFileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the newest version of `segno`, visible or not.
    pub fn latest(&self, segno: SegmentNumber) -> Option<SegFileEntry> {
        let versions = self.versions.read();
        versions
            .iter()
            .rev()
            .find(|entry| entry.segno == segno && entry.xmax.is_none())
            .cloned()
    }

    /// Publishes a new version of `segno` created by `xid` and retires the
    /// current one.
    pub fn publish(&self, segno: SegmentNumber, eof: Vec<u64>, tuple_count: u64, xid: TransactionId) -> SegFileEntry {
        let mut versions = self.versions.write();
        for entry in versions.iter_mut() {
            if entry.segno == segno && entry.xmax.is_none() {
                entry.xmax = Some(xid);
            }
        }
        let entry = SegFileEntry {
            segno,
            eof,
            tuple_count,
            xmin: xid,
            xmax: None,
        };
        debug!(segno, xid, tuple_count, eof = ?entry.eof, "published segment file version");
        versions.push(entry.clone());
        entry
    }

    /// Returns the versions visible to `snapshot`, ordered by segment number.
    ///
    /// Under [`Snapshot::Any`] every version is returned, including retired
    /// ones, so the same rows are counted once per version.
    pub fn visible(&self, snapshot: &Snapshot) -> Vec<SegFileEntry> {
        let versions = self.versions.read();
        let mut visible: Vec<SegFileEntry> = versions
            .iter()
            .filter(|entry| snapshot.version_visible(entry.xmin, entry.xmax))
            .cloned()
            .collect();
        visible.sort_by_key(|entry| entry.segno);
        visible
    }

    pub fn total_tuple_count(&self, snapshot: &Snapshot) -> u64 {
        self.visible(snapshot).iter().map(|entry| entry.tuple_count).sum()
    }

    pub fn version_count(&self) -> usize {
        self.versions.read().len()
    }
}
