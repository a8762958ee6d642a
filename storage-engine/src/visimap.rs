//! Visibility map of deleted rows.
//!
//! Append-only files are never rewritten, so a delete only records which
//! transaction removed a row. Whether the row is hidden depends on the data
//! snapshot of the scan reading it.

use common::api::{SegmentNumber, Snapshot, TransactionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::trace;

#[derive(Debug, Default)]
pub struct Visimap {
    deleted: RwLock<HashMap<(SegmentNumber, u64), TransactionId>>,
}

impl Visimap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `xid` deleted row `row_num` of segment `segno`. Returns
    /// false if the row was already deleted.
    pub fn delete(&self, segno: SegmentNumber, row_num: u64, xid: TransactionId) -> bool {
        let mut deleted = self.deleted.write();
        if deleted.contains_key(&(segno, row_num)) {
            return false;
        }
        trace!(segno, row_num, xid, "row deleted");
        deleted.insert((segno, row_num), xid);
        true
    }

    pub fn is_hidden(&self, segno: SegmentNumber, row_num: u64, snapshot: &Snapshot) -> bool {
        self.deleted
            .read()
            .get(&(segno, row_num))
            .is_some_and(|&deleter| snapshot.sees_deletion(deleter))
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.read().is_empty()
    }
}
