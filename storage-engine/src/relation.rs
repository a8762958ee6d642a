//! Append-only relations: descriptor, files and metadata.

use crate::block::{read_block_index, BlockRef, SegmentId};
use crate::error::{Result, StorageError};
use crate::options::StorageOptions;
use crate::segfile::{SegFileCatalog, SegFileEntry};
use crate::visimap::Visimap;
use common::api::{RelationId, SegmentNumber, Snapshot, TransactionId, MAX_SEGMENTS_PER_COLUMN};
use common::disk_manager::{DiskManager, FileNumber, SegmentFile};
use common::tuple::Schema;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// The segment inserts go to when the caller does not pick one.
pub const DEFAULT_SEGMENT: SegmentNumber = 1;

/// How a relation lays out its rows on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Whole rows, one file per segment.
    Row,
    /// One file per column per segment.
    Column,
}

impl StorageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StorageKind::Row => "row",
            StorageKind::Column => "column",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDesc {
    pub rel_id: RelationId,
    pub name: String,
    pub schema: Schema,
    pub storage: StorageKind,
    pub options: StorageOptions,
}

impl RelationDesc {
    pub fn new(rel_id: RelationId, name: impl Into<String>, schema: Schema, storage: StorageKind) -> Self {
        Self {
            rel_id,
            name: name.into(),
            schema,
            storage,
            options: StorageOptions::default(),
        }
    }

    pub fn with_options(mut self, options: StorageOptions) -> Self {
        self.options = options;
        self
    }
}

/// An append-only relation and everything needed to read or extend it.
#[derive(Debug)]
pub struct AppendOnlyRelation {
    desc: RelationDesc,
    disk: Arc<DiskManager>,
    segfiles: SegFileCatalog,
    visimap: Visimap,
    writers: Mutex<HashSet<SegmentNumber>>,
}

impl AppendOnlyRelation {
    /// Validates the descriptor and creates an empty relation.
    pub fn create(desc: RelationDesc, disk: Arc<DiskManager>) -> Result<Arc<Self>> {
        if desc.schema.column_count() == 0 {
            return Err(StorageError::InvalidOption(format!(
                "relation {} has no columns",
                desc.name
            )));
        }
        let options = desc.options.validate()?;
        let desc = RelationDesc { options, ..desc };
        debug!(
            rel_id = desc.rel_id,
            name = %desc.name,
            storage = %desc.storage,
            compression = %desc.options.compression.kind,
            level = desc.options.compression.level,
            "created append-only relation"
        );
        Ok(Arc::new(Self {
            desc,
            disk,
            segfiles: SegFileCatalog::new(),
            visimap: Visimap::new(),
            writers: Mutex::new(HashSet::new()),
        }))
    }

    pub fn desc(&self) -> &RelationDesc {
        &self.desc
    }

    pub fn rel_id(&self) -> RelationId {
        self.desc.rel_id
    }

    pub fn schema(&self) -> &Schema {
        &self.desc.schema
    }

    pub fn storage(&self) -> StorageKind {
        self.desc.storage
    }

    pub fn options(&self) -> &StorageOptions {
        &self.desc.options
    }

    pub fn disk(&self) -> &DiskManager {
        &self.disk
    }

    pub fn segfiles(&self) -> &SegFileCatalog {
        &self.segfiles
    }

    pub fn visimap(&self) -> &Visimap {
        &self.visimap
    }

    /// Number of physical files per segment.
    pub fn file_count(&self) -> usize {
        match self.desc.storage {
            StorageKind::Row => 1,
            StorageKind::Column => self.desc.schema.column_count(),
        }
    }

    /// Rows committed as of `snapshot`, before deletions.
    pub fn tuple_count(&self, snapshot: &Snapshot) -> u64 {
        self.segfiles.total_tuple_count(snapshot)
    }

    /// Marks a row deleted by `xid`. Returns false if it already was.
    pub fn delete(&self, segno: SegmentNumber, row_num: u64, xid: TransactionId) -> bool {
        self.visimap.delete(segno, row_num, xid)
    }

    /// Removes every file of the relation.
    pub fn drop_storage(&self) -> Result<()> {
        debug!(rel_id = self.desc.rel_id, "dropping relation files");
        self.disk.remove_relation_files(self.desc.rel_id)?;
        Ok(())
    }

    /// Opens one physical file of a visible segment version for scanning and
    /// reads its block headers up to `eof`.
    pub(crate) fn open_segment_for_scan(
        &self,
        entry: &SegFileEntry,
        column: usize,
    ) -> Result<(SegmentFile, Vec<BlockRef>)> {
        let segment = SegmentId {
            rel_id: self.desc.rel_id,
            segno: entry.segno,
        };
        let eof = *entry
            .eof
            .get(column)
            .ok_or_else(|| segment.corrupt(format!("no end of file recorded for file {}", column)))?;
        let file = self
            .disk
            .open_for_scan(self.desc.rel_id, FileNumber::new(entry.segno, column as u32))?;
        let blocks = read_block_index(&file, segment, eof)?;
        let rows: u64 = blocks.iter().map(|b| b.header.row_count as u64).sum();
        if rows != entry.tuple_count {
            return Err(segment.corrupt(format!(
                "file {} holds {} rows but the segment records {}",
                column, rows, entry.tuple_count
            )));
        }
        Ok((file, blocks))
    }

    pub(crate) fn expect_storage(&self, expected: StorageKind) -> Result<()> {
        if self.desc.storage != expected {
            return Err(StorageError::WrongStorageKind {
                rel_id: self.desc.rel_id,
                expected: expected.name(),
            });
        }
        Ok(())
    }

    /// Claims `segno` for a single writer until the returned guard drops.
    pub(crate) fn claim_segment(self: &Arc<Self>, segno: SegmentNumber) -> Result<SegmentClaim> {
        if segno >= MAX_SEGMENTS_PER_COLUMN {
            return Err(StorageError::InvalidOption(format!(
                "segment number {} must be below {}",
                segno, MAX_SEGMENTS_PER_COLUMN
            )));
        }
        if !self.writers.lock().insert(segno) {
            return Err(StorageError::SegmentInUse {
                rel_id: self.desc.rel_id,
                segno,
            });
        }
        Ok(SegmentClaim {
            rel: Arc::clone(self),
            segno,
        })
    }
}

/// Exclusive write access to one segment of a relation.
#[derive(Debug)]
pub(crate) struct SegmentClaim {
    rel: Arc<AppendOnlyRelation>,
    segno: SegmentNumber,
}

impl SegmentClaim {
    pub(crate) fn segno(&self) -> SegmentNumber {
        self.segno
    }
}

impl Drop for SegmentClaim {
    fn drop(&mut self) {
        self.rel.writers.lock().remove(&self.segno);
    }
}
