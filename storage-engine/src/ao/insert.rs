use super::ROW_LENGTH_SIZE;
use crate::block::BlockWriter;
use crate::error::Result;
use crate::relation::{AppendOnlyRelation, SegmentClaim, StorageKind, DEFAULT_SEGMENT};
use common::api::{SegmentNumber, TransactionId};
use common::disk_manager::FileNumber;
use common::tuple::Tuple;
use std::sync::Arc;
use tracing::debug;

/// Appends rows to one segment of a row relation.
///
/// Rows become visible only when [`AppendOnlyInsertDesc::finish`] publishes the
/// new end of file. Dropping the descriptor without finishing abandons the
/// rows; the bytes stay past the committed end of file and are overwritten by
/// the next writer.
#[derive(Debug)]
pub struct AppendOnlyInsertDesc {
    rel: Arc<AppendOnlyRelation>,
    claim: SegmentClaim,
    xid: TransactionId,
    writer: BlockWriter,
    committed_rows: u64,
    inserted: u64,
    record: Vec<u8>,
}

impl AppendOnlyInsertDesc {
    pub fn new(rel: &Arc<AppendOnlyRelation>, xid: TransactionId) -> Result<Self> {
        Self::for_segment(rel, DEFAULT_SEGMENT, xid)
    }

    pub fn for_segment(rel: &Arc<AppendOnlyRelation>, segno: SegmentNumber, xid: TransactionId) -> Result<Self> {
        rel.expect_storage(StorageKind::Row)?;
        let claim = rel.claim_segment(segno)?;
        let (eof, committed_rows) = match rel.segfiles().latest(segno) {
            Some(entry) => (entry.eof.first().copied().unwrap_or(0), entry.tuple_count),
            None => (0, 0),
        };
        let file = rel.disk().open_for_append(rel.rel_id(), FileNumber::new(segno, 0))?;
        debug!(rel_id = rel.rel_id(), segno, xid, eof, "begin append-only insert");
        Ok(Self {
            rel: Arc::clone(rel),
            claim,
            xid,
            writer: BlockWriter::new(file, eof, *rel.options()),
            committed_rows,
            inserted: 0,
            record: Vec::new(),
        })
    }

    pub fn segno(&self) -> SegmentNumber {
        self.claim.segno()
    }

    /// Appends a row and returns its row number within the segment.
    pub fn insert(&mut self, tuple: &Tuple) -> Result<u64> {
        self.record.clear();
        self.record.extend_from_slice(&[0; ROW_LENGTH_SIZE]);
        tuple.serialize_into(self.rel.schema(), &mut self.record)?;
        let len = (self.record.len() - ROW_LENGTH_SIZE) as u32;
        self.record[..ROW_LENGTH_SIZE].copy_from_slice(&len.to_le_bytes());
        self.writer.append_row(&self.record)?;

        let row_num = self.committed_rows + self.inserted;
        self.inserted += 1;
        Ok(row_num)
    }

    /// Flushes the last block and publishes the new segment version. Returns
    /// the number of rows this descriptor inserted.
    pub fn finish(self) -> Result<u64> {
        let segno = self.claim.segno();
        let eof = self.writer.finish()?;
        self.rel
            .segfiles()
            .publish(segno, vec![eof], self.committed_rows + self.inserted, self.xid);
        debug!(
            rel_id = self.rel.rel_id(),
            segno,
            xid = self.xid,
            rows = self.inserted,
            eof,
            "finished append-only insert"
        );
        Ok(self.inserted)
    }
}
