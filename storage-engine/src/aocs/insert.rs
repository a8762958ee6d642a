use crate::block::BlockWriter;
use crate::error::Result;
use crate::relation::{AppendOnlyRelation, SegmentClaim, StorageKind, DEFAULT_SEGMENT};
use common::api::{SegmentNumber, TransactionId};
use common::disk_manager::FileNumber;
use common::tuple::{Tuple, TupleError};
use std::sync::Arc;
use tracing::debug;

/// Appends rows to one segment of a columnar relation, one block stream per
/// column.
#[derive(Debug)]
pub struct ColumnarInsertDesc {
    rel: Arc<AppendOnlyRelation>,
    claim: SegmentClaim,
    xid: TransactionId,
    writers: Vec<BlockWriter>,
    committed_rows: u64,
    inserted: u64,
}

impl ColumnarInsertDesc {
    pub fn new(rel: &Arc<AppendOnlyRelation>, xid: TransactionId) -> Result<Self> {
        Self::for_segment(rel, DEFAULT_SEGMENT, xid)
    }

    pub fn for_segment(rel: &Arc<AppendOnlyRelation>, segno: SegmentNumber, xid: TransactionId) -> Result<Self> {
        rel.expect_storage(StorageKind::Column)?;
        let claim = rel.claim_segment(segno)?;
        let columns = rel.file_count();
        let (eof, committed_rows) = match rel.segfiles().latest(segno) {
            Some(entry) => (entry.eof, entry.tuple_count),
            None => (vec![0; columns], 0),
        };

        let mut writers = Vec::with_capacity(columns);
        for column in 0..columns {
            let file = rel
                .disk()
                .open_for_append(rel.rel_id(), FileNumber::new(segno, column as u32))?;
            let start = eof.get(column).copied().unwrap_or(0);
            writers.push(BlockWriter::new(file, start, *rel.options()));
        }
        debug!(rel_id = rel.rel_id(), segno, xid, columns, "begin columnar insert");
        Ok(Self {
            rel: Arc::clone(rel),
            claim,
            xid,
            writers,
            committed_rows,
            inserted: 0,
        })
    }

    pub fn segno(&self) -> SegmentNumber {
        self.claim.segno()
    }

    /// Appends a row and returns its row number within the segment.
    pub fn insert(&mut self, tuple: &Tuple) -> Result<u64> {
        let schema = self.rel.schema();
        if tuple.values.len() != schema.column_count() {
            return Err(TupleError::Arity {
                expected: schema.column_count(),
                actual: tuple.values.len(),
            }
            .into());
        }
        // Encode every value before writing any, so a bad value leaves the
        // column streams aligned.
        let mut encoded = Vec::with_capacity(tuple.values.len());
        for (value, column) in tuple.values.iter().zip(&schema.columns) {
            let mut bytes = Vec::new();
            value.encode(column.column_type, &mut bytes)?;
            encoded.push(bytes);
        }
        for (writer, bytes) in self.writers.iter_mut().zip(&encoded) {
            writer.append_row(bytes)?;
        }

        let row_num = self.committed_rows + self.inserted;
        self.inserted += 1;
        Ok(row_num)
    }

    /// Flushes every column and publishes the new segment version. Returns the
    /// number of rows this descriptor inserted.
    pub fn finish(self) -> Result<u64> {
        let segno = self.claim.segno();
        let mut eof = Vec::with_capacity(self.writers.len());
        for writer in self.writers {
            eof.push(writer.finish()?);
        }
        self.rel
            .segfiles()
            .publish(segno, eof, self.committed_rows + self.inserted, self.xid);
        debug!(
            rel_id = self.rel.rel_id(),
            segno,
            xid = self.xid,
            rows = self.inserted,
            "finished columnar insert"
        );
        Ok(self.inserted)
    }
}
