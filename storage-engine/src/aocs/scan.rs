use crate::block::{read_block_payload, BlockRef, SegmentId};
use crate::error::{Result, StorageError};
use crate::relation::{AppendOnlyRelation, StorageKind};
use common::api::{ScanDirection, SegmentNumber, Snapshot};
use common::disk_manager::SegmentFile;
use common::tuple::{TupleSlot, Type, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// Reads the values of one column of one segment, block by block.
#[derive(Debug)]
struct ColumnReader {
    column: usize,
    column_type: Type,
    file: SegmentFile,
    blocks: Vec<BlockRef>,
    /// Index of the next block to load.
    next_block: usize,
    payload: Vec<u8>,
    offset: usize,
    rows_left: u32,
}

impl ColumnReader {
    fn next_value(&mut self, segment: SegmentId) -> Result<Value> {
        while self.rows_left == 0 {
            if self.offset != self.payload.len() {
                return Err(segment.corrupt(format!(
                    "column {} block {} has {} trailing bytes",
                    self.column,
                    self.next_block - 1,
                    self.payload.len() - self.offset
                )));
            }
            let block_no = self.next_block;
            let block = self.blocks.get(block_no).ok_or_else(|| {
                segment.corrupt(format!("column {} ran out of blocks", self.column))
            })?;
            self.payload = read_block_payload(&self.file, segment, block_no, block)?;
            self.offset = 0;
            self.rows_left = block.header.row_count;
            self.next_block += 1;
        }
        let value = Value::decode(&self.payload, &mut self.offset, self.column_type)?;
        self.rows_left -= 1;
        Ok(value)
    }

    fn reset(&mut self) {
        self.next_block = 0;
        self.payload.clear();
        self.offset = 0;
        self.rows_left = 0;
    }
}

#[derive(Debug)]
struct SegmentScan {
    segno: SegmentNumber,
    row_count: u64,
    next_row: u64,
    /// Readers of the needed columns only.
    readers: Vec<ColumnReader>,
}

/// Scan descriptor of a columnar relation.
///
/// Only the columns marked in the projection are opened, read and
/// decompressed. Every other column comes back as [`Value::Null`].
#[derive(Debug)]
pub struct ColumnarScanDesc {
    rel: Arc<AppendOnlyRelation>,
    data_snapshot: Arc<Snapshot>,
    proj: Vec<bool>,
    segments: Vec<SegmentScan>,
    current: usize,
    values: Vec<Value>,
}

impl ColumnarScanDesc {
    pub fn begin(
        rel: Arc<AppendOnlyRelation>,
        data_snapshot: Arc<Snapshot>,
        metadata_snapshot: &Snapshot,
        proj: &[bool],
    ) -> Result<Self> {
        rel.expect_storage(StorageKind::Column)?;
        let column_count = rel.schema().column_count();
        if proj.len() != column_count {
            return Err(StorageError::ProjectionMismatch {
                rel_id: rel.rel_id(),
                expected: column_count,
                actual: proj.len(),
            });
        }

        let mut segments = Vec::new();
        for entry in rel.segfiles().visible(metadata_snapshot) {
            if entry.tuple_count == 0 {
                continue;
            }
            if entry.eof.len() != column_count {
                return Err(SegmentId {
                    rel_id: rel.rel_id(),
                    segno: entry.segno,
                }
                .corrupt(format!(
                    "segment records {} column files but the relation has {} columns",
                    entry.eof.len(),
                    column_count
                )));
            }
            let mut readers = Vec::new();
            for (column, _) in proj.iter().enumerate().filter(|(_, needed)| **needed) {
                let (file, blocks) = rel.open_segment_for_scan(&entry, column)?;
                readers.push(ColumnReader {
                    column,
                    column_type: rel.schema().columns[column].column_type,
                    file,
                    blocks,
                    next_block: 0,
                    payload: Vec::new(),
                    offset: 0,
                    rows_left: 0,
                });
            }
            segments.push(SegmentScan {
                segno: entry.segno,
                row_count: entry.tuple_count,
                next_row: 0,
                readers,
            });
        }
        debug!(
            rel_id = rel.rel_id(),
            segments = segments.len(),
            columns = proj.iter().filter(|needed| **needed).count(),
            "begin columnar scan"
        );
        Ok(Self {
            rel,
            data_snapshot,
            proj: proj.to_vec(),
            segments,
            current: 0,
            values: vec![Value::Null; column_count],
        })
    }

    pub fn relation(&self) -> &Arc<AppendOnlyRelation> {
        &self.rel
    }

    pub fn projection(&self) -> &[bool] {
        &self.proj
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Number of column files this scan reads.
    pub fn open_file_count(&self) -> usize {
        self.segments.iter().map(|segment| segment.readers.len()).sum()
    }

    /// Stores the next visible row into `slot`, which must be as wide as the
    /// relation. Only forward scans are supported.
    pub fn getnext(&mut self, direction: ScanDirection, slot: &mut TupleSlot) -> Result<bool> {
        if direction != ScanDirection::Forward {
            return Err(StorageError::UnsupportedDirection {
                direction,
                storage: StorageKind::Column.name(),
            });
        }
        let rel_id = self.rel.rel_id();
        if slot.column_count() != self.proj.len() {
            return Err(StorageError::ProjectionMismatch {
                rel_id,
                expected: self.proj.len(),
                actual: slot.column_count(),
            });
        }
        while let Some(segment) = self.segments.get_mut(self.current) {
            if segment.next_row >= segment.row_count {
                self.current += 1;
                continue;
            }
            let row_num = segment.next_row;
            segment.next_row += 1;

            // Deleted rows still advance every column reader.
            let id = SegmentId {
                rel_id,
                segno: segment.segno,
            };
            for reader in &mut segment.readers {
                self.values[reader.column] = reader.next_value(id)?;
            }
            if self.rel.visimap().is_hidden(segment.segno, row_num, &self.data_snapshot) {
                trace!(segno = segment.segno, row_num, "skipping deleted row");
                continue;
            }

            let out = slot.fill();
            for reader in &segment.readers {
                out[reader.column] = std::mem::replace(&mut self.values[reader.column], Value::Null);
            }
            return Ok(true);
        }
        slot.clear();
        Ok(false)
    }

    /// Moves every column reader back to the first row. The resolved segments
    /// and the projection are kept.
    pub fn rescan(&mut self) {
        trace!(rel_id = self.rel.rel_id(), "rescan columnar scan");
        for segment in &mut self.segments {
            segment.next_row = 0;
            for reader in &mut segment.readers {
                reader.reset();
            }
        }
        self.current = 0;
    }

    pub fn end(self) {
        debug!(rel_id = self.rel.rel_id(), "end columnar scan");
    }
}
