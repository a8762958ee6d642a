use super::split_rows;
use crate::block::{read_block_payload, BlockRef, SegmentId};
use crate::error::Result;
use crate::relation::{AppendOnlyRelation, StorageKind};
use common::api::{ScanDirection, SegmentNumber, Snapshot};
use common::disk_manager::SegmentFile;
use common::tuple::{Tuple, TupleSlot};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug)]
struct SegmentScan {
    segno: SegmentNumber,
    file: SegmentFile,
}

/// A block of the scan, in scan order across all segments.
#[derive(Debug, Clone, Copy)]
struct ScanBlock {
    segment: usize,
    block_no: usize,
    block: BlockRef,
}

#[derive(Debug)]
struct LoadedBlock {
    payload: Vec<u8>,
    rows: Vec<Range<usize>>,
}

/// Scan descriptor of a row relation.
///
/// The set of segments and their committed ends of file are resolved once, at
/// [`AppendOnlyScanDesc::begin`], with the metadata snapshot. Row visibility is
/// then decided by the data snapshot.
#[derive(Debug)]
pub struct AppendOnlyScanDesc {
    rel: Arc<AppendOnlyRelation>,
    data_snapshot: Arc<Snapshot>,
    segments: Vec<SegmentScan>,
    blocks: Vec<ScanBlock>,
    /// Index into `blocks`; -1 before the first block, `blocks.len()` after the last.
    block_pos: isize,
    loaded: Option<LoadedBlock>,
    /// Index of the last returned row within the loaded block.
    row_pos: isize,
}

impl AppendOnlyScanDesc {
    pub fn begin(
        rel: Arc<AppendOnlyRelation>,
        data_snapshot: Arc<Snapshot>,
        metadata_snapshot: &Snapshot,
    ) -> Result<Self> {
        rel.expect_storage(StorageKind::Row)?;
        let mut segments = Vec::new();
        let mut blocks = Vec::new();
        for entry in rel.segfiles().visible(metadata_snapshot) {
            if entry.tuple_count == 0 {
                continue;
            }
            let (file, index) = rel.open_segment_for_scan(&entry, 0)?;
            let segment = segments.len();
            blocks.extend(index.into_iter().enumerate().map(|(block_no, block)| ScanBlock {
                segment,
                block_no,
                block,
            }));
            segments.push(SegmentScan {
                segno: entry.segno,
                file,
            });
        }
        debug!(
            rel_id = rel.rel_id(),
            segments = segments.len(),
            blocks = blocks.len(),
            "begin append-only scan"
        );
        Ok(Self {
            rel,
            data_snapshot,
            segments,
            blocks,
            block_pos: -1,
            loaded: None,
            row_pos: -1,
        })
    }

    pub fn relation(&self) -> &Arc<AppendOnlyRelation> {
        &self.rel
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Stores the next visible row in `direction` into `slot`. Returns false
    /// and clears the slot when the scan is exhausted in that direction.
    pub fn getnext(&mut self, direction: ScanDirection, slot: &mut TupleSlot) -> Result<bool> {
        let step: isize = match direction {
            ScanDirection::Forward => 1,
            ScanDirection::Backward => -1,
        };
        loop {
            if let Some(loaded) = &self.loaded {
                let candidate = self.row_pos + step;
                if candidate >= 0 && (candidate as usize) < loaded.rows.len() {
                    self.row_pos = candidate;
                    let scan_block = &self.blocks[self.block_pos as usize];
                    let segno = self.segments[scan_block.segment].segno;
                    let row_num = scan_block.block.first_row + candidate as u64;
                    if self.rel.visimap().is_hidden(segno, row_num, &self.data_snapshot) {
                        trace!(segno, row_num, "skipping deleted row");
                        continue;
                    }
                    let bytes = &loaded.payload[loaded.rows[candidate as usize].clone()];
                    slot.store(Tuple::deserialize(bytes, self.rel.schema())?);
                    return Ok(true);
                }
            }

            let next = self.block_pos + step;
            if next < 0 || next as usize >= self.blocks.len() {
                self.block_pos = if next < 0 { -1 } else { self.blocks.len() as isize };
                self.loaded = None;
                slot.clear();
                return Ok(false);
            }
            self.block_pos = next;
            let loaded = self.load_block(next as usize)?;
            self.row_pos = match direction {
                ScanDirection::Forward => -1,
                ScanDirection::Backward => loaded.rows.len() as isize,
            };
            self.loaded = Some(loaded);
        }
    }

    fn load_block(&self, pos: usize) -> Result<LoadedBlock> {
        let scan_block = self.blocks[pos];
        let segment = SegmentId {
            rel_id: self.rel.rel_id(),
            segno: self.segments[scan_block.segment].segno,
        };
        let file = &self.segments[scan_block.segment].file;
        let payload = read_block_payload(file, segment, scan_block.block_no, &scan_block.block)?;
        let rows = split_rows(segment, scan_block.block_no, &payload, scan_block.block.header.row_count)?;
        Ok(LoadedBlock { payload, rows })
    }

    /// Moves the cursor back before the first row. The resolved segments are
    /// kept.
    pub fn rescan(&mut self) {
        trace!(rel_id = self.rel.rel_id(), "rescan append-only scan");
        self.block_pos = -1;
        self.loaded = None;
        self.row_pos = -1;
    }

    /// Releases the descriptor and its open files.
    pub fn end(self) {
        debug!(rel_id = self.rel.rel_id(), "end append-only scan");
    }
}
