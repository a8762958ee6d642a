//! Row-oriented append-only storage.
//!
//! Each segment is one file of blocks. A block payload is a run of rows, each
//! stored as a little-endian `u32` length followed by the encoded tuple.

mod insert;
mod scan;

pub use insert::AppendOnlyInsertDesc;
pub use scan::AppendOnlyScanDesc;

use crate::block::SegmentId;
use crate::error::Result;
use std::ops::Range;

const ROW_LENGTH_SIZE: usize = 4;

/// Splits a row block payload into the byte ranges of its rows.
fn split_rows(segment: SegmentId, block_no: usize, payload: &[u8], row_count: u32) -> Result<Vec<Range<usize>>> {
    let mut rows = Vec::with_capacity(row_count as usize);
    let mut offset = 0;
    while offset < payload.len() {
        let len_bytes = payload
            .get(offset..offset + ROW_LENGTH_SIZE)
            .ok_or_else(|| segment.corrupt(format!("truncated row length in block {}", block_no)))?;
        let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        let start = offset + ROW_LENGTH_SIZE;
        if start + len > payload.len() {
            return Err(segment.corrupt(format!("row at offset {} overruns block {}", offset, block_no)));
        }
        rows.push(start..start + len);
        offset = start + len;
    }
    if rows.len() != row_count as usize {
        return Err(segment.corrupt(format!(
            "block {} holds {} rows but its header records {}",
            block_no,
            rows.len(),
            row_count
        )));
    }
    Ok(rows)
}
