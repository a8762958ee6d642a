//! Column-oriented append-only storage.
//!
//! Each column of a segment lives in its own file of blocks, numbered
//! `column * MAX_SEGMENTS_PER_COLUMN + segno`. A block payload is a run of
//! encoded values of one column. Column files are blocked independently, so
//! the same row usually sits in differently numbered blocks of each column.

mod insert;
mod scan;

pub use insert::ColumnarInsertDesc;
pub use scan::ColumnarScanDesc;
