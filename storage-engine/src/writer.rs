//! Inserts into a relation without the caller caring how it is stored.

use crate::ao::AppendOnlyInsertDesc;
use crate::aocs::ColumnarInsertDesc;
use crate::error::Result;
use crate::relation::{AppendOnlyRelation, StorageKind};
use common::api::{SegmentNumber, TransactionId};
use common::tuple::Tuple;
use std::sync::Arc;

#[derive(Debug)]
pub enum TableWriter {
    Row(AppendOnlyInsertDesc),
    Column(ColumnarInsertDesc),
}

impl TableWriter {
    pub fn new(rel: &Arc<AppendOnlyRelation>, xid: TransactionId) -> Result<Self> {
        Ok(match rel.storage() {
            StorageKind::Row => TableWriter::Row(AppendOnlyInsertDesc::new(rel, xid)?),
            StorageKind::Column => TableWriter::Column(ColumnarInsertDesc::new(rel, xid)?),
        })
    }

    pub fn for_segment(rel: &Arc<AppendOnlyRelation>, segno: SegmentNumber, xid: TransactionId) -> Result<Self> {
        Ok(match rel.storage() {
            StorageKind::Row => TableWriter::Row(AppendOnlyInsertDesc::for_segment(rel, segno, xid)?),
            StorageKind::Column => TableWriter::Column(ColumnarInsertDesc::for_segment(rel, segno, xid)?),
        })
    }

    pub fn insert(&mut self, tuple: &Tuple) -> Result<u64> {
        match self {
            TableWriter::Row(desc) => desc.insert(tuple),
            TableWriter::Column(desc) => desc.insert(tuple),
        }
    }

    /// Commits the inserted rows. Returns how many there were.
    pub fn finish(self) -> Result<u64> {
        match self {
            TableWriter::Row(desc) => desc.finish(),
            TableWriter::Column(desc) => desc.finish(),
        }
    }
}
