//! The begin/next/rescan/end state machine of an append-only table scan.
//!
//! ```text
//!          begin               end
//!   Init ---------> Scanning ------> Init
//!                   |      ^
//!                   +------+
//!                    rescan
//! ```
//!
//! A scan descriptor exists exactly while the state is `Scanning`. Row
//! relations get an [`AppendOnlyScanDesc`]; columnar relations get a
//! [`ColumnarScanDesc`] together with the [`ColumnProjection`] computed at
//! `begin`.

use super::column_projection::ColumnProjection;
use crate::context::ExecContext;
use crate::expression::Expression;
use crate::{QueryError, Result};
use common::tuple::TupleSlot;
use std::sync::Arc;
use storage_engine::{AppendOnlyRelation, AppendOnlyScanDesc, ColumnarScanDesc, StorageKind};
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Init,
    Scanning,
}

/// Scanner state of a columnar scan.
#[derive(Debug)]
pub struct ColumnarScanOpaque {
    pub desc: ColumnarScanDesc,
    /// Fixed for the lifetime of the scan; rescans reuse it.
    pub projection: ColumnProjection,
}

#[derive(Debug)]
pub enum ScanOpaque {
    Row(AppendOnlyScanDesc),
    Columnar(ColumnarScanOpaque),
}

/// One active or idle scan of an append-only relation.
///
/// Dropping a `ScanState` that is still scanning ends the scan.
#[derive(Debug)]
pub struct ScanState {
    relation: Arc<AppendOnlyRelation>,
    target_list: Vec<Expression>,
    quals: Vec<Expression>,
    phase: ScanPhase,
    opaque: Option<Box<ScanOpaque>>,
}

impl ScanState {
    /// Creates an idle scan. The target list and qualifiers are bound to the
    /// relation's schema here, so `begin` only has to read column indices.
    pub fn new(relation: Arc<AppendOnlyRelation>, target_list: Vec<Expression>, quals: Vec<Expression>) -> Result<Self> {
        let schema = relation.schema();
        let target_list = target_list
            .iter()
            .map(|expr| expr.bind(schema))
            .collect::<Result<Vec<_>>>()?;
        let quals = quals
            .iter()
            .map(|expr| expr.bind(schema))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            relation,
            target_list,
            quals,
            phase: ScanPhase::Init,
            opaque: None,
        })
    }

    pub fn relation(&self) -> &Arc<AppendOnlyRelation> {
        &self.relation
    }

    pub fn target_list(&self) -> &[Expression] {
        &self.target_list
    }

    pub fn quals(&self) -> &[Expression] {
        &self.quals
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn has_descriptor(&self) -> bool {
        self.opaque.is_some()
    }

    /// Address of the scan descriptor, for checking that a rescan keeps the
    /// same one.
    pub fn descriptor_addr(&self) -> Option<usize> {
        self.opaque
            .as_deref()
            .map(|opaque| opaque as *const ScanOpaque as usize)
    }

    /// The column mask of an active columnar scan.
    pub fn projection(&self) -> Option<&ColumnProjection> {
        match self.opaque.as_deref() {
            Some(ScanOpaque::Columnar(opaque)) => Some(&opaque.projection),
            _ => None,
        }
    }

    fn expect_phase(&self, expected: ScanPhase, op: &str) -> Result<()> {
        if self.phase != expected {
            return Err(QueryError::ContractViolation(format!(
                "{} on relation {} requires a {:?} scan but it is {:?}",
                op,
                self.relation.rel_id(),
                expected,
                self.phase
            )));
        }
        Ok(())
    }

    /// Opens the storage scan.
    ///
    /// Segment metadata is read with the data snapshot, unless that is
    /// `Snapshot::Any`, in which case the transaction snapshot is used.
    pub fn begin(&mut self, ctx: &ExecContext) -> Result<()> {
        self.expect_phase(ScanPhase::Init, "begin")?;
        let metadata_snapshot = ctx.metadata_snapshot();
        let opaque = match self.relation.storage() {
            StorageKind::Row => ScanOpaque::Row(AppendOnlyScanDesc::begin(
                Arc::clone(&self.relation),
                Arc::clone(&ctx.snapshot),
                &metadata_snapshot,
            )?),
            StorageKind::Column => {
                let projection = ColumnProjection::for_scan(
                    self.relation.schema().column_count(),
                    &self.target_list,
                    &self.quals,
                );
                let desc = ColumnarScanDesc::begin(
                    Arc::clone(&self.relation),
                    Arc::clone(&ctx.snapshot),
                    &metadata_snapshot,
                    projection.needed(),
                )?;
                ScanOpaque::Columnar(ColumnarScanOpaque { desc, projection })
            }
        };
        self.opaque = Some(Box::new(opaque));
        self.phase = ScanPhase::Scanning;
        debug!(
            rel_id = self.relation.rel_id(),
            storage = %self.relation.storage(),
            "scan started"
        );
        Ok(())
    }

    /// Stores the next row in the context's direction into `slot`. Returns
    /// false with an empty slot once the scan is exhausted; the scan stays
    /// `Scanning` until ended.
    pub fn next(&mut self, ctx: &ExecContext, slot: &mut TupleSlot) -> Result<bool> {
        self.expect_phase(ScanPhase::Scanning, "next")?;
        let found = match self.opaque.as_deref_mut() {
            Some(ScanOpaque::Row(desc)) => desc.getnext(ctx.direction, slot)?,
            Some(ScanOpaque::Columnar(opaque)) => opaque.desc.getnext(ctx.direction, slot)?,
            None => {
                return Err(QueryError::ContractViolation(
                    "scanning without a scan descriptor".to_string(),
                ))
            }
        };
        Ok(found)
    }

    /// Restarts the scan from the beginning, keeping its descriptor.
    pub fn rescan(&mut self) -> Result<()> {
        self.expect_phase(ScanPhase::Scanning, "rescan")?;
        match self.opaque.as_deref_mut() {
            Some(ScanOpaque::Row(desc)) => desc.rescan(),
            Some(ScanOpaque::Columnar(opaque)) => opaque.desc.rescan(),
            None => {}
        }
        trace!(rel_id = self.relation.rel_id(), "scan restarted");
        Ok(())
    }

    /// Releases the descriptor and returns to `Init`.
    pub fn end(&mut self) -> Result<()> {
        self.expect_phase(ScanPhase::Scanning, "end")?;
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(opaque) = self.opaque.take() {
            match *opaque {
                ScanOpaque::Row(desc) => desc.end(),
                ScanOpaque::Columnar(opaque) => opaque.desc.end(),
            }
        }
        self.phase = ScanPhase::Init;
        debug!(rel_id = self.relation.rel_id(), "scan ended");
    }
}

impl Drop for ScanState {
    fn drop(&mut self) {
        if self.phase == ScanPhase::Scanning {
            self.release();
        }
    }
}
