//! Materializes a child plan into a compressed workfile.
//!
//! The first pass spills every child tuple to a [`Workfile`]; rescans replay
//! the workfile instead of re-running the child.

use super::{BoxedExecutor, Executor};
use crate::context::ExecContext;
use crate::Result;
use common::tuple::{Schema, Tuple};
use storage_engine::{Workfile, WorkfileReader};
use tracing::debug;

pub struct MaterializeExecutor {
    child: BoxedExecutor,
    reader: Option<WorkfileReader>,
}

impl MaterializeExecutor {
    pub fn new(child: BoxedExecutor) -> Self {
        Self { child, reader: None }
    }

    /// True once the child has been drained into the workfile.
    pub fn is_materialized(&self) -> bool {
        self.reader.is_some()
    }

    fn materialize(&mut self, ctx: &ExecContext) -> Result<WorkfileReader> {
        let mut workfile = Workfile::create_in(
            &ctx.workfile_dir,
            self.child.schema().clone(),
            ctx.workfile_compression,
        )?;
        while let Some(tuple) = self.child.next(ctx)? {
            workfile.write_tuple(&tuple)?;
        }
        debug!(tuples = workfile.tuple_count(), "materialized child plan");
        Ok(workfile.into_reader()?)
    }
}

impl Executor for MaterializeExecutor {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn init(&mut self, ctx: &ExecContext) -> Result<()> {
        match self.reader.as_mut() {
            Some(reader) => Ok(reader.rewind()?),
            None => self.child.init(ctx),
        }
    }

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Tuple>> {
        if self.reader.is_none() {
            let reader = self.materialize(ctx)?;
            self.reader = Some(reader);
        }
        match self.reader.as_mut() {
            Some(reader) => Ok(reader.next_tuple()?),
            None => Ok(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        self.child.close()
    }
}
