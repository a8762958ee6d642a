//! Predicate filtering above an arbitrary child plan.

use super::{BoxedExecutor, Executor};
use crate::context::ExecContext;
use crate::expression::Expression;
use crate::Result;
use common::tuple::{Schema, Tuple};

/// Passes through the child tuples whose predicate is true. Unknown counts as
/// false.
pub struct FilterExecutor {
    child: BoxedExecutor,
    predicate: Expression,
}

impl FilterExecutor {
    /// Creates a new filter executor. The predicate is bound to the child's
    /// output schema.
    pub fn new(child: BoxedExecutor, predicate: Expression) -> Result<Self> {
        let predicate = predicate.bind(child.schema())?;
        Ok(Self { child, predicate })
    }
}

impl Executor for FilterExecutor {
    fn schema(&self) -> &Schema {
        self.child.schema()
    }

    fn init(&mut self, ctx: &ExecContext) -> Result<()> {
        self.child.init(ctx)
    }

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Tuple>> {
        while let Some(tuple) = self.child.next(ctx)? {
            if self.predicate.evaluate_predicate(&tuple.values)? {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn reset(&mut self, ctx: &ExecContext) -> Result<()> {
        self.child.reset(ctx)
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}
