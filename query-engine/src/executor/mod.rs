//! Pull-based query executors.
//!
//! Plans are trees of [`Executor`]s. A parent drives its children through
//! `init`, repeated `next` calls and `close`, passing the same
//! [`ExecContext`] down on every call.

use crate::context::ExecContext;
use crate::Result;
use common::tuple::{Schema, Tuple};

pub mod column_projection;
pub mod filter;
pub mod materialize;
pub mod scan_state;
pub mod table_scan;

pub use column_projection::ColumnProjection;
pub use filter::FilterExecutor;
pub use materialize::MaterializeExecutor;
pub use scan_state::{ColumnarScanOpaque, ScanOpaque, ScanPhase, ScanState};
pub use table_scan::TableScanExecutor;

pub trait Executor {
    /// Shape of the tuples `next` returns.
    fn schema(&self) -> &Schema;

    /// Prepares for a pass over the output. Calling it again after a pass
    /// restarts from the first tuple.
    fn init(&mut self, ctx: &ExecContext) -> Result<()>;

    /// `None` once the output is exhausted.
    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Tuple>>;

    fn reset(&mut self, ctx: &ExecContext) -> Result<()> {
        self.init(ctx)
    }

    /// Releases whatever `init` acquired.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub type BoxedExecutor = Box<dyn Executor>;

/// Initializes `executor` and collects everything it produces.
pub fn collect_results(executor: &mut dyn Executor, ctx: &ExecContext) -> Result<Vec<Tuple>> {
    let mut results = Vec::new();
    executor.init(ctx)?;
    while let Some(tuple) = executor.next(ctx)? {
        results.push(tuple);
    }
    Ok(results)
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::catalog::{Catalog, TableInfo};
    use common::tuple::{Column, Schema, Tuple, Type, Value};
    use std::sync::Arc;
    use storage_engine::{StorageKind, StorageOptions, TableWriter};

    pub fn people_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", Type::Integer),
            Column::new("age", Type::Integer),
            Column::new("name", Type::Varchar(32)),
        ])
    }

    // Rows (i, 20 + i % 15, "person-i") for i in 0..rows, committed by xid 5.
    pub fn people_table(catalog: &Catalog, storage: StorageKind, rows: i32) -> Arc<TableInfo> {
        let table = catalog
            .create_table("people", people_schema(), storage, StorageOptions::default())
            .unwrap();
        let mut writer = TableWriter::new(&table.relation, 5).unwrap();
        for i in 0..rows {
            writer
                .insert(&Tuple::new(vec![
                    Value::Integer(i),
                    Value::Integer(20 + i % 15),
                    Value::Varchar(format!("person-{}", i)),
                ]))
                .unwrap();
        }
        writer.finish().unwrap();
        table
    }
}
