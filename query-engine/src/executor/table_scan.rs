//! Table scan executor over an append-only relation.
//!
//! Pulls rows through a [`ScanState`], drops those failing the qualifiers and
//! evaluates the target list on the rest.

use super::scan_state::{ScanPhase, ScanState};
use super::Executor;
use crate::context::ExecContext;
use crate::expression::Expression;
use crate::Result;
use common::tuple::{Column, Schema, Tuple, TupleSlot};
use std::sync::Arc;
use storage_engine::AppendOnlyRelation;

pub struct TableScanExecutor {
    scan: ScanState,
    slot: TupleSlot,
    output_schema: Schema,
}

impl TableScanExecutor {
    /// Creates a scan producing `target_list` for every row that satisfies all
    /// of `quals`.
    pub fn new(
        relation: Arc<AppendOnlyRelation>,
        target_list: Vec<Expression>,
        quals: Vec<Expression>,
    ) -> Result<Self> {
        let scan = ScanState::new(relation, target_list, quals)?;
        let schema = scan.relation().schema();
        let columns = scan
            .target_list()
            .iter()
            .enumerate()
            .map(|(i, expr)| match expr {
                Expression::BoundColumn(index) => schema.columns[*index].clone(),
                other => Column::new(format!("expr{}", i), other.output_type(schema)),
            })
            .collect();
        let slot = TupleSlot::new(schema.column_count());
        Ok(Self {
            scan,
            slot,
            output_schema: Schema::new(columns),
        })
    }

    /// Creates a scan producing every column of the relation.
    pub fn select_all(relation: Arc<AppendOnlyRelation>, quals: Vec<Expression>) -> Result<Self> {
        let target_list = (0..relation.schema().column_count())
            .map(Expression::BoundColumn)
            .collect();
        Self::new(relation, target_list, quals)
    }

    pub fn scan_state(&self) -> &ScanState {
        &self.scan
    }
}

impl Executor for TableScanExecutor {
    fn schema(&self) -> &Schema {
        &self.output_schema
    }

    fn init(&mut self, ctx: &ExecContext) -> Result<()> {
        match self.scan.phase() {
            ScanPhase::Init => self.scan.begin(ctx),
            ScanPhase::Scanning => self.scan.rescan(),
        }
    }

    fn next(&mut self, ctx: &ExecContext) -> Result<Option<Tuple>> {
        while self.scan.next(ctx, &mut self.slot)? {
            let Some(row) = self.slot.values() else {
                continue;
            };
            let mut passed = true;
            for qual in self.scan.quals() {
                if !qual.evaluate_predicate(row)? {
                    passed = false;
                    break;
                }
            }
            if !passed {
                continue;
            }
            let values = self
                .scan
                .target_list()
                .iter()
                .map(|expr| expr.evaluate(row))
                .collect::<Result<Vec<_>>>()?;
            return Ok(Some(Tuple::new(values)));
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        if self.scan.phase() == ScanPhase::Scanning {
            self.scan.end()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::executor::collect_results;
    use crate::executor::tests::people_table;
    use crate::expression::{col, lit};
    use common::api::MvccSnapshot;
    use common::tuple::{Type, Value};
    use storage_engine::StorageKind;
    use test_case::test_case;

    #[test_case(StorageKind::Row ; "row")]
    #[test_case(StorageKind::Column ; "column")]
    fn test_scan_with_quals_and_targets(storage: StorageKind) {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        let table = people_table(&catalog, storage, 30);
        let ctx = ExecContext::new(MvccSnapshot::up_to(10));

        // SELECT name, id + 100 FROM people WHERE age > 30 AND id < 20
        let mut scan = TableScanExecutor::new(
            table.relation.clone(),
            vec![col("name"), col("id").add(lit(100))],
            vec![col("age").gt(lit(30)), col("id").lt(lit(20))],
        )
        .unwrap();
        assert_eq!(scan.schema().columns[0].name, "name");
        assert_eq!(scan.schema().columns[1].column_type, Type::Integer);

        let results = collect_results(&mut scan, &ctx).unwrap();
        let ids: Vec<Value> = results.iter().map(|t| t.values[1].clone()).collect();
        // age = 20 + id % 15 > 30 holds for id % 15 in 11..15
        assert_eq!(
            ids,
            vec![111, 112, 113, 114].into_iter().map(Value::Integer).collect::<Vec<_>>()
        );
        assert_eq!(results[0].values[0], Value::Varchar("person-11".to_string()));

        // A second init rescans the same descriptor.
        let again = collect_results(&mut scan, &ctx).unwrap();
        assert_eq!(again, results);
        scan.close().unwrap();
        assert_eq!(scan.scan_state().phase(), ScanPhase::Init);
    }

    #[test]
    fn test_select_all_on_columnar_reads_every_column() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(dir.path()).unwrap();
        let table = people_table(&catalog, StorageKind::Column, 3);
        let ctx = ExecContext::new(MvccSnapshot::up_to(10));

        let mut scan = TableScanExecutor::select_all(table.relation.clone(), vec![]).unwrap();
        let results = collect_results(&mut scan, &ctx).unwrap();
        assert_eq!(
            scan.scan_state().projection().unwrap().needed(),
            &[true, true, true]
        );
        assert_eq!(
            results[2].values,
            vec![
                Value::Integer(2),
                Value::Integer(22),
                Value::Varchar("person-2".to_string())
            ]
        );
    }
}
