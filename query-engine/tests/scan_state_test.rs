use common::api::{MvccSnapshot, ScanDirection, Snapshot, TransactionId};
use common::tuple::{Column, Schema, Tuple, TupleSlot, Type, Value};
use query_engine::catalog::{Catalog, TableInfo};
use query_engine::executor::{ScanPhase, ScanState};
use query_engine::{col, lit, ExecContext, QueryError};
use std::sync::Arc;
use storage_engine::{StorageError, StorageKind, StorageOptions, TableWriter};
use tempfile::TempDir;
use test_case::test_case;

fn wide_schema(columns: usize) -> Schema {
    Schema::new(
        (0..columns)
            .map(|i| Column::new(format!("col{}", i + 1), Type::Integer))
            .collect(),
    )
}

fn setup(storage: StorageKind, columns: usize) -> (TempDir, Catalog, Arc<TableInfo>) {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Catalog::open(dir.path()).unwrap();
    let table = catalog
        .create_table("t", wide_schema(columns), storage, StorageOptions::default())
        .unwrap();
    (dir, catalog, table)
}

fn load(table: &TableInfo, rows: std::ops::Range<i32>, xid: TransactionId) {
    let columns = table.schema.column_count();
    let mut writer = TableWriter::new(&table.relation, xid).unwrap();
    for i in rows {
        let values = (0..columns).map(|c| Value::Integer(i * 10 + c as i32)).collect();
        writer.insert(&Tuple::new(values)).unwrap();
    }
    writer.finish().unwrap();
}

fn drain(scan: &mut ScanState, ctx: &ExecContext) -> Vec<Vec<Value>> {
    let mut slot = TupleSlot::new(scan.relation().schema().column_count());
    let mut rows = Vec::new();
    while scan.next(ctx, &mut slot).unwrap() {
        rows.push(slot.values().unwrap().to_vec());
    }
    assert!(slot.is_empty());
    rows
}

#[test_case(StorageKind::Row ; "row")]
#[test_case(StorageKind::Column ; "column")]
fn test_exhausted_scan_stays_scanning(storage: StorageKind) {
    let (_dir, _catalog, table) = setup(storage, 3);
    load(&table, 0..10, 5);
    let ctx = ExecContext::new(MvccSnapshot::up_to(10));

    let mut scan = ScanState::new(table.relation.clone(), vec![col("col1")], vec![]).unwrap();
    scan.begin(&ctx).unwrap();
    let rows = drain(&mut scan, &ctx);
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[9][0], Value::Integer(90));

    let mut slot = TupleSlot::new(3);
    assert!(!scan.next(&ctx, &mut slot).unwrap());
    assert_eq!(scan.phase(), ScanPhase::Scanning);
    assert!(scan.has_descriptor());

    scan.end().unwrap();
    assert_eq!(scan.phase(), ScanPhase::Init);
    assert!(!scan.has_descriptor());
}

#[test_case(StorageKind::Row ; "row")]
#[test_case(StorageKind::Column ; "column")]
fn test_operations_out_of_phase_are_contract_violations(storage: StorageKind) {
    let (_dir, _catalog, table) = setup(storage, 2);
    load(&table, 0..3, 5);
    let ctx = ExecContext::new(MvccSnapshot::up_to(10));
    let mut slot = TupleSlot::new(2);

    let mut scan = ScanState::new(table.relation.clone(), vec![], vec![]).unwrap();
    assert!(matches!(scan.next(&ctx, &mut slot), Err(QueryError::ContractViolation(_))));
    assert!(matches!(scan.rescan(), Err(QueryError::ContractViolation(_))));
    assert!(matches!(scan.end(), Err(QueryError::ContractViolation(_))));

    scan.begin(&ctx).unwrap();
    assert!(matches!(scan.begin(&ctx), Err(QueryError::ContractViolation(_))));
    scan.end().unwrap();
    assert!(matches!(scan.next(&ctx, &mut slot), Err(QueryError::ContractViolation(_))));
}

#[test_case(StorageKind::Row ; "row")]
#[test_case(StorageKind::Column ; "column")]
fn test_rescan_keeps_descriptor(storage: StorageKind) {
    let (_dir, _catalog, table) = setup(storage, 2);
    load(&table, 0..25, 5);
    let ctx = ExecContext::new(MvccSnapshot::up_to(10));

    let mut scan = ScanState::new(table.relation.clone(), vec![col("col2")], vec![]).unwrap();
    scan.begin(&ctx).unwrap();
    let addr = scan.descriptor_addr();
    assert!(addr.is_some());

    let mut slot = TupleSlot::new(2);
    for _ in 0..7 {
        assert!(scan.next(&ctx, &mut slot).unwrap());
    }
    scan.rescan().unwrap();
    assert_eq!(scan.descriptor_addr(), addr);

    let rows = drain(&mut scan, &ctx);
    assert_eq!(rows.len(), 25);
    assert_eq!(rows[0][1], Value::Integer(1));
}

#[test]
fn test_empty_projection_reads_first_column() {
    let (_dir, _catalog, table) = setup(StorageKind::Column, 4);
    load(&table, 0..5, 5);
    let ctx = ExecContext::new(MvccSnapshot::up_to(10));

    // SELECT count(*) style: nothing referenced.
    let mut scan = ScanState::new(table.relation.clone(), vec![], vec![]).unwrap();
    scan.begin(&ctx).unwrap();
    assert_eq!(scan.projection().unwrap().needed(), &[true, false, false, false]);

    let rows = drain(&mut scan, &ctx);
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[3], vec![Value::Integer(30), Value::Null, Value::Null, Value::Null]);
}

#[test]
fn test_projection_from_targets_and_quals() {
    let (_dir, _catalog, table) = setup(StorageKind::Column, 5);
    load(&table, 0..20, 5);
    let ctx = ExecContext::new(MvccSnapshot::up_to(10));

    let mut scan = ScanState::new(table.relation.clone(), vec![col("col2")], vec![]).unwrap();
    scan.begin(&ctx).unwrap();
    assert_eq!(scan.projection().unwrap().needed(), &[false, true, false, false, false]);
    let rows = drain(&mut scan, &ctx);
    assert_eq!(rows[4], vec![Value::Null, Value::Integer(41), Value::Null, Value::Null, Value::Null]);
    scan.end().unwrap();

    let mut scan = ScanState::new(
        table.relation.clone(),
        vec![col("col2")],
        vec![col("col5").gt(lit(100))],
    )
    .unwrap();
    scan.begin(&ctx).unwrap();
    assert_eq!(scan.projection().unwrap().needed(), &[false, true, false, false, true]);

    // The row storage never computes a mask.
    let (_dir2, _catalog2, rows_table) = setup(StorageKind::Row, 5);
    let mut row_scan = ScanState::new(rows_table.relation.clone(), vec![col("col2")], vec![]).unwrap();
    row_scan.begin(&ctx).unwrap();
    assert!(row_scan.projection().is_none());
}

#[test_case(StorageKind::Row ; "row")]
#[test_case(StorageKind::Column ; "column")]
fn test_any_snapshot_reads_metadata_with_transaction_snapshot(storage: StorageKind) {
    let (_dir, _catalog, table) = setup(storage, 2);
    load(&table, 0..10, 5);
    // Committed after the transaction snapshot was taken. It republishes the
    // segment, leaving two versions of its metadata.
    load(&table, 10..25, 20);
    assert_eq!(table.relation.segfiles().version_count(), 2);

    let ctx = ExecContext::new(MvccSnapshot::up_to(10)).with_data_snapshot(Snapshot::Any);
    let mut scan = ScanState::new(table.relation.clone(), vec![col("col1")], vec![]).unwrap();
    scan.begin(&ctx).unwrap();
    assert_eq!(drain(&mut scan, &ctx).len(), 10);
    scan.end().unwrap();

    let later = ExecContext::new(MvccSnapshot::up_to(30)).with_data_snapshot(Snapshot::Any);
    scan.begin(&later).unwrap();
    assert_eq!(drain(&mut scan, &later).len(), 25);
}

#[test]
fn test_backward_columnar_scan_is_rejected() {
    let (_dir, _catalog, table) = setup(StorageKind::Column, 2);
    load(&table, 0..3, 5);
    let ctx = ExecContext::new(MvccSnapshot::up_to(10)).with_direction(ScanDirection::Backward);

    let mut scan = ScanState::new(table.relation.clone(), vec![col("col1")], vec![]).unwrap();
    scan.begin(&ctx).unwrap();
    let mut slot = TupleSlot::new(2);
    assert!(matches!(
        scan.next(&ctx, &mut slot),
        Err(QueryError::Storage(StorageError::UnsupportedDirection { .. }))
    ));
}

#[test]
fn test_backward_row_scan_after_forward_pass() {
    let (_dir, _catalog, table) = setup(StorageKind::Row, 1);
    load(&table, 0..4, 5);
    let forward = ExecContext::new(MvccSnapshot::up_to(10));
    let backward = forward.clone().with_direction(ScanDirection::Backward);

    let mut scan = ScanState::new(table.relation.clone(), vec![col("col1")], vec![]).unwrap();
    scan.begin(&forward).unwrap();
    // The cursor starts before the first row.
    assert!(drain(&mut scan, &backward).is_empty());
    assert_eq!(drain(&mut scan, &forward).len(), 4);

    let rows: Vec<Value> = drain(&mut scan, &backward).into_iter().map(|r| r[0].clone()).collect();
    assert_eq!(
        rows,
        vec![Value::Integer(30), Value::Integer(20), Value::Integer(10), Value::Integer(0)]
    );
}

#[test_case(StorageKind::Row ; "row")]
#[test_case(StorageKind::Column ; "column")]
fn test_dropping_active_scan_releases_descriptor(storage: StorageKind) {
    let (_dir, _catalog, table) = setup(storage, 2);
    load(&table, 0..3, 5);
    let ctx = ExecContext::new(MvccSnapshot::up_to(10));
    let idle = Arc::strong_count(&table.relation);

    let mut scan = ScanState::new(table.relation.clone(), vec![col("col1")], vec![]).unwrap();
    scan.begin(&ctx).unwrap();
    // One reference held by the state, one by the descriptor.
    assert_eq!(Arc::strong_count(&table.relation), idle + 2);
    drop(scan);
    assert_eq!(Arc::strong_count(&table.relation), idle);
}

#[test]
fn test_scanning_an_empty_relation() {
    let (_dir, _catalog, table) = setup(StorageKind::Column, 3);
    let ctx = ExecContext::new(MvccSnapshot::up_to(10));

    let mut scan = ScanState::new(table.relation.clone(), vec![col("col3")], vec![]).unwrap();
    scan.begin(&ctx).unwrap();
    assert!(drain(&mut scan, &ctx).is_empty());
    scan.end().unwrap();
}
