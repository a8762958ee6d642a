//! Executor side of append-only table scans.
//!
//! Scans are driven through [`executor::ScanState`], a begin/next/rescan/end
//! state machine over a row or columnar relation. For columnar relations the
//! scan reads only the columns its target list and qualifiers reference.
//!
//! # Example
//!
//! ```no_run
//! use common::api::MvccSnapshot;
//! use common::tuple::{Column, Schema, Type};
//! use query_engine::catalog::Catalog;
//! use query_engine::executor::{Executor, TableScanExecutor};
//! use query_engine::{col, lit, ExecContext};
//! use storage_engine::{StorageKind, StorageOptions};
//!
//! let catalog = Catalog::open("data")?;
//! let schema = Schema::new(vec![
//!     Column::new("id", Type::Integer),
//!     Column::new("name", Type::Varchar(50)),
//! ]);
//! let table = catalog.create_table("users", schema, StorageKind::Column, StorageOptions::default())?;
//!
//! let ctx = ExecContext::new(MvccSnapshot::up_to(100));
//! let mut scan = TableScanExecutor::new(table.relation.clone(), vec![col("name")], vec![col("id").gt(lit(10))])?;
//! scan.init(&ctx)?;
//! while let Some(tuple) = scan.next(&ctx)? {
//!     println!("{:?}", tuple);
//! }
//! scan.close()?;
//! # Ok::<(), query_engine::QueryError>(())
//! ```

pub mod catalog;
mod context;
pub mod executor;
pub mod expression;
pub mod types;

pub use context::ExecContext;
pub use expression::{col, lit, lit_big, lit_str, Expression};
pub use types::ValueOps;

use storage_engine::StorageError;

/// A specialized error type for query engine operations.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// An operation was called in a state that does not allow it. Never
    /// retried.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("execution error: {0}")]
    ExecutionError(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
