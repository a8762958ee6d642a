//! Append-only storage for row and columnar relations.
//!
//! Rows are only ever appended. Each relation is split into segments, each
//! segment into one file (row storage) or one file per column (columnar
//! storage), and each file into compressed blocks. What a scan sees is decided
//! by two snapshots: the metadata snapshot picks the committed end of every
//! segment file, the data snapshot hides rows deleted through the visimap.

pub mod ao;
pub mod aocs;
pub mod block;
mod error;
pub mod options;
pub mod relation;
pub mod segfile;
pub mod visimap;
pub mod workfile;
mod writer;

pub use ao::{AppendOnlyInsertDesc, AppendOnlyScanDesc};
pub use aocs::{ColumnarInsertDesc, ColumnarScanDesc};
pub use error::{Result, StorageError};
pub use options::{CompressionSpec, StorageOptions};
pub use relation::{AppendOnlyRelation, RelationDesc, StorageKind, DEFAULT_SEGMENT};
pub use workfile::{Workfile, WorkfileReader};
pub use writer::TableWriter;
