use common::api::{RelationId, ScanDirection, SegmentNumber};
use common::tuple::TupleError;
use compressed_stream::StreamError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Tuple(#[from] TupleError),

    #[error("corrupt block in relation {rel_id} segment {segno}: {detail}")]
    Corrupt {
        rel_id: RelationId,
        segno: SegmentNumber,
        detail: String,
    },

    #[error("{direction} scans are not supported on {storage} relations")]
    UnsupportedDirection {
        direction: ScanDirection,
        storage: &'static str,
    },

    #[error("{actual} columns requested but relation {rel_id} has {expected}")]
    ProjectionMismatch {
        rel_id: RelationId,
        expected: usize,
        actual: usize,
    },

    #[error("relation {rel_id} is not a {expected} relation")]
    WrongStorageKind {
        rel_id: RelationId,
        expected: &'static str,
    },

    #[error("segment {segno} of relation {rel_id} is already being written")]
    SegmentInUse {
        rel_id: RelationId,
        segno: SegmentNumber,
    },

    #[error("invalid storage option: {0}")]
    InvalidOption(String),
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;
