use thiserror::Error;

use crate::{
    query::{FieldType, ValueKind},
    segment::StorageError,
};

/// Failures that abort evaluation of a filter node.
///
/// Per-row anomalies (nulls, missing JSON paths, out-of-range array elements)
/// never show up here; they are folded into the validity channel of the result.
#[derive(Debug, Error)]
pub enum ExprError {
    /// A literal cannot be compared with the column and no widening applies.
    #[error("Type mismatch for column '{column}': {actual} literal cannot be compared with {expected}")]
    TypeMismatch {
        /// Rendered column.
        column: String,
        /// Column type.
        expected: FieldType,
        /// Offending literal kind.
        actual: ValueKind,
    },
    /// The column representation does not support the requested evaluation.
    #[error("Unsupported representation for column '{column}': {reason}")]
    UnsupportedRepresentation {
        /// Rendered column.
        column: String,
        /// Human-readable cause.
        reason: String,
    },
    /// An index disagrees with the segment about its row count.
    #[error("Index on column '{column}' covers {actual} rows, segment has {expected} active rows")]
    IndexInconsistency {
        /// Rendered column.
        column: String,
        /// Active rows of the segment.
        expected: usize,
        /// Rows covered by the index.
        actual: usize,
    },
    /// The evaluation context addresses rows past the active row count.
    #[error("Batch [{offset}, {offset}+{len}) exceeds {active_count} active rows")]
    BatchOutOfRange {
        /// First row of the batch.
        offset: usize,
        /// Rows in the batch.
        len: usize,
        /// Active rows of the segment.
        active_count: usize,
    },
    /// Raw column access failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ExprError {
    pub(crate) fn unsupported(column: impl ToString, reason: impl Into<String>) -> Self {
        Self::UnsupportedRepresentation {
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}
