//! Storage collaborators consumed by term evaluation.
//!
//! A [`Segment`] exposes raw Arrow column chunks, per-column statistics,
//! primary-key lookups and the optional indexes built over its fields. All
//! calls are synchronous: segments are resident in memory (or memory mapped)
//! by the time a query reaches them.

mod index;
mod memory;

use std::{fmt, sync::Arc};

use arrow::{
    array::{ArrayRef, BooleanArray},
    datatypes::DataType,
};
use thiserror::Error;

pub use self::{
    index::{HashScalarIndex, MemoryJsonKeyIndex},
    memory::{MemorySegment, MemorySegmentBuilder},
};
use crate::{
    mvcc::Timestamp,
    query::{FieldId, ScalarValue},
};

/// Lifecycle state of a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Immutable segment with final statistics.
    Sealed,
    /// Segment still receiving inserts; statistics are provisional.
    Growing,
}

/// Primary key value resolved through a segment's key index.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimaryKey {
    /// Integer key.
    Int64(i64),
    /// String key.
    VarChar(String),
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Int64(v) => write!(f, "{v}"),
            PrimaryKey::VarChar(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(value: i64) -> Self {
        PrimaryKey::Int64(value)
    }
}

impl From<&str> for PrimaryKey {
    fn from(value: &str) -> Self {
        PrimaryKey::VarChar(value.to_owned())
    }
}

/// Per-segment summary of a scalar column.
///
/// Only ever used as a necessary condition: a filter whose literals all fall
/// outside `[min, max]` cannot match, anything else must be evaluated.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnStats {
    /// Smallest non-null value, if any.
    pub min: Option<ScalarValue>,
    /// Largest non-null value, if any.
    pub max: Option<ScalarValue>,
    /// Number of null rows.
    pub null_count: usize,
    /// Number of rows summarised.
    pub row_count: usize,
}

impl ColumnStats {
    /// Returns true when every summarised row is null.
    #[must_use]
    pub fn all_null(&self) -> bool {
        self.row_count > 0 && self.null_count == self.row_count
    }
}

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The segment has no column with this id.
    #[error("Unknown field: {0}")]
    UnknownField(FieldId),
    /// A chunk request reaches past the end of the column.
    #[error("Range [{offset}, {offset}+{len}) out of bounds for field {field} with {row_count} rows")]
    OutOfBounds {
        /// Requested field.
        field: FieldId,
        /// First requested row.
        offset: usize,
        /// Requested rows.
        len: usize,
        /// Rows stored for the field.
        row_count: usize,
    },
    /// Columns of one segment must share a row count.
    #[error("Field {field} has {actual} rows, expected {expected}")]
    LengthMismatch {
        /// Offending field.
        field: FieldId,
        /// Row count of the segment.
        expected: usize,
        /// Row count of the field.
        actual: usize,
    },
    /// Insert timestamps must cover every row.
    #[error("Got {actual} insert timestamps for {expected} rows")]
    TimestampCountMismatch {
        /// Row count of the segment.
        expected: usize,
        /// Timestamps supplied.
        actual: usize,
    },
    /// The column type is not usable for the requested role.
    #[error("Field {field} of type {data_type:?} cannot be used as {role}")]
    UnsupportedType {
        /// Offending field.
        field: FieldId,
        /// Arrow type of the field.
        data_type: DataType,
        /// Role the field was declared for.
        role: &'static str,
    },
}

/// Resident, read-only view over one segment.
pub trait Segment: Send + Sync {
    /// Lifecycle state of the segment.
    fn kind(&self) -> SegmentKind;

    /// Number of rows stored in the segment.
    fn row_count(&self) -> usize;

    /// Field holding the primary key, if the segment has one.
    fn primary_key_field(&self) -> Option<FieldId>;

    /// Rows `[offset, offset + len)` of `field`, validity included.
    fn chunk(&self, field: FieldId, offset: usize, len: usize) -> Result<ArrayRef, StorageError>;

    /// Statistics for `field`, when maintained.
    fn column_stats(&self, field: FieldId) -> Option<ColumnStats>;

    /// Offsets of the rows whose primary key is in `keys` and visible at `read_ts`.
    ///
    /// Keys that do not resolve are simply absent from the output.
    fn lookup_primary_keys(&self, keys: &[PrimaryKey], read_ts: Timestamp) -> Vec<usize>;

    /// Scalar index over `field`, if built.
    fn scalar_index(&self, field: FieldId) -> Option<Arc<dyn ScalarIndex>>;

    /// Key index over the JSON documents of `field`, if built.
    fn json_key_index(&self, field: FieldId) -> Option<Arc<dyn JsonKeyIndex>>;
}

/// Exact membership index over a scalar column.
pub trait ScalarIndex: Send + Sync {
    /// Rows covered by the index.
    fn row_count(&self) -> usize;

    /// Membership of every covered row in `values`.
    ///
    /// The result has `row_count()` entries; null rows are false and invalid.
    fn is_in(&self, values: &[ScalarValue]) -> BooleanArray;
}

/// Index over the keys present in a JSON column.
pub trait JsonKeyIndex: Send + Sync {
    /// Rows covered by the index.
    fn row_count(&self) -> usize;

    /// Calls `visitor` with `(row, value)` for every row holding a value at `pointer`.
    ///
    /// Rows where the path is absent are never visited.
    fn visit_path(&self, pointer: &str, visitor: &mut dyn FnMut(usize, &serde_json::Value));
}
