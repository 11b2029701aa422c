use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, AsArray},
    compute,
    datatypes::{DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type},
};
use crossbeam_skiplist::SkipMap;
use hashbrown::HashMap;

use super::{
    ColumnStats, HashScalarIndex, JsonKeyIndex, MemoryJsonKeyIndex, PrimaryKey, ScalarIndex,
    Segment, SegmentKind, StorageError,
};
use crate::{
    mvcc::Timestamp,
    query::{FieldId, ScalarValue},
};

#[derive(Clone, Copy, Debug)]
struct PkEntry {
    offset: usize,
    insert_ts: Timestamp,
}

/// Segment whose columns are resident Arrow arrays.
///
/// The primary-key index is a skip list so growing segments can publish new
/// keys (or retire old ones) while queries hold the segment.
pub struct MemorySegment {
    kind: SegmentKind,
    row_count: usize,
    columns: HashMap<FieldId, ArrayRef>,
    stats: HashMap<FieldId, ColumnStats>,
    primary_key: Option<FieldId>,
    pk_index: SkipMap<PrimaryKey, PkEntry>,
    scalar_indexes: HashMap<FieldId, Arc<dyn ScalarIndex>>,
    json_key_indexes: HashMap<FieldId, Arc<dyn JsonKeyIndex>>,
}

impl MemorySegment {
    /// Starts building a segment of the given kind.
    #[must_use]
    pub fn builder(kind: SegmentKind) -> MemorySegmentBuilder {
        MemorySegmentBuilder::new(kind)
    }

    /// Points `key` at `offset`, visible from `insert_ts` on.
    pub fn upsert_primary_key(&self, key: PrimaryKey, offset: usize, insert_ts: Timestamp) {
        self.pk_index.insert(key, PkEntry { offset, insert_ts });
    }

    /// Retires `key`; later lookups no longer resolve it. Returns whether it was present.
    pub fn remove_primary_key(&self, key: &PrimaryKey) -> bool {
        self.pk_index.remove(key).is_some()
    }
}

impl Segment for MemorySegment {
    fn kind(&self) -> SegmentKind {
        self.kind
    }

    fn row_count(&self) -> usize {
        self.row_count
    }

    fn primary_key_field(&self) -> Option<FieldId> {
        self.primary_key
    }

    fn chunk(&self, field: FieldId, offset: usize, len: usize) -> Result<ArrayRef, StorageError> {
        let column = self
            .columns
            .get(&field)
            .ok_or(StorageError::UnknownField(field))?;
        if offset.checked_add(len).map_or(true, |end| end > column.len()) {
            return Err(StorageError::OutOfBounds {
                field,
                offset,
                len,
                row_count: column.len(),
            });
        }
        Ok(column.slice(offset, len))
    }

    fn column_stats(&self, field: FieldId) -> Option<ColumnStats> {
        self.stats.get(&field).cloned()
    }

    fn lookup_primary_keys(&self, keys: &[PrimaryKey], read_ts: Timestamp) -> Vec<usize> {
        keys.iter()
            .filter_map(|key| self.pk_index.get(key))
            .map(|entry| *entry.value())
            .filter(|entry| entry.insert_ts <= read_ts)
            .map(|entry| entry.offset)
            .collect()
    }

    fn scalar_index(&self, field: FieldId) -> Option<Arc<dyn ScalarIndex>> {
        self.scalar_indexes.get(&field).cloned()
    }

    fn json_key_index(&self, field: FieldId) -> Option<Arc<dyn JsonKeyIndex>> {
        self.json_key_indexes.get(&field).cloned()
    }
}

/// Builder for [`MemorySegment`].
pub struct MemorySegmentBuilder {
    kind: SegmentKind,
    columns: Vec<(FieldId, ArrayRef)>,
    primary_key: Option<FieldId>,
    insert_ts: Option<Vec<Timestamp>>,
    scalar_index_fields: Vec<FieldId>,
    json_key_index_fields: Vec<FieldId>,
    attached_scalar_indexes: Vec<(FieldId, Arc<dyn ScalarIndex>)>,
}

impl MemorySegmentBuilder {
    fn new(kind: SegmentKind) -> Self {
        Self {
            kind,
            columns: Vec::new(),
            primary_key: None,
            insert_ts: None,
            scalar_index_fields: Vec::new(),
            json_key_index_fields: Vec::new(),
            attached_scalar_indexes: Vec::new(),
        }
    }

    /// Adds a column.
    pub fn column(mut self, field: FieldId, array: ArrayRef) -> Self {
        self.columns.push((field, array));
        self
    }

    /// Declares `field` as the primary key (Int64 or Utf8, no nulls).
    pub fn primary_key(self, field: FieldId) -> Self {
        MemorySegmentBuilder {
            primary_key: Some(field),
            ..self
        }
    }

    /// Insert timestamp of every row; defaults to [`Timestamp::MIN`].
    pub fn insert_timestamps(self, insert_ts: Vec<Timestamp>) -> Self {
        MemorySegmentBuilder {
            insert_ts: Some(insert_ts),
            ..self
        }
    }

    /// Builds a [`HashScalarIndex`] over `field`.
    pub fn scalar_index(mut self, field: FieldId) -> Self {
        self.scalar_index_fields.push(field);
        self
    }

    /// Attaches an externally built scalar index to `field`.
    pub fn attach_scalar_index(mut self, field: FieldId, index: Arc<dyn ScalarIndex>) -> Self {
        self.attached_scalar_indexes.push((field, index));
        self
    }

    /// Builds a [`MemoryJsonKeyIndex`] over `field`.
    pub fn json_key_index(mut self, field: FieldId) -> Self {
        self.json_key_index_fields.push(field);
        self
    }

    /// Validates the columns and builds statistics and indexes.
    pub fn build(self) -> Result<MemorySegment, StorageError> {
        let row_count = self.columns.first().map_or(0, |(_, array)| array.len());
        let mut columns = HashMap::with_capacity(self.columns.len());
        let mut stats = HashMap::new();
        for (field, array) in self.columns {
            if array.len() != row_count {
                return Err(StorageError::LengthMismatch {
                    field,
                    expected: row_count,
                    actual: array.len(),
                });
            }
            if let Some(column_stats) = compute_stats(&array) {
                stats.insert(field, column_stats);
            }
            columns.insert(field, array);
        }

        let insert_ts = self
            .insert_ts
            .unwrap_or_else(|| vec![Timestamp::MIN; row_count]);
        if insert_ts.len() != row_count {
            return Err(StorageError::TimestampCountMismatch {
                expected: row_count,
                actual: insert_ts.len(),
            });
        }

        let pk_index = SkipMap::new();
        if let Some(field) = self.primary_key {
            let array = columns.get(&field).ok_or(StorageError::UnknownField(field))?;
            for (offset, key) in primary_keys(field, array)?.into_iter().enumerate() {
                pk_index.insert(
                    key,
                    PkEntry {
                        offset,
                        insert_ts: insert_ts[offset],
                    },
                );
            }
        }

        let mut scalar_indexes: HashMap<FieldId, Arc<dyn ScalarIndex>> = HashMap::new();
        for field in self.scalar_index_fields {
            let array = columns.get(&field).ok_or(StorageError::UnknownField(field))?;
            scalar_indexes.insert(field, Arc::new(HashScalarIndex::try_new(field, array)?));
        }
        for (field, index) in self.attached_scalar_indexes {
            scalar_indexes.insert(field, index);
        }

        let mut json_key_indexes: HashMap<FieldId, Arc<dyn JsonKeyIndex>> = HashMap::new();
        for field in self.json_key_index_fields {
            let array = columns.get(&field).ok_or(StorageError::UnknownField(field))?;
            json_key_indexes.insert(field, Arc::new(MemoryJsonKeyIndex::try_new(field, array)?));
        }

        Ok(MemorySegment {
            kind: self.kind,
            row_count,
            columns,
            stats,
            primary_key: self.primary_key,
            pk_index,
            scalar_indexes,
            json_key_indexes,
        })
    }
}

fn primary_keys(field: FieldId, array: &ArrayRef) -> Result<Vec<PrimaryKey>, StorageError> {
    let unsupported = || StorageError::UnsupportedType {
        field,
        data_type: array.data_type().clone(),
        role: "primary key",
    };
    if array.null_count() > 0 {
        return Err(unsupported());
    }
    match array.data_type() {
        DataType::Int64 => Ok(array
            .as_primitive::<Int64Type>()
            .values()
            .iter()
            .map(|v| PrimaryKey::Int64(*v))
            .collect()),
        DataType::Utf8 => Ok(array
            .as_string::<i32>()
            .iter()
            .flatten()
            .map(PrimaryKey::from)
            .collect()),
        _ => Err(unsupported()),
    }
}

/// Min/max summary for the scalar types statistics are kept for.
fn compute_stats(array: &ArrayRef) -> Option<ColumnStats> {
    let (min, max) = match array.data_type() {
        DataType::Int8 => {
            let values = array.as_primitive::<Int8Type>();
            (
                compute::min(values).map(|v| ScalarValue::Int64(i64::from(v))),
                compute::max(values).map(|v| ScalarValue::Int64(i64::from(v))),
            )
        }
        DataType::Int16 => {
            let values = array.as_primitive::<Int16Type>();
            (
                compute::min(values).map(|v| ScalarValue::Int64(i64::from(v))),
                compute::max(values).map(|v| ScalarValue::Int64(i64::from(v))),
            )
        }
        DataType::Int32 => {
            let values = array.as_primitive::<Int32Type>();
            (
                compute::min(values).map(|v| ScalarValue::Int64(i64::from(v))),
                compute::max(values).map(|v| ScalarValue::Int64(i64::from(v))),
            )
        }
        DataType::Int64 => {
            let values = array.as_primitive::<Int64Type>();
            (
                compute::min(values).map(ScalarValue::Int64),
                compute::max(values).map(ScalarValue::Int64),
            )
        }
        DataType::Float32 => {
            let values = array.as_primitive::<Float32Type>();
            (
                compute::min(values).map(|v| ScalarValue::Float64(f64::from(v))),
                compute::max(values).map(|v| ScalarValue::Float64(f64::from(v))),
            )
        }
        DataType::Float64 => {
            let values = array.as_primitive::<Float64Type>();
            (
                compute::min(values).map(ScalarValue::Float64),
                compute::max(values).map(ScalarValue::Float64),
            )
        }
        DataType::Utf8 => {
            let values = array.as_string::<i32>();
            (
                compute::min_string(values).map(ScalarValue::from),
                compute::max_string(values).map(ScalarValue::from),
            )
        }
        _ => return None,
    };
    Some(ColumnStats {
        min,
        max,
        null_count: array.null_count(),
        row_count: array.len(),
    })
}
