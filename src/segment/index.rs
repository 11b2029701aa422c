//! In-memory index implementations for resident segments.

use arrow::{
    array::{Array, ArrayRef, AsArray, BooleanArray, BooleanBufferBuilder},
    buffer::NullBuffer,
    datatypes::{DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type},
};
use hashbrown::HashMap;
use serde_json::Value;

use super::{JsonKeyIndex, ScalarIndex, StorageError};
use crate::query::{normalized_bits, FieldId, ScalarValue};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum IndexKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
}

impl IndexKey {
    fn from_scalar(value: &ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::Null => None,
            ScalarValue::Boolean(v) => Some(IndexKey::Bool(*v)),
            ScalarValue::Int64(v) => Some(IndexKey::Int(*v)),
            ScalarValue::Float64(v) if v.is_nan() => None,
            ScalarValue::Float64(v) => Some(IndexKey::Float(normalized_bits(*v))),
            ScalarValue::Utf8(v) => Some(IndexKey::Str(v.clone())),
        }
    }
}

/// Hash index mapping each distinct value of a scalar column to its row offsets.
///
/// Float32 values are widened to f64 before hashing, the same representation
/// term sets use for `Float` columns.
#[derive(Debug)]
pub struct HashScalarIndex {
    postings: HashMap<IndexKey, Vec<u32>>,
    nulls: Option<NullBuffer>,
    row_count: usize,
}

impl HashScalarIndex {
    /// Builds an index over every row of `array`.
    pub fn try_new(field: FieldId, array: &ArrayRef) -> Result<Self, StorageError> {
        let mut postings: HashMap<IndexKey, Vec<u32>> = HashMap::new();
        let mut push = |row: usize, key: IndexKey| {
            postings.entry(key).or_default().push(row as u32);
        };
        match array.data_type() {
            DataType::Boolean => {
                let values = array.as_boolean();
                for row in (0..values.len()).filter(|row| values.is_valid(*row)) {
                    push(row, IndexKey::Bool(values.value(row)));
                }
            }
            DataType::Int8 => {
                let values = array.as_primitive::<Int8Type>();
                for row in (0..values.len()).filter(|row| values.is_valid(*row)) {
                    push(row, IndexKey::Int(i64::from(values.value(row))));
                }
            }
            DataType::Int16 => {
                let values = array.as_primitive::<Int16Type>();
                for row in (0..values.len()).filter(|row| values.is_valid(*row)) {
                    push(row, IndexKey::Int(i64::from(values.value(row))));
                }
            }
            DataType::Int32 => {
                let values = array.as_primitive::<Int32Type>();
                for row in (0..values.len()).filter(|row| values.is_valid(*row)) {
                    push(row, IndexKey::Int(i64::from(values.value(row))));
                }
            }
            DataType::Int64 => {
                let values = array.as_primitive::<Int64Type>();
                for row in (0..values.len()).filter(|row| values.is_valid(*row)) {
                    push(row, IndexKey::Int(values.value(row)));
                }
            }
            DataType::Float32 => {
                let values = array.as_primitive::<Float32Type>();
                for row in (0..values.len()).filter(|row| values.is_valid(*row)) {
                    let value = f64::from(values.value(row));
                    if !value.is_nan() {
                        push(row, IndexKey::Float(normalized_bits(value)));
                    }
                }
            }
            DataType::Float64 => {
                let values = array.as_primitive::<Float64Type>();
                for row in (0..values.len()).filter(|row| values.is_valid(*row)) {
                    let value = values.value(row);
                    if !value.is_nan() {
                        push(row, IndexKey::Float(normalized_bits(value)));
                    }
                }
            }
            DataType::Utf8 => {
                let values = array.as_string::<i32>();
                for row in (0..values.len()).filter(|row| values.is_valid(*row)) {
                    push(row, IndexKey::Str(values.value(row).to_owned()));
                }
            }
            other => {
                return Err(StorageError::UnsupportedType {
                    field,
                    data_type: other.clone(),
                    role: "scalar index",
                })
            }
        }
        Ok(Self {
            postings,
            nulls: array.logical_nulls(),
            row_count: array.len(),
        })
    }

    /// Number of distinct indexed values.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.postings.len()
    }
}

impl ScalarIndex for HashScalarIndex {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn is_in(&self, values: &[ScalarValue]) -> BooleanArray {
        let mut bits = BooleanBufferBuilder::new(self.row_count);
        bits.append_n(self.row_count, false);
        for key in values.iter().filter_map(IndexKey::from_scalar) {
            if let Some(rows) = self.postings.get(&key) {
                for row in rows {
                    bits.set_bit(*row as usize, true);
                }
            }
        }
        BooleanArray::new(bits.finish(), self.nulls.clone())
    }
}

/// Key index over a JSON column: every pointer reachable in a document maps
/// to the rows holding a value there.
#[derive(Debug, Default)]
pub struct MemoryJsonKeyIndex {
    paths: HashMap<String, Vec<(u32, Value)>>,
    row_count: usize,
}

impl MemoryJsonKeyIndex {
    /// Builds the index from a column of JSON text. Null or unparsable rows hold no keys.
    pub fn try_new(field: FieldId, array: &ArrayRef) -> Result<Self, StorageError> {
        let Some(documents) = array.as_string_opt::<i32>() else {
            return Err(StorageError::UnsupportedType {
                field,
                data_type: array.data_type().clone(),
                role: "json key index",
            });
        };
        let mut index = Self {
            paths: HashMap::new(),
            row_count: documents.len(),
        };
        for row in (0..documents.len()).filter(|row| documents.is_valid(*row)) {
            if let Ok(document) = serde_json::from_str::<Value>(documents.value(row)) {
                let mut pointer = String::new();
                index.insert(row as u32, &mut pointer, &document);
            }
        }
        Ok(index)
    }

    /// Number of distinct pointers seen across all documents.
    #[must_use]
    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    fn insert(&mut self, row: u32, pointer: &mut String, value: &Value) {
        self.paths
            .entry(pointer.clone())
            .or_default()
            .push((row, value.clone()));
        let restore = pointer.len();
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    pointer.push('/');
                    pointer.push_str(&key.replace('~', "~0").replace('/', "~1"));
                    self.insert(row, pointer, child);
                    pointer.truncate(restore);
                }
            }
            Value::Array(items) => {
                for (idx, child) in items.iter().enumerate() {
                    pointer.push('/');
                    pointer.push_str(&idx.to_string());
                    self.insert(row, pointer, child);
                    pointer.truncate(restore);
                }
            }
            _ => {}
        }
    }
}

impl JsonKeyIndex for MemoryJsonKeyIndex {
    fn row_count(&self) -> usize {
        self.row_count
    }

    fn visit_path(&self, pointer: &str, visitor: &mut dyn FnMut(usize, &Value)) {
        if let Some(entries) = self.paths.get(pointer) {
            for (row, value) in entries {
                visitor(*row as usize, value);
            }
        }
    }
}
