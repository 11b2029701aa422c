use std::{fmt, sync::Arc};

use arrow::datatypes::DataType;

/// Identifier of a field within a collection schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub i64);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scalar element types a term filter can compare against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Boolean.
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    VarChar,
}

impl ScalarType {
    /// Returns the Arrow type used for buffers of this scalar type.
    #[must_use]
    pub fn arrow_type(self) -> DataType {
        match self {
            ScalarType::Bool => DataType::Boolean,
            ScalarType::Int8 => DataType::Int8,
            ScalarType::Int16 => DataType::Int16,
            ScalarType::Int32 => DataType::Int32,
            ScalarType::Int64 => DataType::Int64,
            ScalarType::Float => DataType::Float32,
            ScalarType::Double => DataType::Float64,
            ScalarType::VarChar => DataType::Utf8,
        }
    }

    /// Maps an Arrow type back to the scalar type, if supported.
    #[must_use]
    pub fn from_arrow(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Boolean => Some(ScalarType::Bool),
            DataType::Int8 => Some(ScalarType::Int8),
            DataType::Int16 => Some(ScalarType::Int16),
            DataType::Int32 => Some(ScalarType::Int32),
            DataType::Int64 => Some(ScalarType::Int64),
            DataType::Float32 => Some(ScalarType::Float),
            DataType::Float64 => Some(ScalarType::Double),
            DataType::Utf8 => Some(ScalarType::VarChar),
            _ => None,
        }
    }

    /// Returns true for the signed integer types.
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ScalarType::Int8 | ScalarType::Int16 | ScalarType::Int32 | ScalarType::Int64
        )
    }

    /// Returns true for the floating point types.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::Float | ScalarType::Double)
    }

    /// Inclusive value range of an integer type.
    pub(crate) fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            ScalarType::Int8 => Some((i64::from(i8::MIN), i64::from(i8::MAX))),
            ScalarType::Int16 => Some((i64::from(i16::MIN), i64::from(i16::MAX))),
            ScalarType::Int32 => Some((i64::from(i32::MIN), i64::from(i32::MAX))),
            ScalarType::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Bool => "bool",
            ScalarType::Int8 => "int8",
            ScalarType::Int16 => "int16",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::VarChar => "varchar",
        };
        f.write_str(name)
    }
}

/// Storage representation of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// Plain scalar column.
    Scalar(ScalarType),
    /// JSON documents stored as UTF-8 text.
    Json,
    /// Variable-length arrays of a scalar element type.
    Array(ScalarType),
}

impl FieldType {
    /// Returns the scalar type for plain scalar columns.
    #[must_use]
    pub fn as_scalar(self) -> Option<ScalarType> {
        match self {
            FieldType::Scalar(ty) => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(ty) => write!(f, "{ty}"),
            FieldType::Json => f.write_str("json"),
            FieldType::Array(ty) => write!(f, "array<{ty}>"),
        }
    }
}

/// Identity of the column a term filter reads.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ColumnInfo {
    /// Field identifier within the segment.
    pub field_id: FieldId,
    /// Field name, used for rendering.
    pub name: Arc<str>,
    /// Storage representation.
    pub field_type: FieldType,
    /// Path into structured values: JSON keys, or a single element index for arrays.
    pub nested_path: Vec<String>,
}

impl ColumnInfo {
    /// Creates a column reference without a nested path.
    #[must_use]
    pub fn new<N>(field_id: FieldId, name: N, field_type: FieldType) -> Self
    where
        N: Into<Arc<str>>,
    {
        Self {
            field_id,
            name: name.into(),
            field_type,
            nested_path: Vec::new(),
        }
    }

    /// Replaces the nested path.
    #[must_use]
    pub fn with_path<I, S>(self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nested_path: path.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    /// Renders the nested path as an RFC 6901 JSON pointer.
    #[must_use]
    pub fn json_pointer(&self) -> String {
        let mut pointer = String::new();
        for key in &self.nested_path {
            pointer.push('/');
            pointer.push_str(&key.replace('~', "~0").replace('/', "~1"));
        }
        pointer
    }
}

impl fmt::Display for ColumnInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for key in &self.nested_path {
            match self.field_type {
                FieldType::Array(_) => write!(f, "[{key}]")?,
                _ => write!(f, "[{key:?}]")?,
            }
        }
        Ok(())
    }
}
