use std::{cmp::Ordering, fmt};

/// Literal values accepted by term filters.
#[derive(Clone, Debug, PartialEq)]
pub enum ScalarValue {
    /// Represents SQL/Arrow `NULL`.
    Null,
    /// Boolean literal.
    Boolean(bool),
    /// Signed 64-bit integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
}

/// Kind of a literal, used to infer the value type of a term list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `NULL` literal.
    Null,
    /// Boolean literal.
    Boolean,
    /// Integer literal.
    Int64,
    /// Floating point literal.
    Float64,
    /// String literal.
    Utf8,
}

impl ValueKind {
    /// Returns a textual representation of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "bool",
            ValueKind::Int64 => "int64",
            ValueKind::Float64 => "float64",
            ValueKind::Utf8 => "utf8",
        }
    }

    /// Returns true for integer and floating point kinds.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Int64 | ValueKind::Float64)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ScalarValue {
    /// Returns true when the literal is the `Null` variant.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Returns the kind of this literal.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            ScalarValue::Null => ValueKind::Null,
            ScalarValue::Boolean(_) => ValueKind::Boolean,
            ScalarValue::Int64(_) => ValueKind::Int64,
            ScalarValue::Float64(_) => ValueKind::Float64,
            ScalarValue::Utf8(_) => ValueKind::Utf8,
        }
    }

    /// Compares this scalar with another, returning the ordering when both sides are comparable.
    ///
    /// Integers and floats compare numerically; every other cross-kind pair is incomparable.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        use ScalarValue::*;
        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Boolean(lhs), Boolean(rhs)) => Some(lhs.cmp(rhs)),
            (Int64(lhs), Int64(rhs)) => Some(lhs.cmp(rhs)),
            (Float64(lhs), Float64(rhs)) => lhs.partial_cmp(rhs),
            (Int64(lhs), Float64(rhs)) => compare_int_float(*lhs, *rhs),
            (Float64(lhs), Int64(rhs)) => compare_int_float(*rhs, *lhs).map(Ordering::reverse),
            (Utf8(lhs), Utf8(rhs)) => Some(lhs.cmp(rhs)),
            _ => None,
        }
    }

    /// Returns true when this value is a floating point NaN.
    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, ScalarValue::Float64(v) if v.is_nan())
    }
}

/// Bit pattern used to hash floats: `-0.0` folds into `0.0` so equal values share a key.
pub(crate) fn normalized_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

fn compare_int_float(int: i64, float: f64) -> Option<Ordering> {
    if float.is_nan() {
        return None;
    }
    // i64 -> f64 may round, so fall back to the integral part when the float is in range.
    if float >= i64::MAX as f64 {
        return Some(Ordering::Less);
    }
    if float < i64::MIN as f64 {
        return Some(Ordering::Greater);
    }
    let truncated = float.trunc() as i64;
    match int.cmp(&truncated) {
        Ordering::Equal => 0.0f64.partial_cmp(&(float - float.trunc())),
        other => Some(other),
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Boolean(v) => write!(f, "{v}"),
            ScalarValue::Int64(v) => write!(f, "{v}"),
            ScalarValue::Float64(v) => write!(f, "{v:?}"),
            ScalarValue::Utf8(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int64(i64::from(value))
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int64(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Float64(value)
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Utf8(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Utf8(value.to_owned())
    }
}

impl<T> From<Option<T>> for ScalarValue
where
    T: Into<ScalarValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(ScalarValue::Null, Into::into)
    }
}
