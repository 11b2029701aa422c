use std::fmt;

use super::{ColumnInfo, ScalarValue, ValueKind};

/// Logical `column IN (v1, ..., vn)` filter handed over by the planner.
///
/// With `is_in_field` set the direction flips: the single literal is looked up
/// inside the collection stored in each row (`v IN column[path]`).
#[derive(Clone, Debug, PartialEq)]
pub struct TermFilter {
    /// Column the filter reads.
    pub column: ColumnInfo,
    /// Literal candidates.
    pub values: Vec<ScalarValue>,
    /// True when testing a literal for membership in the stored collection.
    pub is_in_field: bool,
}

impl TermFilter {
    /// `column IN values`.
    #[must_use]
    pub fn new<I, V>(column: ColumnInfo, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        Self {
            column,
            values: values.into_iter().map(Into::into).collect(),
            is_in_field: false,
        }
    }

    /// `value IN column`, where the column stores a collection per row.
    #[must_use]
    pub fn in_field<V>(column: ColumnInfo, value: V) -> Self
    where
        V: Into<ScalarValue>,
    {
        Self {
            column,
            values: vec![value.into()],
            is_in_field: true,
        }
    }

    /// Value kind inferred from the first literal; `None` for an empty list.
    #[must_use]
    pub fn value_kind(&self) -> Option<ValueKind> {
        self.values.first().map(ScalarValue::kind)
    }
}

impl fmt::Display for TermFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_in_field {
            f.write_str("[")?;
            write_values(f, &self.values)?;
            return write!(f, "] IN {}", self.column);
        }
        write!(f, "{} IN [", self.column)?;
        write_values(f, &self.values)?;
        f.write_str("]")
    }
}

fn write_values(f: &mut fmt::Formatter<'_>, values: &[ScalarValue]) -> fmt::Result {
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FieldId, FieldType, ScalarType};

    #[test]
    fn renders_scalar_and_json_filters() {
        let age = ColumnInfo::new(FieldId(100), "age", FieldType::Scalar(ScalarType::Int32));
        let filter = TermFilter::new(age, [25i64, 30]);
        assert_eq!(filter.to_string(), "age IN [25, 30]");
        assert_eq!(filter.value_kind(), Some(ValueKind::Int64));

        let tag = ColumnInfo::new(FieldId(101), "meta", FieldType::Json).with_path(["tag"]);
        let filter = TermFilter::new(tag, ["a", "b"]);
        assert_eq!(filter.to_string(), "meta[\"tag\"] IN [\"a\", \"b\"]");
    }

    #[test]
    fn renders_in_field_direction() {
        let tags = ColumnInfo::new(FieldId(7), "tags", FieldType::Array(ScalarType::VarChar));
        let filter = TermFilter::in_field(tags, "x");
        assert!(filter.is_in_field);
        assert_eq!(filter.to_string(), "[\"x\"] IN tags");
    }

    #[test]
    fn empty_list_has_no_value_kind() {
        let id = ColumnInfo::new(FieldId(1), "id", FieldType::Scalar(ScalarType::Int64));
        let filter = TermFilter::new(id, Vec::<i64>::new());
        assert_eq!(filter.value_kind(), None);
        assert_eq!(filter.to_string(), "id IN []");
    }
}
