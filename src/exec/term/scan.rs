//! Raw data scan over scalar column chunks.

use arrow::{
    array::{Array, ArrayRef, AsArray, BooleanArray},
    datatypes::{
        ArrowPrimitiveType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    },
};

use super::set::TermSet;
use crate::{
    exec::bitmap::BitmapBuilder,
    query::{ColumnInfo, ExprError, ScalarType},
};

/// Tests every row of `chunk` against `terms`. Null rows are false and invalid.
pub(crate) fn scan_scalar(
    column: &ColumnInfo,
    ty: ScalarType,
    chunk: &ArrayRef,
    terms: &TermSet,
) -> Result<BooleanArray, ExprError> {
    if chunk.data_type() != &ty.arrow_type() {
        return Err(ExprError::unsupported(
            column,
            format!("stored as {}, declared {ty}", chunk.data_type()),
        ));
    }
    let bitmap = match ty {
        ScalarType::Bool => {
            let values = chunk.as_boolean();
            let mut builder = BitmapBuilder::with_capacity(values.len());
            for value in values.iter() {
                match value {
                    Some(v) => builder.append(terms.contains_bool(v)),
                    None => builder.append_invalid(),
                }
            }
            builder.finish()
        }
        ScalarType::Int8 => probe::<Int8Type>(chunk, |v| terms.contains_int(i64::from(v))),
        ScalarType::Int16 => probe::<Int16Type>(chunk, |v| terms.contains_int(i64::from(v))),
        ScalarType::Int32 => probe::<Int32Type>(chunk, |v| terms.contains_int(i64::from(v))),
        ScalarType::Int64 => probe::<Int64Type>(chunk, |v| terms.contains_int(v)),
        ScalarType::Float => probe::<Float32Type>(chunk, |v| terms.contains_float(f64::from(v))),
        ScalarType::Double => probe::<Float64Type>(chunk, |v| terms.contains_float(v)),
        ScalarType::VarChar => {
            let values = chunk.as_string::<i32>();
            let mut builder = BitmapBuilder::with_capacity(values.len());
            for value in values.iter() {
                match value {
                    Some(v) => builder.append(terms.contains_str(v)),
                    None => builder.append_invalid(),
                }
            }
            builder.finish()
        }
    };
    Ok(bitmap)
}

fn probe<T>(chunk: &ArrayRef, hit: impl Fn(T::Native) -> bool) -> BooleanArray
where
    T: ArrowPrimitiveType,
{
    let values = chunk.as_primitive::<T>();
    let mut builder = BitmapBuilder::with_capacity(values.len());
    for value in values.iter() {
        match value {
            Some(v) => builder.append(hit(v)),
            None => builder.append_invalid(),
        }
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{BooleanArray as Bools, Float32Array, Int32Array, StringArray};

    use super::*;
    use crate::query::{normalized_bits, FieldId, FieldType};

    fn column(ty: ScalarType) -> ColumnInfo {
        ColumnInfo::new(FieldId(1), "c", FieldType::Scalar(ty))
    }

    #[test]
    fn int32_rows_with_null() {
        let chunk: ArrayRef = Arc::new(Int32Array::from(vec![
            Some(20),
            Some(25),
            Some(30),
            Some(40),
            None,
        ]));
        let terms = TermSet::Int([25, 30].into_iter().collect());
        let bitmap = scan_scalar(&column(ScalarType::Int32), ScalarType::Int32, &chunk, &terms)
            .expect("scan");
        assert_eq!(
            bitmap.values().iter().collect::<Vec<_>>(),
            vec![false, true, true, false, false]
        );
        assert_eq!(
            (0..5).map(|row| bitmap.is_valid(row)).collect::<Vec<_>>(),
            vec![true, true, true, true, false]
        );
    }

    #[test]
    fn float32_and_strings() {
        let chunk: ArrayRef = Arc::new(Float32Array::from(vec![0.1f32, 0.2, -0.0]));
        let terms = TermSet::Float(
            [normalized_bits(f64::from(0.1f32)), normalized_bits(0.0)]
                .into_iter()
                .collect(),
        );
        let bitmap = scan_scalar(&column(ScalarType::Float), ScalarType::Float, &chunk, &terms)
            .expect("scan");
        assert_eq!(
            bitmap.iter().collect::<Vec<_>>(),
            vec![Some(true), Some(false), Some(true)]
        );

        let chunk: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), None, Some("b")]));
        let terms = TermSet::Utf8(["b".to_owned()].into_iter().collect());
        let bitmap =
            scan_scalar(&column(ScalarType::VarChar), ScalarType::VarChar, &chunk, &terms)
                .expect("scan");
        assert_eq!(
            bitmap.iter().collect::<Vec<_>>(),
            vec![Some(false), None, Some(true)]
        );
    }

    #[test]
    fn bool_rows() {
        let chunk: ArrayRef = Arc::new(Bools::from(vec![Some(true), Some(false), None]));
        let terms = TermSet::Bool([false].into_iter().collect());
        let bitmap = scan_scalar(&column(ScalarType::Bool), ScalarType::Bool, &chunk, &terms)
            .expect("scan");
        assert_eq!(
            bitmap.iter().collect::<Vec<_>>(),
            vec![Some(false), Some(true), None]
        );
    }

    #[test]
    fn storage_type_must_match_declaration() {
        let chunk: ArrayRef = Arc::new(Int32Array::from(vec![1]));
        let terms = TermSet::Int([1].into_iter().collect());
        let err = scan_scalar(&column(ScalarType::Int64), ScalarType::Int64, &chunk, &terms)
            .expect_err("mismatch");
        assert!(matches!(err, ExprError::UnsupportedRepresentation { .. }));
    }
}
