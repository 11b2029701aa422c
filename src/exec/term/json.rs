//! Membership over JSON documents stored as UTF-8 text.
//!
//! A row takes part in a comparison only when its document parses, the path
//! resolves and the value there is comparable with the literals; every other
//! row is false and invalid.

use arrow::{
    array::{Array, ArrayRef, AsArray, BooleanArray, BooleanBufferBuilder, StringArray},
    buffer::NullBuffer,
};
use serde_json::Value;

use super::set::{Membership, TermSets};
use crate::{
    exec::bitmap::BitmapBuilder,
    query::{ColumnInfo, ExprError},
    segment::JsonKeyIndex,
};

/// `doc[path] IN terms` for every row of `chunk`.
pub(crate) fn scan_value_in_terms(
    column: &ColumnInfo,
    chunk: &ArrayRef,
    pointer: &str,
    terms: &TermSets,
) -> Result<BooleanArray, ExprError> {
    let documents = documents(column, chunk)?;
    let mut builder = BitmapBuilder::with_capacity(documents.len());
    for document in documents.iter() {
        let membership = document
            .and_then(|text| serde_json::from_str::<Value>(text).ok())
            .and_then(|doc| doc.pointer(pointer).map(|value| terms.probe_json(value)));
        match membership {
            Some(Membership::Match) => builder.append(true),
            Some(Membership::Miss) => builder.append(false),
            Some(Membership::Incompatible) | None => builder.append_invalid(),
        }
    }
    Ok(builder.finish())
}

/// `literal IN doc[path]` for every row of `chunk`; the value at the path
/// must be a JSON array.
pub(crate) fn scan_terms_in_value(
    column: &ColumnInfo,
    chunk: &ArrayRef,
    pointer: &str,
    terms: &TermSets,
) -> Result<BooleanArray, ExprError> {
    let documents = documents(column, chunk)?;
    let mut builder = BitmapBuilder::with_capacity(documents.len());
    for document in documents.iter() {
        let found = document
            .and_then(|text| serde_json::from_str::<Value>(text).ok())
            .and_then(|doc| match doc.pointer(pointer) {
                Some(Value::Array(items)) => Some(
                    items
                        .iter()
                        .any(|item| terms.probe_json(item) == Membership::Match),
                ),
                _ => None,
            });
        match found {
            Some(found) => builder.append(found),
            None => builder.append_invalid(),
        }
    }
    Ok(builder.finish())
}

/// Full-segment bitmap from a key index, with the same row semantics as
/// [`scan_value_in_terms`].
pub(crate) fn key_index_value_in_terms(
    index: &dyn JsonKeyIndex,
    pointer: &str,
    terms: &TermSets,
    active_count: usize,
) -> BooleanArray {
    let mut values = BooleanBufferBuilder::new(active_count);
    values.append_n(active_count, false);
    let mut validity = BooleanBufferBuilder::new(active_count);
    validity.append_n(active_count, false);
    index.visit_path(pointer, &mut |row, value| {
        if row >= active_count {
            return;
        }
        match terms.probe_json(value) {
            Membership::Match => {
                values.set_bit(row, true);
                validity.set_bit(row, true);
            }
            Membership::Miss => validity.set_bit(row, true),
            Membership::Incompatible => {}
        }
    });
    let nulls = NullBuffer::new(validity.finish());
    let nulls = (nulls.null_count() > 0).then_some(nulls);
    BooleanArray::new(values.finish(), nulls)
}

fn documents<'a>(column: &ColumnInfo, chunk: &'a ArrayRef) -> Result<&'a StringArray, ExprError> {
    chunk.as_string_opt::<i32>().ok_or_else(|| {
        ExprError::unsupported(
            column,
            format!("json documents stored as {}", chunk.data_type()),
        )
    })
}
