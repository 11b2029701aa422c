//! Membership over list columns.
//!
//! Element membership is computed once over the child values the chunk
//! covers, then folded per row through the list offsets.

use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, ListArray};

use super::{scan::scan_scalar, set::TermSet};
use crate::{
    exec::bitmap::BitmapBuilder,
    query::{ColumnInfo, ExprError, ScalarType},
};

/// `row[index] IN terms`. Null rows, short rows and null elements are invalid.
pub(crate) fn scan_element_in_terms(
    column: &ColumnInfo,
    element: ScalarType,
    chunk: &ArrayRef,
    index: usize,
    terms: &TermSet,
) -> Result<BooleanArray, ExprError> {
    let (list, matches, base) = element_matches(column, element, chunk, terms)?;
    let offsets = list.value_offsets();
    let mut builder = BitmapBuilder::with_capacity(list.len());
    for row in 0..list.len() {
        let start = offsets[row] as usize - base;
        let end = offsets[row + 1] as usize - base;
        match start.checked_add(index).filter(|pos| *pos < end) {
            Some(pos) if list.is_valid(row) && matches.is_valid(pos) => {
                builder.append(matches.value(pos))
            }
            _ => builder.append_invalid(),
        }
    }
    Ok(builder.finish())
}

/// `literal IN row`: true when any non-null element of the row is in `terms`.
/// An empty row is false; a null row is invalid.
pub(crate) fn scan_terms_in_elements(
    column: &ColumnInfo,
    element: ScalarType,
    chunk: &ArrayRef,
    terms: &TermSet,
) -> Result<BooleanArray, ExprError> {
    let (list, matches, base) = element_matches(column, element, chunk, terms)?;
    let offsets = list.value_offsets();
    let mut builder = BitmapBuilder::with_capacity(list.len());
    for row in 0..list.len() {
        if list.is_null(row) {
            builder.append_invalid();
            continue;
        }
        let start = offsets[row] as usize - base;
        let end = offsets[row + 1] as usize - base;
        builder.append((start..end).any(|pos| matches.is_valid(pos) && matches.value(pos)));
    }
    Ok(builder.finish())
}

fn element_matches<'a>(
    column: &ColumnInfo,
    element: ScalarType,
    chunk: &'a ArrayRef,
    terms: &TermSet,
) -> Result<(&'a ListArray, BooleanArray, usize), ExprError> {
    let list = chunk.as_list_opt::<i32>().ok_or_else(|| {
        ExprError::unsupported(column, format!("array stored as {}", chunk.data_type()))
    })?;
    let offsets = list.value_offsets();
    let base = offsets[0] as usize;
    let end = offsets[offsets.len() - 1] as usize;
    let values = list.values().slice(base, end - base);
    let matches = scan_scalar(column, element, &values, terms)?;
    Ok((list, matches, base))
}
