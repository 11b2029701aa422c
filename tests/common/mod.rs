//! Common test utilities for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, Int32Array, Int64Array, StringArray};
use tonbo_term::{
    exec::{eval_segment, ExprConfig, ExprScope, PhyTermFilterExpr, TermStrategy},
    query::{ColumnInfo, FieldId, FieldType, ScalarType, TermFilter},
    segment::{MemorySegment, Segment, SegmentKind},
};

pub const VALUE: FieldId = FieldId(100);
pub const PK: FieldId = FieldId(101);
pub const DOC: FieldId = FieldId(102);
pub const LIST: FieldId = FieldId(103);

pub fn value_column(ty: ScalarType) -> ColumnInfo {
    ColumnInfo::new(VALUE, "value", FieldType::Scalar(ty))
}

pub fn pk_column(ty: ScalarType) -> ColumnInfo {
    ColumnInfo::new(PK, "pk", FieldType::Scalar(ty))
}

pub fn doc_column<I, S>(path: I) -> ColumnInfo
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ColumnInfo::new(DOC, "doc", FieldType::Json).with_path(path)
}

/// Evaluates `filter` over the whole segment, returning the joined bitmap and
/// the strategy the node settled on.
pub fn evaluate(
    filter: TermFilter,
    segment: Arc<dyn Segment>,
    scope: ExprScope,
    config: ExprConfig,
) -> (BooleanArray, TermStrategy) {
    let mut expr =
        PhyTermFilterExpr::try_new(filter, segment, scope, config).expect("node construction");
    let bitmap = eval_segment(&mut expr, &scope).expect("evaluation");
    let strategy = expr.strategy().expect("strategy");
    (bitmap, strategy)
}

/// Same as [`evaluate`] with every optional strategy disabled.
pub fn scan(filter: TermFilter, segment: Arc<dyn Segment>, scope: ExprScope) -> BooleanArray {
    let (bitmap, strategy) = evaluate(filter, segment, scope, ExprConfig::scan_only());
    assert!(
        matches!(strategy, TermStrategy::Scan | TermStrategy::Empty),
        "scan-only config resolved to {strategy}"
    );
    bitmap
}

/// Rows as `Some(matched)` for valid rows and `None` for invalid ones.
pub fn rows(bitmap: &BooleanArray) -> Vec<Option<bool>> {
    bitmap.iter().collect()
}

/// Match bits only, ignoring validity.
pub fn bits(bitmap: &BooleanArray) -> Vec<bool> {
    bitmap.values().iter().collect()
}

/// Invalid rows never carry a match bit.
pub fn assert_invalid_rows_unset(bitmap: &BooleanArray) {
    for row in 0..bitmap.len() {
        if bitmap.is_null(row) {
            assert!(!bitmap.values().value(row), "invalid row {row} is set");
        }
    }
}

/// Random nullable int32 column with values in `0..domain`.
pub fn random_int32(rng: &mut fastrand::Rng, len: usize, domain: i32) -> ArrayRef {
    let values = (0..len)
        .map(|_| (rng.u8(0..10) != 0).then(|| rng.i32(0..domain)))
        .collect::<Vec<_>>();
    Arc::new(Int32Array::from(values))
}

/// Random nullable string column drawn from `words`.
pub fn random_words(rng: &mut fastrand::Rng, len: usize, words: &[&str]) -> ArrayRef {
    let values = (0..len)
        .map(|_| (rng.u8(0..10) != 0).then(|| words[rng.usize(..words.len())]))
        .collect::<Vec<_>>();
    Arc::new(StringArray::from(values))
}

/// Shuffled, unique int64 keys `base..base + len`.
pub fn shuffled_keys(rng: &mut fastrand::Rng, base: i64, len: usize) -> ArrayRef {
    let mut keys = (base..base + len as i64).collect::<Vec<_>>();
    rng.shuffle(&mut keys);
    Arc::new(Int64Array::from(keys))
}

/// Segment with a primary-key column and one indexed value column.
pub fn keyed_segment(kind: SegmentKind, keys: ArrayRef, values: ArrayRef) -> Arc<MemorySegment> {
    Arc::new(
        MemorySegment::builder(kind)
            .column(PK, keys)
            .column(VALUE, values)
            .primary_key(PK)
            .scalar_index(VALUE)
            .build()
            .expect("segment"),
    )
}
