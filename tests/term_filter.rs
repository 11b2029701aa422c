mod common;

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, ListArray, StringArray,
};
use arrow::datatypes::Int64Type;
use common::*;
use tonbo_term::{
    exec::{EvalContext, ExprConfig, ExprScope, PhyTermFilterExpr, PhysicalExpr, TermStrategy},
    mvcc::{ConsistencyLevel, Timestamp},
    query::{ColumnInfo, ExprError, FieldType, ScalarType, ScalarValue, TermFilter},
    segment::{HashScalarIndex, MemorySegment, PrimaryKey, Segment, SegmentKind},
};

#[test]
fn int32_scenario_across_batches() {
    let segment = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .column(
                VALUE,
                Arc::new(Int32Array::from(vec![
                    Some(20),
                    Some(25),
                    Some(30),
                    Some(40),
                    None,
                ])),
            )
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(value_column(ScalarType::Int32), [25i64, 30]);
    let scope = ExprScope::new(5).batch_size(2);
    let (bitmap, strategy) = evaluate(filter, segment, scope, ExprConfig::default());

    assert_eq!(strategy, TermStrategy::Scan);
    assert_eq!(bits(&bitmap), vec![false, true, true, false, false]);
    assert_eq!(
        (0..5).map(|row| bitmap.is_valid(row)).collect::<Vec<_>>(),
        vec![true, true, true, true, false]
    );
}

#[test]
fn json_tag_scenario() {
    let segment = Arc::new(
        MemorySegment::builder(SegmentKind::Sealed)
            .column(
                DOC,
                Arc::new(StringArray::from(vec![
                    r#"{"tag":"a"}"#,
                    r#"{"tag":"c"}"#,
                    "{}",
                ])),
            )
            .json_key_index(DOC)
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(doc_column(["tag"]), ["a", "b"]);
    let scope = ExprScope::new(3);

    let (indexed, strategy) =
        evaluate(filter.clone(), segment.clone(), scope, ExprConfig::default());
    assert_eq!(strategy, TermStrategy::JsonKeyIndex);
    assert_eq!(rows(&indexed), vec![Some(true), Some(false), None]);

    let scanned = scan(filter, segment, scope);
    assert_eq!(scanned, indexed);
}

#[test]
fn index_and_scan_agree_on_random_columns() {
    let mut rng = fastrand::Rng::with_seed(0x7e57);
    for trial in 0..24 {
        let len = rng.usize(1..300);
        let segment: Arc<dyn Segment> = keyed_segment(
            SegmentKind::Growing,
            shuffled_keys(&mut rng, 0, len),
            random_int32(&mut rng, len, 40),
        );
        let mut literals = (0..rng.usize(0..8))
            .map(|_| ScalarValue::Int64(rng.i64(-5..45)))
            .collect::<Vec<_>>();
        if rng.bool() {
            literals.push(ScalarValue::Float64(f64::from(rng.i32(0..40))));
            literals.push(ScalarValue::Float64(2.5));
            literals.push(ScalarValue::Null);
        }
        let filter = TermFilter::new(value_column(ScalarType::Int32), literals);
        let scope = ExprScope::new(len).batch_size(rng.usize(1..64));

        let (indexed, strategy) =
            evaluate(filter.clone(), segment.clone(), scope, ExprConfig::default());
        let scanned = scan(filter, segment, scope);
        assert!(
            matches!(strategy, TermStrategy::ScalarIndex | TermStrategy::Empty),
            "trial {trial}: {strategy}"
        );
        assert_eq!(indexed, scanned, "trial {trial}");
        assert_invalid_rows_unset(&scanned);
    }
}

#[test]
fn index_and_scan_agree_on_strings() {
    let mut rng = fastrand::Rng::with_seed(42);
    let words = ["ant", "bee", "cat", "dog", "eel"];
    for trial in 0..12 {
        let len = rng.usize(1..200);
        let segment = Arc::new(
            MemorySegment::builder(SegmentKind::Growing)
                .column(VALUE, random_words(&mut rng, len, &words))
                .scalar_index(VALUE)
                .build()
                .expect("segment"),
        );
        let literals = (0..rng.usize(1..4))
            .map(|_| *rng.choice(&words).expect("word"))
            .chain(["fox"])
            .collect::<Vec<_>>();
        let filter = TermFilter::new(value_column(ScalarType::VarChar), literals);
        let scope = ExprScope::new(len).batch_size(17);

        let (indexed, _) = evaluate(filter.clone(), segment.clone(), scope, ExprConfig::default());
        assert_eq!(indexed, scan(filter, segment, scope), "trial {trial}");
    }
}

#[test]
fn empty_term_list_reads_nothing() {
    // The attached index disagrees with the segment; touching it would fail.
    let short: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
    let index = HashScalarIndex::try_new(VALUE, &short).expect("index");
    let segment = Arc::new(
        MemorySegment::builder(SegmentKind::Sealed)
            .column(VALUE, Arc::new(Int32Array::from(vec![Some(1), None, Some(3)])))
            .attach_scalar_index(VALUE, Arc::new(index))
            .build()
            .expect("segment"),
    );
    for literals in [vec![], vec![ScalarValue::Null], vec![ScalarValue::Int64(1 << 40)]] {
        let filter = TermFilter::new(value_column(ScalarType::Int32), literals);
        let (bitmap, strategy) =
            evaluate(filter, segment.clone(), ExprScope::new(3), ExprConfig::default());
        assert_eq!(strategy, TermStrategy::Empty);
        assert_eq!(rows(&bitmap), vec![Some(false); 3]);
    }
}

#[test]
fn inconsistent_index_is_fatal() {
    let short: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
    let index = HashScalarIndex::try_new(VALUE, &short).expect("index");
    let segment = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .column(VALUE, Arc::new(Int32Array::from(vec![1, 2, 3])))
            .attach_scalar_index(VALUE, Arc::new(index))
            .build()
            .expect("segment"),
    );
    let mut expr = PhyTermFilterExpr::try_new(
        TermFilter::new(value_column(ScalarType::Int32), [2i64]),
        segment,
        ExprScope::new(3),
        ExprConfig::default(),
    )
    .expect("node");
    let err = expr.eval(&EvalContext::new(0, 3)).expect_err("inconsistent");
    assert!(matches!(
        err,
        ExprError::IndexInconsistency {
            expected: 3,
            actual: 2,
            ..
        }
    ));
}

#[test]
fn skip_is_sound() {
    let values: ArrayRef = Arc::new(Int64Array::from((100..200).collect::<Vec<i64>>()));
    let sealed: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Sealed)
            .column(VALUE, values.clone())
            .build()
            .expect("segment"),
    );
    let scope = ExprScope::new(100).batch_size(30);

    // Literal range straddles the segment: must be evaluated.
    for literals in [vec![50i64, 250], vec![99, 100], vec![199, 200], vec![150]] {
        let filter = TermFilter::new(value_column(ScalarType::Int64), literals.clone());
        let (bitmap, strategy) =
            evaluate(filter.clone(), sealed.clone(), scope, ExprConfig::default());
        assert_eq!(strategy, TermStrategy::Scan, "{literals:?}");
        assert_eq!(bitmap, scan(filter, sealed.clone(), scope));
    }

    // Literal range excludes the segment: nothing matches.
    for literals in [vec![1i64, 99], vec![200, 1000]] {
        let filter = TermFilter::new(value_column(ScalarType::Int64), literals.clone());
        let (bitmap, strategy) =
            evaluate(filter.clone(), sealed.clone(), scope, ExprConfig::default());
        assert_eq!(strategy, TermStrategy::Skip, "{literals:?}");
        assert_eq!(bitmap.true_count(), 0);
        assert_eq!(bits(&bitmap), bits(&scan(filter, sealed.clone(), scope)));
    }

    // Growing segments never skip.
    let growing: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .column(VALUE, values)
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(value_column(ScalarType::Int64), [1i64]);
    let (_, strategy) = evaluate(filter, growing, scope, ExprConfig::default());
    assert_eq!(strategy, TermStrategy::Scan);
}

#[test]
fn nan_statistics_never_skip() {
    let segment: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Sealed)
            .column(
                VALUE,
                Arc::new(Float64Array::from(vec![1.0, f64::NAN, 2.0, 10.0])),
            )
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(value_column(ScalarType::Double), [10i64]);
    let (bitmap, strategy) =
        evaluate(filter, segment, ExprScope::new(4), ExprConfig::default());
    assert_eq!(strategy, TermStrategy::Scan);
    assert_eq!(bits(&bitmap), vec![false, false, false, true]);
}

#[test]
fn primary_key_path_matches_scan() {
    let mut rng = fastrand::Rng::with_seed(99);
    for trial in 0..16 {
        let len = rng.usize(1..400);
        let segment: Arc<dyn Segment> = keyed_segment(
            SegmentKind::Sealed,
            shuffled_keys(&mut rng, 1_000, len),
            random_int32(&mut rng, len, 10),
        );
        let literals = (0..rng.usize(1..20))
            .map(|_| rng.i64(990..1_000 + len as i64 + 10))
            .collect::<Vec<_>>();
        let filter = TermFilter::new(pk_column(ScalarType::Int64), literals);
        let active = rng.usize(0..=len);
        let scope = ExprScope::new(active).batch_size(rng.usize(1..50));

        for consistency in [ConsistencyLevel::Eventually, ConsistencyLevel::Strong] {
            let (fast, strategy) = evaluate(
                filter.clone(),
                segment.clone(),
                scope.consistency(consistency),
                ExprConfig::default().enable_skip_index(false),
            );
            assert_eq!(strategy, TermStrategy::PrimaryKey, "trial {trial}");
            assert_eq!(fast, scan(filter.clone(), segment.clone(), scope), "trial {trial}");
        }
    }
}

#[test]
fn string_primary_keys_match_scan() {
    let keys: ArrayRef = Arc::new(StringArray::from(vec!["k3", "k1", "k4", "k2"]));
    let segment: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .column(PK, keys)
            .primary_key(PK)
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(pk_column(ScalarType::VarChar), ["k2", "k3", "k9"]);
    let scope = ExprScope::new(4).batch_size(3);
    let (fast, strategy) = evaluate(filter.clone(), segment.clone(), scope, ExprConfig::default());
    assert_eq!(strategy, TermStrategy::PrimaryKey);
    assert_eq!(rows(&fast), vec![Some(true), Some(false), Some(false), Some(true)]);
    assert_eq!(fast, scan(filter, segment, scope));
}

#[test]
fn primary_keys_honour_read_timestamp() {
    let segment = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .column(PK, Arc::new(Int64Array::from(vec![1, 2, 3])))
            .primary_key(PK)
            .insert_timestamps(vec![Timestamp::new(1), Timestamp::new(5), Timestamp::new(9)])
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(pk_column(ScalarType::Int64), [1i64, 2, 3]);
    let scope = ExprScope::new(3).read_ts(Timestamp::new(5));
    let (bitmap, _) = evaluate(filter, segment, scope, ExprConfig::default());
    assert_eq!(bits(&bitmap), vec![true, true, false]);
}

#[test]
fn caching_follows_consistency_level() {
    let segment = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .column(PK, Arc::new(Int64Array::from(vec![10, 20, 30, 40])))
            .primary_key(PK)
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(pk_column(ScalarType::Int64), [20i64, 40]);
    let batch = EvalContext::new(0, 4);
    let node = |consistency| {
        PhyTermFilterExpr::try_new(
            filter.clone(),
            segment.clone(),
            ExprScope::new(4).consistency(consistency),
            ExprConfig::default(),
        )
        .expect("node")
    };
    let mut eventual = node(ConsistencyLevel::Eventually);
    let mut strong = node(ConsistencyLevel::Strong);

    let before = eventual.eval(&batch).expect("eval");
    assert_eq!(bits(&before), vec![false, true, false, true]);
    assert_eq!(strong.eval(&batch).expect("eval"), before);

    assert!(segment.remove_primary_key(&PrimaryKey::Int64(40)));

    assert_eq!(eventual.eval(&batch).expect("eval"), before);
    assert_eq!(eventual.eval(&batch).expect("eval"), before);
    assert_eq!(
        bits(&strong.eval(&batch).expect("eval")),
        vec![false, true, false, false]
    );
}

#[test]
fn json_stored_value_round_trip() {
    let docs = vec![
        r#"{"a":{"b":7}}"#,
        r#"{"a":{"b":7.0}}"#,
        r#"{"a":{"b":"7"}}"#,
        r#"{"a":{"b":8}}"#,
        r#"{"a":[]}"#,
        r#"{"a":{"b":[7]}}"#,
    ];
    let segment: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .column(DOC, Arc::new(StringArray::from(docs)))
            .json_key_index(DOC)
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(doc_column(["a", "b"]), [7i64]);
    let scope = ExprScope::new(6).batch_size(4);
    let (indexed, strategy) = evaluate(filter.clone(), segment.clone(), scope, ExprConfig::default());
    assert_eq!(strategy, TermStrategy::JsonKeyIndex);
    assert_eq!(
        rows(&indexed),
        vec![Some(true), Some(true), None, Some(false), None, None]
    );
    assert_eq!(indexed, scan(filter, segment, scope));
}

#[test]
fn json_literal_in_stored_array() {
    let docs = vec![
        Some(r#"{"tags":["x","y"]}"#),
        Some(r#"{"tags":["z"]}"#),
        Some(r#"{"tags":[]}"#),
        Some(r#"{"tags":"x"}"#),
        None,
    ];
    let segment: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Sealed)
            .column(DOC, Arc::new(StringArray::from(docs)))
            .json_key_index(DOC)
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::in_field(doc_column(["tags"]), "x");
    let (bitmap, strategy) = evaluate(filter, segment, ExprScope::new(5), ExprConfig::default());
    assert_eq!(strategy, TermStrategy::Scan);
    assert_eq!(
        rows(&bitmap),
        vec![Some(true), Some(false), Some(false), None, None]
    );
}

#[test]
fn array_round_trips() {
    let lists: ArrayRef = Arc::new(ListArray::from_iter_primitive::<Int64Type, _, _>(vec![
        Some(vec![Some(5), Some(6)]),
        Some(vec![Some(6)]),
        Some(vec![]),
        None,
        Some(vec![Some(9), Some(5), Some(1)]),
    ]));
    let segment: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Sealed)
            .column(LIST, lists)
            .build()
            .expect("segment"),
    );
    let nums = ColumnInfo::new(LIST, "nums", FieldType::Array(ScalarType::Int64));
    let scope = ExprScope::new(5).batch_size(2);

    let (second, _) = evaluate(
        TermFilter::new(nums.clone().with_path(["1"]), [5i64, 6]),
        segment.clone(),
        scope,
        ExprConfig::default(),
    );
    assert_eq!(rows(&second), vec![Some(true), None, None, None, Some(true)]);

    let (contains, _) = evaluate(
        TermFilter::in_field(nums, 5i64),
        segment,
        scope,
        ExprConfig::default(),
    );
    assert_eq!(
        rows(&contains),
        vec![Some(true), Some(false), Some(false), None, Some(true)]
    );
}

#[test]
fn numeric_literals_widen_losslessly() {
    let segment: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .column(VALUE, Arc::new(Float64Array::from(vec![1.0, 2.5, -0.0, 4.0])))
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(
        value_column(ScalarType::Double),
        vec![
            ScalarValue::Int64(1),
            ScalarValue::Float64(0.0),
            ScalarValue::Float64(f64::NAN),
        ],
    );
    let (bitmap, _) = evaluate(filter, segment, ExprScope::new(4), ExprConfig::default());
    assert_eq!(bits(&bitmap), vec![true, false, true, false]);

    let segment: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .column(VALUE, Arc::new(Int32Array::from(vec![30, 31])))
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(value_column(ScalarType::Int32), [30.0, 31.5]);
    let (bitmap, _) = evaluate(filter, segment, ExprScope::new(2), ExprConfig::default());
    assert_eq!(bits(&bitmap), vec![true, false]);
}

#[test]
fn incompatible_literals_abort_evaluation() {
    let segment: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .column(VALUE, Arc::new(Int32Array::from(vec![1])))
            .column(DOC, Arc::new(StringArray::from(vec!["{}"])))
            .build()
            .expect("segment"),
    );
    for filter in [
        TermFilter::new(value_column(ScalarType::Int32), ["1"]),
        TermFilter::new(
            doc_column(["k"]),
            vec![ScalarValue::from("a"), ScalarValue::from(1i64)],
        ),
    ] {
        let mut expr = PhyTermFilterExpr::try_new(
            filter,
            segment.clone(),
            ExprScope::new(1),
            ExprConfig::default(),
        )
        .expect("node");
        assert!(matches!(
            expr.eval(&EvalContext::new(0, 1)),
            Err(ExprError::TypeMismatch { .. })
        ));
    }
}

#[test]
fn node_describes_itself() {
    let segment: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Growing)
            .build()
            .expect("segment"),
    );
    let column = doc_column(["a", "b"]);
    let expr = PhyTermFilterExpr::try_new(
        TermFilter::new(column.clone(), ["x", "y"]),
        segment,
        ExprScope::new(0),
        ExprConfig::default(),
    )
    .expect("node");
    let expr: Box<dyn PhysicalExpr> = Box::new(expr);
    assert!(expr.is_source());
    assert_eq!(expr.column_info(), Some(&column));
    assert_eq!(expr.name(), "PhyTermFilterExpr");
    assert_eq!(expr.to_string(), r#"doc["a"]["b"] IN ["x", "y"]"#);
}

#[test]
fn bool_columns_scan_and_index() {
    let values: ArrayRef = Arc::new(BooleanArray::from(vec![Some(true), None, Some(false)]));
    let segment: Arc<dyn Segment> = Arc::new(
        MemorySegment::builder(SegmentKind::Sealed)
            .column(VALUE, values)
            .scalar_index(VALUE)
            .build()
            .expect("segment"),
    );
    let filter = TermFilter::new(value_column(ScalarType::Bool), [true]);
    let (indexed, strategy) =
        evaluate(filter.clone(), segment.clone(), ExprScope::new(3), ExprConfig::default());
    assert_eq!(strategy, TermStrategy::ScalarIndex);
    assert_eq!(rows(&indexed), vec![Some(true), None, Some(false)]);
    assert_eq!(indexed, scan(filter, segment, ExprScope::new(3)));
}
