#![deny(missing_docs)]
//! Term membership filters (`column IN (v1, ..., vn)`) for Tonbo's Arrow read path.
//!
//! A planner hands over a [`query::TermFilter`]; the executor wraps it in an
//! [`exec::PhyTermFilterExpr`] bound to one [`segment::Segment`] and calls
//! [`exec::PhysicalExpr::eval`] once per batch. Each call yields a
//! `BooleanArray` over the batch: value bits mark matches, the null buffer
//! marks rows whose outcome is unknown (null values, missing JSON paths,
//! out-of-range array elements).
//!
//! ```
//! use std::sync::Arc;
//!
//! use arrow::array::Int32Array;
//! use tonbo_term::{
//!     exec::{eval_segment, ExprConfig, ExprScope, PhyTermFilterExpr},
//!     query::{ColumnInfo, FieldId, FieldType, ScalarType, TermFilter},
//!     segment::{MemorySegment, SegmentKind},
//! };
//!
//! let age = FieldId(100);
//! let segment = MemorySegment::builder(SegmentKind::Growing)
//!     .column(age, Arc::new(Int32Array::from(vec![Some(20), Some(25), None])))
//!     .build()
//!     .unwrap();
//! let column = ColumnInfo::new(age, "age", FieldType::Scalar(ScalarType::Int32));
//! let scope = ExprScope::new(3).batch_size(2);
//! let mut expr = PhyTermFilterExpr::try_new(
//!     TermFilter::new(column, [25i64, 30]),
//!     Arc::new(segment),
//!     scope,
//!     ExprConfig::default(),
//! )
//! .unwrap();
//!
//! let bitmap = eval_segment(&mut expr, &scope).unwrap();
//! assert_eq!(bitmap.iter().collect::<Vec<_>>(), vec![Some(false), Some(true), None]);
//! ```

mod observability;

/// Physical expression nodes and batch iteration.
pub mod exec;

/// MVCC primitives shared across modules.
pub mod mvcc;

/// Logical filter inputs: literals, columns and term filters.
pub mod query;

/// Storage collaborators: segments, statistics and indexes.
pub mod segment;
