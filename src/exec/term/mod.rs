//! Physical node for term membership filters (`column IN (v1, ..., vn)`).
//!
//! The node is built once per segment and query, then driven batch by batch.
//! Its lazily built state follows a fixed order: the term sets on the first
//! call, then the evaluation strategy, then (for full-segment strategies under
//! a consistency level that permits it) the cached result.
//!
//! Strategies, in order of preference:
//!
//! 1. [`TermStrategy::Empty`]: no literal can match anything.
//! 2. [`TermStrategy::Skip`]: segment statistics rule out every literal.
//! 3. [`TermStrategy::PrimaryKey`]: literals resolve to offsets through the key index.
//! 4. [`TermStrategy::ScalarIndex`]: the segment's index answers for every row.
//! 5. [`TermStrategy::JsonKeyIndex`]: JSON values are read from the key index.
//! 6. [`TermStrategy::Scan`]: raw chunks are read and probed row by row.

mod array;
mod json;
mod pk;
mod scan;
mod set;
mod skip;

use std::{fmt, sync::Arc};

use arrow::array::BooleanArray;
use once_cell::unsync::OnceCell;

use self::set::TermSets;
use super::{bitmap, EvalContext, ExprConfig, ExprScope, PhysicalExpr};
use crate::{
    mvcc::Timestamp,
    observability::{log_debug, log_error, log_trace},
    query::{ColumnInfo, ExprError, FieldType, ScalarType, TermFilter},
    segment::Segment,
};

/// How a term node answers its batches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TermStrategy {
    /// The term set is empty; nothing matches.
    Empty,
    /// Segment statistics prove that nothing matches.
    Skip,
    /// Offsets are resolved through the primary-key index.
    PrimaryKey,
    /// Membership is delegated to a scalar index.
    ScalarIndex,
    /// Values at the JSON path are read from a key index.
    JsonKeyIndex,
    /// Raw column data is scanned.
    Scan,
}

impl TermStrategy {
    /// Returns a textual representation of the strategy.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TermStrategy::Empty => "empty",
            TermStrategy::Skip => "skip",
            TermStrategy::PrimaryKey => "primary_key",
            TermStrategy::ScalarIndex => "scalar_index",
            TermStrategy::JsonKeyIndex => "json_key_index",
            TermStrategy::Scan => "scan",
        }
    }
}

impl fmt::Display for TermStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column representation and membership direction, checked at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Shape {
    Scalar(ScalarType),
    JsonValue { pointer: String },
    JsonInField { pointer: String },
    ArrayElement { element: ScalarType, index: usize },
    ArrayInField { element: ScalarType },
}

impl Shape {
    fn of(filter: &TermFilter) -> Result<Self, ExprError> {
        let column = &filter.column;
        if filter.is_in_field && filter.values.len() != 1 {
            return Err(ExprError::unsupported(
                column,
                format!(
                    "in-field membership takes one literal, got {}",
                    filter.values.len()
                ),
            ));
        }
        match column.field_type {
            FieldType::Scalar(ty) => {
                if !column.nested_path.is_empty() {
                    return Err(ExprError::unsupported(
                        column,
                        "nested path on a scalar column",
                    ));
                }
                if filter.is_in_field {
                    return Err(ExprError::unsupported(
                        column,
                        "in-field membership on a scalar column",
                    ));
                }
                Ok(Shape::Scalar(ty))
            }
            FieldType::Json => {
                let pointer = column.json_pointer();
                Ok(if filter.is_in_field {
                    Shape::JsonInField { pointer }
                } else {
                    Shape::JsonValue { pointer }
                })
            }
            FieldType::Array(element) if filter.is_in_field => {
                if !column.nested_path.is_empty() {
                    return Err(ExprError::unsupported(
                        column,
                        "in-field membership on an array element",
                    ));
                }
                Ok(Shape::ArrayInField { element })
            }
            FieldType::Array(element) => match column.nested_path.as_slice() {
                [index] => index
                    .parse::<usize>()
                    .map(|index| Shape::ArrayElement { element, index })
                    .map_err(|_| {
                        ExprError::unsupported(column, format!("invalid array index {index:?}"))
                    }),
                _ => Err(ExprError::unsupported(
                    column,
                    "array column needs exactly one element index",
                )),
            },
        }
    }
}

/// Full-segment result of the primary-key or index strategies.
#[derive(Debug)]
enum FullResult {
    Offsets(Vec<usize>),
    Bitmap(BooleanArray),
}

impl FullResult {
    fn slice(&self, ctx: &EvalContext) -> BooleanArray {
        match self {
            FullResult::Offsets(offsets) => bitmap::from_sorted_offsets(offsets, ctx.offset, ctx.len),
            FullResult::Bitmap(bitmap) => bitmap.slice(ctx.offset, ctx.len),
        }
    }
}

#[derive(Debug)]
struct CachedResult {
    result: FullResult,
    read_ts: Timestamp,
}

/// Physical `IN` filter over one column of one segment.
///
/// Owned by a single query and driven from a single thread; the lazily built
/// state is not synchronised.
pub struct PhyTermFilterExpr {
    filter: TermFilter,
    segment: Arc<dyn Segment>,
    scope: ExprScope,
    config: ExprConfig,
    shape: Shape,
    terms: OnceCell<TermSets>,
    strategy: OnceCell<TermStrategy>,
    cached: OnceCell<CachedResult>,
}

impl PhyTermFilterExpr {
    /// Builds the node, validating that the column representation supports
    /// the requested membership direction.
    ///
    /// Literal types are checked on first evaluation, when the term set is built.
    pub fn try_new(
        filter: TermFilter,
        segment: Arc<dyn Segment>,
        scope: ExprScope,
        config: ExprConfig,
    ) -> Result<Self, ExprError> {
        let shape = Shape::of(&filter)?;
        Ok(Self {
            filter,
            segment,
            scope,
            config,
            shape,
            terms: OnceCell::new(),
            strategy: OnceCell::new(),
            cached: OnceCell::new(),
        })
    }

    /// The filter this node evaluates.
    #[must_use]
    pub fn filter(&self) -> &TermFilter {
        &self.filter
    }

    /// Segment-wide parameters of the node.
    #[must_use]
    pub fn scope(&self) -> &ExprScope {
        &self.scope
    }

    /// Strategy used to answer batches, resolving it if no batch ran yet.
    pub fn strategy(&self) -> Result<TermStrategy, ExprError> {
        let terms = self.terms()?;
        Ok(*self.strategy.get_or_init(|| self.resolve_strategy(terms)))
    }

    fn terms(&self) -> Result<&TermSets, ExprError> {
        self.terms.get_or_try_init(|| {
            let column = &self.filter.column;
            let values = &self.filter.values;
            match self.shape {
                Shape::Scalar(ty) => TermSets::build(column, ty, values),
                Shape::JsonValue { .. } | Shape::JsonInField { .. } => {
                    TermSets::build_for_json(column, values)
                }
                Shape::ArrayElement { element, .. } | Shape::ArrayInField { element } => {
                    TermSets::build(column, element, values)
                }
            }
        })
    }

    fn resolve_strategy(&self, terms: &TermSets) -> TermStrategy {
        let field = self.filter.column.field_id;
        let strategy = if terms.is_empty() {
            TermStrategy::Empty
        } else {
            match self.shape {
                Shape::Scalar(ty) => {
                    if self.config.enable_skip_index
                        && skip::cannot_match(
                            self.segment.kind(),
                            self.segment.column_stats(field).as_ref(),
                            terms.primary(),
                        )
                    {
                        TermStrategy::Skip
                    } else if self.config.enable_pk_fast_path
                        && self.segment.primary_key_field() == Some(field)
                        && matches!(ty, ScalarType::Int64 | ScalarType::VarChar)
                    {
                        TermStrategy::PrimaryKey
                    } else if self.config.enable_scalar_index
                        && self.segment.scalar_index(field).is_some()
                    {
                        TermStrategy::ScalarIndex
                    } else {
                        TermStrategy::Scan
                    }
                }
                Shape::JsonValue { .. }
                    if self.config.enable_json_key_index
                        && self.segment.json_key_index(field).is_some() =>
                {
                    TermStrategy::JsonKeyIndex
                }
                _ => TermStrategy::Scan,
            }
        };
        log_debug!(
            component = "term",
            event = "strategy_resolved",
            expr = %self.filter,
            strategy = %strategy,
            segment_kind = ?self.segment.kind(),
            active_count = self.scope.active_count,
            consistency = %self.scope.consistency,
        );
        strategy
    }

    /// Answers `ctx` from a full-segment result, computing it at most once
    /// when the consistency level allows caching.
    fn eval_full<F>(&self, ctx: &EvalContext, compute: F) -> Result<BooleanArray, ExprError>
    where
        F: FnOnce(&Self) -> Result<FullResult, ExprError>,
    {
        if !self.scope.consistency.allows_result_cache() {
            return Ok(compute(self)?.slice(ctx));
        }
        if let Some(cached) = self.cached.get() {
            log_trace!(
                component = "term",
                event = "cached_result_reused",
                expr = %self.filter,
                read_ts = cached.read_ts.get(),
                offset = ctx.offset,
                len = ctx.len,
            );
            return Ok(cached.result.slice(ctx));
        }
        let cached = self.cached.get_or_try_init(|| {
            compute(self).map(|result| CachedResult {
                result,
                read_ts: self.scope.read_ts,
            })
        })?;
        Ok(cached.result.slice(ctx))
    }

    fn primary_key_offsets(&self, terms: &TermSets) -> Result<FullResult, ExprError> {
        pk::resolve_offsets(
            &self.filter.column,
            self.segment.as_ref(),
            terms.primary(),
            self.scope.active_count,
            self.scope.read_ts,
        )
        .map(FullResult::Offsets)
        .ok_or_else(|| {
            ExprError::unsupported(&self.filter.column, "literals cannot address primary keys")
        })
    }

    fn scalar_index_bitmap(&self, terms: &TermSets) -> Result<FullResult, ExprError> {
        let column = &self.filter.column;
        let index = self.segment.scalar_index(column.field_id).ok_or_else(|| {
            ExprError::unsupported(column, "scalar index disappeared from the segment")
        })?;
        self.check_index_rows(index.row_count())?;
        let bitmap = index.is_in(&terms.primary().to_scalars());
        debug_assert_eq!(bitmap.len(), self.scope.active_count);
        log_debug!(
            component = "index",
            event = "index_bitmap_computed",
            column = %column,
            terms = terms.primary().len(),
            matches = bitmap.true_count(),
        );
        Ok(FullResult::Bitmap(bitmap))
    }

    fn json_key_index_bitmap(&self, terms: &TermSets) -> Result<FullResult, ExprError> {
        let column = &self.filter.column;
        let Shape::JsonValue { pointer } = &self.shape else {
            return Err(ExprError::unsupported(
                column,
                "json key index is not usable for this column",
            ));
        };
        let index = self.segment.json_key_index(column.field_id).ok_or_else(|| {
            ExprError::unsupported(column, "json key index disappeared from the segment")
        })?;
        self.check_index_rows(index.row_count())?;
        let bitmap =
            json::key_index_value_in_terms(index.as_ref(), pointer, terms, self.scope.active_count);
        log_debug!(
            component = "json_key_index",
            event = "index_bitmap_computed",
            column = %column,
            pointer = %pointer,
            matches = bitmap.true_count(),
        );
        Ok(FullResult::Bitmap(bitmap))
    }

    fn check_index_rows(&self, row_count: usize) -> Result<(), ExprError> {
        if row_count == self.scope.active_count {
            return Ok(());
        }
        let column = self.filter.column.to_string();
        log_error!(
            component = "index",
            event = "index_inconsistency",
            column = %column,
            index_rows = row_count,
            active_count = self.scope.active_count,
        );
        Err(ExprError::IndexInconsistency {
            column,
            expected: self.scope.active_count,
            actual: row_count,
        })
    }

    fn scan(&self, terms: &TermSets, ctx: &EvalContext) -> Result<BooleanArray, ExprError> {
        let column = &self.filter.column;
        let chunk = self.segment.chunk(column.field_id, ctx.offset, ctx.len)?;
        match &self.shape {
            Shape::Scalar(ty) => scan::scan_scalar(column, *ty, &chunk, terms.primary()),
            Shape::JsonValue { pointer } => json::scan_value_in_terms(column, &chunk, pointer, terms),
            Shape::JsonInField { pointer } => {
                json::scan_terms_in_value(column, &chunk, pointer, terms)
            }
            Shape::ArrayElement { element, index } => {
                array::scan_element_in_terms(column, *element, &chunk, *index, terms.primary())
            }
            Shape::ArrayInField { element } => {
                array::scan_terms_in_elements(column, *element, &chunk, terms.primary())
            }
        }
    }
}

impl PhysicalExpr for PhyTermFilterExpr {
    fn eval(&mut self, ctx: &EvalContext) -> Result<BooleanArray, ExprError> {
        self.scope.check(ctx)?;
        let terms = self.terms()?;
        let strategy = *self.strategy.get_or_init(|| self.resolve_strategy(terms));
        let bitmap = match strategy {
            TermStrategy::Empty | TermStrategy::Skip => bitmap::all_false(ctx.len),
            TermStrategy::PrimaryKey => {
                self.eval_full(ctx, |node| node.primary_key_offsets(terms))?
            }
            TermStrategy::ScalarIndex => {
                self.eval_full(ctx, |node| node.scalar_index_bitmap(terms))?
            }
            TermStrategy::JsonKeyIndex => {
                self.eval_full(ctx, |node| node.json_key_index_bitmap(terms))?
            }
            TermStrategy::Scan => self.scan(terms, ctx)?,
        };
        log_trace!(
            component = "term",
            event = "batch_evaluated",
            strategy = %strategy,
            offset = ctx.offset,
            len = ctx.len,
            matches = bitmap.true_count(),
        );
        Ok(bitmap)
    }

    fn is_source(&self) -> bool {
        true
    }

    fn column_info(&self) -> Option<&ColumnInfo> {
        Some(&self.filter.column)
    }

    fn name(&self) -> &'static str {
        "PhyTermFilterExpr"
    }
}

impl fmt::Display for PhyTermFilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.filter, f)
    }
}
