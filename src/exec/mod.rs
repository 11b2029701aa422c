//! Physical expression nodes and the batch contract that drives them.
//!
//! An executor owns a tree of boxed [`PhysicalExpr`] nodes and calls
//! [`PhysicalExpr::eval`] once per batch of a segment, in row order. Batches are
//! described by an [`EvalContext`]; [`ExprScope::batches`] yields the contexts
//! covering a segment's active rows.

mod bitmap;
pub mod term;

use std::fmt;

use arrow::array::BooleanArray;

pub use self::term::{PhyTermFilterExpr, TermStrategy};
use crate::{
    mvcc::{ConsistencyLevel, Timestamp},
    query::{ColumnInfo, ExprError},
};

/// Rows evaluated per call when the executor does not choose otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// A node of the physical filter tree.
///
/// The rendered form (`Display`) is used by plan explain output.
pub trait PhysicalExpr: fmt::Display + Send {
    /// Evaluates the node over the rows described by `ctx`.
    ///
    /// The result has exactly `ctx.len` entries; invalid entries are never set.
    fn eval(&mut self, ctx: &EvalContext) -> Result<BooleanArray, ExprError>;

    /// True for leaves that read from storage rather than from child results.
    fn is_source(&self) -> bool {
        false
    }

    /// Column filtered by this node, if it reads exactly one.
    fn column_info(&self) -> Option<&ColumnInfo> {
        None
    }

    /// Short node name for plan output.
    fn name(&self) -> &'static str;
}

/// Rows of one batch, in segment coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EvalContext {
    /// First row of the batch.
    pub offset: usize,
    /// Number of rows in the batch.
    pub len: usize,
}

impl EvalContext {
    /// Creates a context for rows `[offset, offset + len)`.
    #[must_use]
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// One past the last row of the batch.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Segment-wide parameters fixed when a node is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExprScope {
    /// Rows of the segment visible to the query.
    pub active_count: usize,
    /// Rows per batch.
    pub batch_size: usize,
    /// Timestamp the query reads at.
    pub read_ts: Timestamp,
    /// Visibility guarantee of the query.
    pub consistency: ConsistencyLevel,
}

impl ExprScope {
    /// Scope over `active_count` rows with default batch size, latest
    /// timestamp and default consistency.
    #[must_use]
    pub fn new(active_count: usize) -> Self {
        Self {
            active_count,
            batch_size: DEFAULT_BATCH_SIZE,
            read_ts: Timestamp::MAX,
            consistency: ConsistencyLevel::default(),
        }
    }

    /// Sets the batch size; zero is treated as one.
    #[must_use]
    pub fn batch_size(self, batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            ..self
        }
    }

    /// Sets the read timestamp.
    #[must_use]
    pub fn read_ts(self, read_ts: Timestamp) -> Self {
        Self { read_ts, ..self }
    }

    /// Sets the consistency level.
    #[must_use]
    pub fn consistency(self, consistency: ConsistencyLevel) -> Self {
        Self {
            consistency,
            ..self
        }
    }

    /// Contexts covering every active row, in order.
    #[must_use]
    pub fn batches(&self) -> BatchCursor {
        BatchCursor {
            next: 0,
            active_count: self.active_count,
            batch_size: self.batch_size.max(1),
        }
    }

    pub(crate) fn check(&self, ctx: &EvalContext) -> Result<(), ExprError> {
        if ctx.end() > self.active_count {
            return Err(ExprError::BatchOutOfRange {
                offset: ctx.offset,
                len: ctx.len,
                active_count: self.active_count,
            });
        }
        Ok(())
    }
}

/// Iterator over the batches of a segment.
#[derive(Clone, Debug)]
pub struct BatchCursor {
    next: usize,
    active_count: usize,
    batch_size: usize,
}

impl Iterator for BatchCursor {
    type Item = EvalContext;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.active_count {
            return None;
        }
        let len = self.batch_size.min(self.active_count - self.next);
        let ctx = EvalContext::new(self.next, len);
        self.next += len;
        Some(ctx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.active_count.saturating_sub(self.next)).div_ceil(self.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BatchCursor {}

/// Switches for the optional evaluation strategies.
///
/// Disabling a strategy makes the node fall through to the next one; results
/// never change, only the work done to obtain them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExprConfig {
    pub(crate) enable_skip_index: bool,
    pub(crate) enable_pk_fast_path: bool,
    pub(crate) enable_scalar_index: bool,
    pub(crate) enable_json_key_index: bool,
}

impl Default for ExprConfig {
    fn default() -> Self {
        Self {
            enable_skip_index: true,
            enable_pk_fast_path: true,
            enable_scalar_index: true,
            enable_json_key_index: true,
        }
    }
}

impl ExprConfig {
    /// Use segment statistics to skip segments that cannot match.
    #[must_use]
    pub fn enable_skip_index(self, enable: bool) -> Self {
        Self {
            enable_skip_index: enable,
            ..self
        }
    }

    /// Resolve primary-key filters through the key index.
    #[must_use]
    pub fn enable_pk_fast_path(self, enable: bool) -> Self {
        Self {
            enable_pk_fast_path: enable,
            ..self
        }
    }

    /// Delegate to scalar indexes when the segment has one.
    #[must_use]
    pub fn enable_scalar_index(self, enable: bool) -> Self {
        Self {
            enable_scalar_index: enable,
            ..self
        }
    }

    /// Use JSON key indexes for path lookups.
    #[must_use]
    pub fn enable_json_key_index(self, enable: bool) -> Self {
        Self {
            enable_json_key_index: enable,
            ..self
        }
    }

    /// Configuration that always scans raw column data.
    #[must_use]
    pub fn scan_only() -> Self {
        Self {
            enable_skip_index: false,
            enable_pk_fast_path: false,
            enable_scalar_index: false,
            enable_json_key_index: false,
        }
    }
}

/// Evaluates `expr` over every batch of `scope` and joins the results into one
/// bitmap over the active rows.
pub fn eval_segment(
    expr: &mut dyn PhysicalExpr,
    scope: &ExprScope,
) -> Result<BooleanArray, ExprError> {
    let mut builder = bitmap::BitmapBuilder::with_capacity(scope.active_count);
    for ctx in scope.batches() {
        builder.extend_from(&expr.eval(&ctx)?);
    }
    Ok(builder.finish())
}
