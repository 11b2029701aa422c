//! Logical inputs of term evaluation.
//!
//! The planner hands over a [`TermFilter`]: the column it targets, the
//! literal candidates and the direction of the membership test. Everything in
//! this module is immutable once built and owned by the physical node.

mod column;
mod error;
mod term;
mod value;

pub use column::{ColumnInfo, FieldId, FieldType, ScalarType};
pub use error::ExprError;
pub use term::TermFilter;
pub(crate) use value::normalized_bits;
pub use value::{ScalarValue, ValueKind};
