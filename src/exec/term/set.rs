//! Literal term sets and the numeric widening policy.
//!
//! Literals are folded into the column's domain once: anything that cannot be
//! represented exactly in that domain can never be equal to a stored value
//! and is dropped. Float columns of width 32 compare in f32 precision.

use hashbrown::HashSet;
use serde_json::Value;

use crate::{
    observability::log_debug,
    query::{normalized_bits, ColumnInfo, ExprError, FieldType, ScalarType, ScalarValue, ValueKind},
    segment::PrimaryKey,
};

/// 2^63 as f64; integral floats in `[-2^63, 2^63)` convert to i64 exactly.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// One hash set of literal values in a single comparison domain.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TermSet {
    Bool(HashSet<bool>),
    Int(HashSet<i64>),
    /// Normalized f64 bit patterns; NaN is never stored.
    Float(HashSet<u64>),
    Utf8(HashSet<String>),
}

impl TermSet {
    fn empty_for(target: ScalarType) -> Self {
        match target {
            ScalarType::Bool => TermSet::Bool(HashSet::new()),
            ScalarType::Int8 | ScalarType::Int16 | ScalarType::Int32 | ScalarType::Int64 => {
                TermSet::Int(HashSet::new())
            }
            ScalarType::Float | ScalarType::Double => TermSet::Float(HashSet::new()),
            ScalarType::VarChar => TermSet::Utf8(HashSet::new()),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            TermSet::Bool(set) => set.len(),
            TermSet::Int(set) => set.len(),
            TermSet::Float(set) => set.len(),
            TermSet::Utf8(set) => set.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn contains_bool(&self, value: bool) -> bool {
        matches!(self, TermSet::Bool(set) if set.contains(&value))
    }

    pub(crate) fn contains_int(&self, value: i64) -> bool {
        matches!(self, TermSet::Int(set) if set.contains(&value))
    }

    pub(crate) fn contains_float(&self, value: f64) -> bool {
        matches!(self, TermSet::Float(set) if !value.is_nan() && set.contains(&normalized_bits(value)))
    }

    pub(crate) fn contains_str(&self, value: &str) -> bool {
        matches!(self, TermSet::Utf8(set) if set.contains(value))
    }

    /// Smallest and largest member, for orderable domains.
    pub(crate) fn bounds(&self) -> Option<(ScalarValue, ScalarValue)> {
        match self {
            TermSet::Bool(_) => None,
            TermSet::Int(set) => {
                let min = set.iter().min()?;
                let max = set.iter().max()?;
                Some((ScalarValue::Int64(*min), ScalarValue::Int64(*max)))
            }
            TermSet::Float(set) => {
                let mut values = set.iter().map(|bits| f64::from_bits(*bits));
                let first = values.next()?;
                let (min, max) = values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
                Some((ScalarValue::Float64(min), ScalarValue::Float64(max)))
            }
            TermSet::Utf8(set) => {
                let min = set.iter().min()?;
                let max = set.iter().max()?;
                Some((ScalarValue::Utf8(min.clone()), ScalarValue::Utf8(max.clone())))
            }
        }
    }

    /// Members as literals of the column domain, for index probes.
    pub(crate) fn to_scalars(&self) -> Vec<ScalarValue> {
        match self {
            TermSet::Bool(set) => set.iter().map(|v| ScalarValue::Boolean(*v)).collect(),
            TermSet::Int(set) => set.iter().map(|v| ScalarValue::Int64(*v)).collect(),
            TermSet::Float(set) => set
                .iter()
                .map(|bits| ScalarValue::Float64(f64::from_bits(*bits)))
                .collect(),
            TermSet::Utf8(set) => set.iter().map(|v| ScalarValue::Utf8(v.clone())).collect(),
        }
    }

    /// Members as primary keys; `None` for domains keys cannot have.
    pub(crate) fn primary_keys(&self) -> Option<Vec<PrimaryKey>> {
        match self {
            TermSet::Int(set) => Some(set.iter().map(|v| PrimaryKey::Int64(*v)).collect()),
            TermSet::Utf8(set) => Some(set.iter().map(|v| PrimaryKey::VarChar(v.clone())).collect()),
            TermSet::Bool(_) | TermSet::Float(_) => None,
        }
    }
}

/// Outcome of probing one stored value against the term sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Membership {
    Match,
    Miss,
    /// The stored value cannot be compared with the literals at all.
    Incompatible,
}

impl Membership {
    fn hit(found: bool) -> Self {
        if found {
            Membership::Match
        } else {
            Membership::Miss
        }
    }
}

/// Term sets built once per node: the primary set in the target domain, plus
/// for numeric targets a widened set in the other numeric domain so values
/// stored with a different numeric subtype (JSON numbers) still compare exactly.
#[derive(Clone, Debug)]
pub(crate) struct TermSets {
    target: ScalarType,
    primary: TermSet,
    widened: Option<TermSet>,
}

impl TermSets {
    /// Builds the sets for a column whose values have type `target`.
    pub(crate) fn build(
        column: &ColumnInfo,
        target: ScalarType,
        values: &[ScalarValue],
    ) -> Result<Self, ExprError> {
        let mut primary = TermSet::empty_for(target);
        for value in values.iter().filter(|value| !value.is_null()) {
            let admitted = fold_literal(target, value).ok_or_else(|| ExprError::TypeMismatch {
                column: column.to_string(),
                expected: column.field_type,
                actual: value.kind(),
            })?;
            match (&mut primary, admitted) {
                (TermSet::Bool(set), Folded::Bool(v)) => {
                    set.insert(v);
                }
                (TermSet::Int(set), Folded::Int(v)) => {
                    set.insert(v);
                }
                (TermSet::Float(set), Folded::Float(v)) => {
                    set.insert(normalized_bits(v));
                }
                (TermSet::Utf8(set), Folded::Utf8(v)) => {
                    set.insert(v);
                }
                (_, Folded::Dropped) => {}
                _ => unreachable!("fold_literal returns values of the target domain"),
            }
        }
        let widened = widen(&primary);
        let sets = Self {
            target,
            primary,
            widened,
        };
        log_debug!(
            component = "term_set",
            event = "term_set_built",
            column = %column,
            target = %target,
            literals = values.len(),
            size = sets.primary.len(),
            widened = sets.widened.as_ref().map_or(0, TermSet::len),
        );
        Ok(sets)
    }

    /// Builds sets for a JSON column, whose stored type varies per row; the
    /// target domain is inferred from the literals.
    pub(crate) fn build_for_json(
        column: &ColumnInfo,
        values: &[ScalarValue],
    ) -> Result<Self, ExprError> {
        let target = infer_json_target(column, values)?;
        Self::build(column, target, values)
    }

    pub(crate) fn primary(&self) -> &TermSet {
        &self.primary
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Probes one JSON value.
    pub(crate) fn probe_json(&self, value: &Value) -> Membership {
        match value {
            Value::Bool(v) if self.target == ScalarType::Bool => {
                Membership::hit(self.primary.contains_bool(*v))
            }
            Value::String(v) if self.target == ScalarType::VarChar => {
                Membership::hit(self.primary.contains_str(v))
            }
            Value::Number(number) if self.target.is_integer() || self.target.is_float() => {
                let widened = self.widened.as_ref();
                if let Some(v) = number.as_i64() {
                    Membership::hit(
                        self.primary.contains_int(v) || widened.is_some_and(|set| set.contains_int(v)),
                    )
                } else if let Some(v) = number.as_f64() {
                    Membership::hit(
                        self.primary.contains_float(v)
                            || widened.is_some_and(|set| set.contains_float(v)),
                    )
                } else {
                    Membership::Miss
                }
            }
            _ => Membership::Incompatible,
        }
    }
}

enum Folded {
    Bool(bool),
    Int(i64),
    Float(f64),
    Utf8(String),
    Dropped,
}

/// Maps a literal into the target domain; `None` on an incompatible kind.
fn fold_literal(target: ScalarType, value: &ScalarValue) -> Option<Folded> {
    match (target, value) {
        (ScalarType::Bool, ScalarValue::Boolean(v)) => Some(Folded::Bool(*v)),
        (ScalarType::VarChar, ScalarValue::Utf8(v)) => Some(Folded::Utf8(v.clone())),
        (ty, ScalarValue::Int64(v)) if ty.is_integer() => {
            let (lo, hi) = ty.integer_range()?;
            Some(if (lo..=hi).contains(v) {
                Folded::Int(*v)
            } else {
                Folded::Dropped
            })
        }
        (ty, ScalarValue::Float64(v)) if ty.is_integer() => {
            let (lo, hi) = ty.integer_range()?;
            Some(match integral_i64(*v) {
                Some(int) if (lo..=hi).contains(&int) => Folded::Int(int),
                _ => Folded::Dropped,
            })
        }
        (ty, ScalarValue::Int64(v)) if ty.is_float() => {
            Some(lossless_f64(*v).map_or(Folded::Dropped, |f| fold_float(ty, f)))
        }
        (ty, ScalarValue::Float64(v)) if ty.is_float() => Some(fold_float(ty, *v)),
        _ => None,
    }
}

fn fold_float(target: ScalarType, value: f64) -> Folded {
    if value.is_nan() {
        return Folded::Dropped;
    }
    if target == ScalarType::Float {
        let narrowed = value as f32;
        if narrowed.is_infinite() && value.is_finite() {
            return Folded::Dropped;
        }
        return Folded::Float(f64::from(narrowed));
    }
    Folded::Float(value)
}

/// The integer equal to `value`, if it is finite, integral and in i64 range.
fn integral_i64(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&value) {
        Some(value as i64)
    } else {
        None
    }
}

/// `value` as f64, if the conversion is exact.
fn lossless_f64(value: i64) -> Option<f64> {
    let converted = value as f64;
    (converted as i128 == i128::from(value)).then_some(converted)
}

fn widen(primary: &TermSet) -> Option<TermSet> {
    match primary {
        TermSet::Int(set) => Some(TermSet::Float(
            set.iter()
                .filter_map(|v| lossless_f64(*v))
                .map(normalized_bits)
                .collect(),
        )),
        TermSet::Float(set) => Some(TermSet::Int(
            set.iter()
                .filter_map(|bits| integral_i64(f64::from_bits(*bits)))
                .collect(),
        )),
        TermSet::Bool(_) | TermSet::Utf8(_) => None,
    }
}

fn infer_json_target(column: &ColumnInfo, values: &[ScalarValue]) -> Result<ScalarType, ExprError> {
    let mut target: Option<ScalarType> = None;
    for value in values.iter().filter(|value| !value.is_null()) {
        let kind = value.kind();
        let next = match (target, kind) {
            (None, ValueKind::Boolean) => ScalarType::Bool,
            (None, ValueKind::Utf8) => ScalarType::VarChar,
            (None, ValueKind::Int64) => ScalarType::Int64,
            (None | Some(ScalarType::Int64), ValueKind::Float64) => ScalarType::Double,
            (Some(ScalarType::Double), ValueKind::Int64 | ValueKind::Float64) => ScalarType::Double,
            (Some(current), _) if scalar_kind(current) == kind => current,
            _ => {
                return Err(ExprError::TypeMismatch {
                    column: column.to_string(),
                    expected: FieldType::Json,
                    actual: kind,
                })
            }
        };
        target = Some(next);
    }
    Ok(target.unwrap_or(ScalarType::Int64))
}

fn scalar_kind(ty: ScalarType) -> ValueKind {
    match ty {
        ScalarType::Bool => ValueKind::Boolean,
        ScalarType::Int8 | ScalarType::Int16 | ScalarType::Int32 | ScalarType::Int64 => {
            ValueKind::Int64
        }
        ScalarType::Float | ScalarType::Double => ValueKind::Float64,
        ScalarType::VarChar => ValueKind::Utf8,
    }
}
