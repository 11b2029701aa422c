//! Segment skipping from column statistics.

use std::cmp::Ordering;

use super::set::TermSet;
use crate::segment::{ColumnStats, SegmentKind};

/// Returns true when no row of the segment can be in `terms`.
///
/// Only sealed segments carry final statistics. Anything that cannot be
/// decided from the statistics (missing bounds, NaN bounds, incomparable
/// kinds, boolean sets) keeps the segment.
pub(crate) fn cannot_match(
    kind: SegmentKind,
    stats: Option<&ColumnStats>,
    terms: &TermSet,
) -> bool {
    if kind != SegmentKind::Sealed {
        return false;
    }
    let Some(stats) = stats else {
        return false;
    };
    if stats.all_null() {
        return true;
    }
    let Some((lo, hi)) = terms.bounds() else {
        return false;
    };
    let (Some(min), Some(max)) = (&stats.min, &stats.max) else {
        return false;
    };
    if min.is_nan() || max.is_nan() {
        return false;
    }
    hi.compare(min) == Some(Ordering::Less) || lo.compare(max) == Some(Ordering::Greater)
}
