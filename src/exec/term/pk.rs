//! Primary-key fast path: literals resolve straight to row offsets.

use super::set::TermSet;
use crate::{
    mvcc::Timestamp,
    observability::log_debug,
    query::ColumnInfo,
    segment::Segment,
};

/// Sorted, deduplicated offsets of the active rows whose key is in `terms`.
///
/// `None` when the term domain cannot hold primary keys.
pub(crate) fn resolve_offsets(
    column: &ColumnInfo,
    segment: &dyn Segment,
    terms: &TermSet,
    active_count: usize,
    read_ts: Timestamp,
) -> Option<Vec<usize>> {
    let keys = terms.primary_keys()?;
    let mut offsets = segment.lookup_primary_keys(&keys, read_ts);
    offsets.retain(|offset| *offset < active_count);
    offsets.sort_unstable();
    offsets.dedup();
    log_debug!(
        component = "pk",
        event = "pk_offsets_resolved",
        column = %column,
        keys = keys.len(),
        matches = offsets.len(),
        read_ts = read_ts.get(),
    );
    Some(offsets)
}
