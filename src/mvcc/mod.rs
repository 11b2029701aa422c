//! MVCC primitives consumed by term evaluation (read timestamps and consistency levels).

use std::fmt;

/// Logical timestamp a query reads at.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Least possible timestamp.
    pub const MIN: Self = Self(0);
    /// Greatest possible timestamp (sees every committed write).
    pub const MAX: Self = Self(u64::MAX);

    /// Construct a timestamp from a raw `u64`.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw `u64` value backing this timestamp.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Timestamp").field(&self.0).finish()
    }
}

/// Visibility guarantee a query is evaluated under.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConsistencyLevel {
    /// Every write committed before the query is visible.
    Strong,
    /// Writes issued by the same session are visible.
    Session,
    /// Reads may lag behind writes by a bounded interval.
    #[default]
    Bounded,
    /// Reads see whatever the segment holds when the query starts.
    Eventually,
    /// Caller-supplied guarantee timestamp.
    Customized,
}

impl ConsistencyLevel {
    /// Returns true when the visible rows of a segment cannot change for the
    /// lifetime of a query, so a full-segment result may be computed once and
    /// reused for every batch.
    #[must_use]
    pub fn allows_result_cache(self) -> bool {
        matches!(self, ConsistencyLevel::Eventually)
    }

    /// Returns a textual representation of the level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConsistencyLevel::Strong => "strong",
            ConsistencyLevel::Session => "session",
            ConsistencyLevel::Bounded => "bounded",
            ConsistencyLevel::Eventually => "eventually",
            ConsistencyLevel::Customized => "customized",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
