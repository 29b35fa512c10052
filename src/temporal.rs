//! Inclusive date-range predicate shared by both indexes and the fusion step.

use crate::error::Error;
use crate::filter::{FilterOp, FilterValue, MetadataFilter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An inclusive `[start, end]` window over document timestamps.
///
/// Construction validates the bounds; an inverted range fails fast with a
/// validation error and is never silently swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    /// Creates a range. Fails with [`Error::Validation`] when `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, Error> {
        if start > end {
            return Err(Error::Validation(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Inclusive lower bound.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Inclusive upper bound.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `ts` falls inside the window. Both bounds are inclusive.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Lowers the range to metadata predicates for the vector side, so the
    /// same window is applied without a join back to the lexical store.
    pub fn to_filter(&self) -> MetadataFilter {
        MetadataFilter::new()
            .and(
                "timestamp",
                FilterOp::Gte,
                FilterValue::Timestamp(self.start),
            )
            .and("timestamp", FilterOp::Lte, FilterValue::Timestamp(self.end))
    }
}
