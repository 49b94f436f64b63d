//! Ready-made conditions for common list screens.
//!
//! ```
//! use standout_query::{presets, DataQuery};
//!
//! let mut builder = DataQuery::builder();
//! builder
//!     .condition(presets::status_in("status", ["open", "blocked"]))
//!     .condition(presets::within_days("updatedAt", 30))
//!     .sort_by(presets::newest_first("updatedAt"));
//! assert_eq!(builder.build().filters.len(), 2);
//! ```

use crate::filter::{FilterCondition, FilterValue};
use crate::op::Op;
use crate::sort::SortCondition;

/// Case-insensitive substring match.
pub fn text_contains(field: &str, text: &str) -> FilterCondition {
    FilterCondition::new(field, Op::Contains, text)
}

/// Inclusive date range. Bounds may be timestamps or date strings.
pub fn date_range(
    field: &str,
    start: impl Into<FilterValue>,
    end: impl Into<FilterValue>,
) -> FilterCondition {
    FilterCondition::list(field, Op::DateBetween, [start.into(), end.into()])
}

/// Dates no further than `days` from now, in either direction.
pub fn within_days(field: &str, days: u32) -> FilterCondition {
    FilterCondition::new(field, Op::DateWithinDays, days)
}

/// Membership in a set of statuses.
pub fn status_in<I, S>(field: &str, statuses: I) -> FilterCondition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    FilterCondition::list(field, Op::In, statuses.into_iter().map(Into::<String>::into))
}

/// Latest first.
pub fn newest_first(field: &str) -> SortCondition {
    SortCondition::desc(field)
}

/// Earliest first.
pub fn oldest_first(field: &str) -> SortCondition {
    SortCondition::asc(field)
}

/// A to Z.
pub fn alphabetical(field: &str) -> SortCondition {
    SortCondition::asc(field)
}
