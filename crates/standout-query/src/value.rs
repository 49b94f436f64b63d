//! Runtime value types for field comparison.
//!
//! The [`Value`] enum represents the runtime value of a field extracted from a
//! record. [`Number`] and [`Timestamp`] are the numeric and temporal scalars
//! shared by record values and filter operands.

use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Runtime value of a record field, borrowed from the source record.
///
/// Accessors return `Value::None` for fields that are absent or null; the
/// filter and sort stages treat both the same way.
///
/// # Example
///
/// ```
/// use standout_query::{Value, Number};
///
/// struct Task {
///     name: String,
///     priority: u8,
/// }
///
/// fn accessor<'a>(task: &'a Task, field: &str) -> Value<'a> {
///     match field {
///         "name" => Value::String(&task.name),
///         "priority" => Value::Number(Number::U64(task.priority as u64)),
///         _ => Value::None,
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// String value (borrowed).
    String(&'a str),
    /// Numeric value.
    Number(Number),
    /// Timestamp value (milliseconds since Unix epoch).
    Timestamp(Timestamp),
    /// Boolean value.
    Bool(bool),
    /// Field absent, null, or not a scalar.
    None,
}

impl<'a> Value<'a> {
    /// Returns `true` if this is a `None` value.
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Extracts the string value, if present.
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extracts the number value, if present.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extracts the boolean value, if present.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Interprets the value as a point in time.
    ///
    /// Timestamps are returned as-is, numbers are read as epoch milliseconds
    /// and strings are parsed with [`Timestamp::parse`].
    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(t) => Some(*t),
            Value::Number(n) => Some(Timestamp(n.to_f64() as i64)),
            Value::String(s) => Timestamp::parse(s),
            _ => None,
        }
    }

    /// Returns the default textual representation of the value.
    ///
    /// `None` has no text.
    pub fn to_text(&self) -> Option<Cow<'a, str>> {
        match self {
            Value::String(s) => Some(Cow::Borrowed(s)),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Timestamp(t) => Some(Cow::Owned(t.to_rfc3339())),
            Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
            Value::None => None,
        }
    }
}

/// Numeric value supporting all common numeric types.
///
/// Comparisons between different variants convert to `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// 64-bit floating point.
    F64(f64),
}

impl Number {
    /// Converts the number to f64 for comparison.
    pub fn to_f64(self) -> f64 {
        match self {
            Number::I64(n) => n as f64,
            Number::U64(n) => n as f64,
            Number::F64(n) => n,
        }
    }

    /// Compares two numbers, handling mixed types.
    ///
    /// Returns `None` when either side is NaN.
    pub fn compare(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::I64(a), Number::I64(b)) => Some(a.cmp(&b)),
            (Number::U64(a), Number::U64(b)) => Some(a.cmp(&b)),
            (Number::F64(a), Number::F64(b)) => a.partial_cmp(&b),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(*other)
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::I64(n) => write!(f, "{n}"),
            Number::U64(n) => write!(f, "{n}"),
            Number::F64(n) => write!(f, "{n}"),
        }
    }
}

macro_rules! number_from {
    ($variant:ident: $($ty:ty),*) => {
        $(
            impl From<$ty> for Number {
                fn from(n: $ty) -> Self {
                    Number::$variant(n as _)
                }
            }
        )*
    };
}

number_from!(I64: i8, i16, i32, i64, isize);
number_from!(U64: u8, u16, u32, u64, usize);
number_from!(F64: f32, f64);

/// Timestamp value represented as milliseconds since Unix epoch.
///
/// ```
/// use standout_query::Timestamp;
///
/// let ts = Timestamp::parse("2024-01-29").unwrap();
/// assert_eq!(ts, Timestamp::from_secs(1_706_486_400));
/// assert!(Timestamp(1000) < Timestamp(2000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub i64);

/// Milliseconds in one day.
pub(crate) const MILLIS_PER_DAY: f64 = 86_400_000.0;

impl Timestamp {
    /// Creates a new timestamp from milliseconds since Unix epoch.
    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis)
    }

    /// Creates a new timestamp from seconds since Unix epoch.
    pub fn from_secs(secs: i64) -> Self {
        Timestamp(secs * 1000)
    }

    /// Returns the timestamp as milliseconds since Unix epoch.
    pub fn as_millis(self) -> i64 {
        self.0
    }

    /// Parses a date or date-time string.
    ///
    /// Accepts RFC 3339 (`2024-01-29T10:00:00Z`), naive date-times
    /// (`2024-01-29 10:00:00`, `2024-01-29T10:00:00`, read as UTC) and plain
    /// dates (`2024-01-29`, midnight UTC).
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Some(Timestamp(dt.timestamp_millis()));
        }
        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
                return Some(Timestamp(naive.and_utc().timestamp_millis()));
            }
        }
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Timestamp(naive.and_utc().timestamp_millis()))
    }

    /// Formats the timestamp as an RFC 3339 string in UTC.
    pub fn to_rfc3339(self) -> String {
        match DateTime::<Utc>::from_timestamp_millis(self.0) {
            Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => self.0.to_string(),
        }
    }

    /// Absolute distance to `other`, in (fractional) days.
    pub fn days_between(self, other: Timestamp) -> f64 {
        self.0.abs_diff(other.0) as f64 / MILLIS_PER_DAY
    }
}

impl From<i64> for Timestamp {
    fn from(millis: i64) -> Self {
        Timestamp(millis)
    }
}

impl<Tz: chrono::TimeZone> From<DateTime<Tz>> for Timestamp {
    fn from(dt: DateTime<Tz>) -> Self {
        Timestamp(dt.timestamp_millis())
    }
}
