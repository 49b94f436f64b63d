//! Filter conditions and their evaluation.
//!
//! A [`FilterCondition`] is the serializable description of one predicate:
//! a field path, an [`Op`], and its operand(s). Before evaluation it is
//! compiled into a [`CompiledFilter`], which checks that the operand shape
//! fits the operator family and pre-computes anything reusable (folded
//! needles, regexes, date bounds).
//!
//! Evaluation never fails. A null field, a regex that does not compile, a
//! membership test without `values` or a malformed date range all resolve to
//! `false` for that predicate (before `negate` is applied).

use std::borrow::Cow;
use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::clock::{Clock, SystemClock};
use crate::error::{QueryError, Result};
use crate::op::{Op, OpFamily};
use crate::value::{Number, Timestamp, Value};

/// Owned operand stored in a filter condition.
///
/// Unlike [`Value`], which borrows from the record, `FilterValue` owns its
/// data so it can live in query definitions and cache keys. Timestamps
/// serialize as RFC 3339 strings; date operators parse them back.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value.
    String(String),
    /// Numeric value.
    Number(Number),
    /// Timestamp value.
    Timestamp(Timestamp),
    /// Boolean value.
    Bool(bool),
    /// Explicit null.
    Null,
}

impl FilterValue {
    /// Borrows the operand as a [`Value`].
    pub fn as_value(&self) -> Value<'_> {
        match self {
            FilterValue::String(s) => Value::String(s),
            FilterValue::Number(n) => Value::Number(*n),
            FilterValue::Timestamp(t) => Value::Timestamp(*t),
            FilterValue::Bool(b) => Value::Bool(*b),
            FilterValue::Null => Value::None,
        }
    }

    /// Returns `true` for [`FilterValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }

    /// Returns the textual representation, `None` for null.
    pub fn to_text(&self) -> Option<Cow<'_, str>> {
        self.as_value().to_text()
    }

    fn from_json(json: serde_json::Value) -> std::result::Result<Self, String> {
        match json {
            serde_json::Value::Null => Ok(FilterValue::Null),
            serde_json::Value::Bool(b) => Ok(FilterValue::Bool(b)),
            serde_json::Value::String(s) => Ok(FilterValue::String(s)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Number::I64)
                .or_else(|| n.as_u64().map(Number::U64))
                .or_else(|| n.as_f64().map(Number::F64))
                .map(FilterValue::Number)
                .ok_or_else(|| format!("unsupported number {n}")),
            other => Err(format!("filter operands must be scalars, got {other}")),
        }
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FilterValue::String(s) => serializer.serialize_str(s),
            FilterValue::Number(n) => n.serialize(serializer),
            FilterValue::Timestamp(t) => serializer.serialize_str(&t.to_rfc3339()),
            FilterValue::Bool(b) => serializer.serialize_bool(*b),
            FilterValue::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        FilterValue::from_json(json).map_err(D::Error::custom)
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::String(s)
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::String(s.to_string())
    }
}

impl From<Number> for FilterValue {
    fn from(n: Number) -> Self {
        FilterValue::Number(n)
    }
}

impl From<Timestamp> for FilterValue {
    fn from(t: Timestamp) -> Self {
        FilterValue::Timestamp(t)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Bool(b)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FilterValue::Null, Into::into)
    }
}

macro_rules! filter_value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FilterValue {
                fn from(n: $ty) -> Self {
                    FilterValue::Number(Number::from(n))
                }
            }
        )*
    };
}

filter_value_from_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// Optional parts of a filter condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    /// Value list for `in`, `not_in` and `date_between`.
    pub values: Option<Vec<FilterValue>>,
    /// Compare text without lower-casing.
    pub case_sensitive: bool,
    /// Invert the result.
    pub negate: bool,
}

impl FilterOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value list.
    pub fn values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Makes text comparisons case sensitive.
    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }

    /// Inverts the condition.
    pub fn negate(mut self) -> Self {
        self.negate = true;
        self
    }
}

/// A single filter predicate: field path, operator and operand(s).
///
/// # Example
///
/// ```
/// use standout_query::{FilterCondition, Op, Value, Number};
///
/// let cond = FilterCondition::new("score", Op::Gte, 5);
/// assert!(cond.evaluate(&Value::Number(Number::I64(7))));
/// assert!(!cond.evaluate(&Value::None));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    /// Dot-delimited field path.
    pub field: String,
    /// The operator.
    pub operator: Op,
    /// Single operand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
    /// Operand list for membership and date-range operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<FilterValue>>,
    /// Compare text without lower-casing.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Invert the result after evaluation.
    #[serde(default)]
    pub negate: bool,
}

impl FilterCondition {
    /// Creates a condition with a single operand.
    pub fn new(field: impl Into<String>, operator: Op, value: impl Into<FilterValue>) -> Self {
        FilterCondition {
            field: field.into(),
            operator,
            value: Some(value.into()),
            values: None,
            case_sensitive: false,
            negate: false,
        }
    }

    /// Creates a condition without operands (`is_null`, `is_not_null`).
    pub fn unary(field: impl Into<String>, operator: Op) -> Self {
        FilterCondition {
            field: field.into(),
            operator,
            value: None,
            values: None,
            case_sensitive: false,
            negate: false,
        }
    }

    /// Creates a condition over a value list (`in`, `not_in`, `date_between`).
    pub fn list<I, V>(field: impl Into<String>, operator: Op, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        Self::unary(field, operator).with_options(FilterOptions::new().values(values))
    }

    /// Applies optional settings.
    pub fn with_options(mut self, options: FilterOptions) -> Self {
        if options.values.is_some() {
            self.values = options.values;
        }
        self.case_sensitive = options.case_sensitive;
        self.negate = options.negate;
        self
    }

    /// Evaluates this condition against a field value, using the system clock
    /// for `date_within_days`.
    ///
    /// A condition that fails validation evaluates to `false`.
    pub fn evaluate(&self, field_value: &Value<'_>) -> bool {
        self.compile(SystemClock.now())
            .map(|compiled| compiled.matches(field_value))
            .unwrap_or(false)
    }

    /// Validates the operand shape and builds the evaluator.
    ///
    /// `now` anchors `date_within_days`.
    pub fn compile(&self, now: Timestamp) -> Result<CompiledFilter> {
        if self.field.trim().is_empty() {
            return Err(self.invalid("field path is empty"));
        }

        let op = self.operator;
        let case_sensitive = self.case_sensitive;
        let predicate = match op.family() {
            OpFamily::Nullness => Predicate::Nullness {
                null: op == Op::IsNull,
            },
            OpFamily::Equality => Predicate::Equality {
                operand: self.require_value()?.clone(),
                equal: op == Op::Eq,
            },
            OpFamily::Comparison => {
                let operand = self.require_value()?;
                if operand.is_null() {
                    return Err(self.invalid("cannot order against null"));
                }
                Predicate::Comparison {
                    op,
                    operand: operand.clone(),
                }
            }
            OpFamily::Text => Predicate::Text {
                op,
                needle: fold_case(&self.require_text()?, case_sensitive),
                case_sensitive,
            },
            OpFamily::Membership => Predicate::Membership {
                values: self.values.clone(),
                member: op == Op::In,
            },
            OpFamily::Date if op == Op::DateBetween => Predicate::DateBetween(self.date_bounds()),
            OpFamily::Date => Predicate::DateWithinDays {
                days: self.require_days()?,
                now,
            },
            OpFamily::Pattern => {
                let pattern = self.require_text()?;
                let regex = RegexBuilder::new(&pattern)
                    .case_insensitive(!case_sensitive)
                    .build();
                if let Err(err) = &regex {
                    tracing::debug!(field = %self.field, %err, "regex filter does not compile, matching nothing");
                }
                Predicate::Pattern(regex.ok())
            }
            OpFamily::Search => Predicate::Search(search_terms(&self.require_text()?)),
        };

        Ok(CompiledFilter {
            field: self.field.clone(),
            predicate,
            negate: self.negate,
        })
    }

    fn invalid(&self, reason: impl Into<String>) -> QueryError {
        QueryError::filter(&self.field, self.operator.as_str(), reason)
    }

    fn require_value(&self) -> Result<&FilterValue> {
        self.value
            .as_ref()
            .ok_or_else(|| self.invalid("operator requires a value"))
    }

    fn require_text(&self) -> Result<String> {
        self.require_value()?
            .to_text()
            .map(Cow::into_owned)
            .ok_or_else(|| self.invalid("operator requires a non-null value"))
    }

    fn require_days(&self) -> Result<f64> {
        let days = match self.require_value()? {
            FilterValue::Number(n) => n.to_f64(),
            FilterValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.invalid(format!("'{s}' is not a number of days")))?,
            other => {
                return Err(self.invalid(format!("{other:?} is not a number of days")));
            }
        };
        if !days.is_finite() || days < 0.0 {
            return Err(self.invalid(format!("{days} is not a number of days")));
        }
        Ok(days)
    }

    fn date_bounds(&self) -> Option<(Timestamp, Timestamp)> {
        match self.values.as_deref() {
            Some([start, end]) => Some((
                start.as_value().as_timestamp()?,
                end.as_value().as_timestamp()?,
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Predicate {
    Equality { operand: FilterValue, equal: bool },
    Comparison { op: Op, operand: FilterValue },
    Text {
        op: Op,
        needle: String,
        case_sensitive: bool,
    },
    Membership {
        values: Option<Vec<FilterValue>>,
        member: bool,
    },
    Nullness { null: bool },
    DateBetween(Option<(Timestamp, Timestamp)>),
    DateWithinDays { days: f64, now: Timestamp },
    Pattern(Option<Regex>),
    Search(Vec<String>),
}

impl Predicate {
    fn eval(&self, value: &Value<'_>) -> bool {
        match self {
            Predicate::Nullness { null } => value.is_none() == *null,
            _ if value.is_none() => false,
            Predicate::Equality { operand, equal } => {
                (loose_compare(value, operand) == Some(Ordering::Equal)) == *equal
            }
            Predicate::Comparison { op, operand } => {
                loose_compare(value, operand).is_some_and(|ordering| op.eval_ordering(ordering))
            }
            Predicate::Text {
                op,
                needle,
                case_sensitive,
            } => {
                let Some(text) = value.to_text() else {
                    return false;
                };
                let haystack = fold_case(&text, *case_sensitive);
                match op {
                    Op::Contains => haystack.contains(needle.as_str()),
                    Op::StartsWith => haystack.starts_with(needle.as_str()),
                    Op::EndsWith => haystack.ends_with(needle.as_str()),
                    _ => false,
                }
            }
            Predicate::Membership { values, member } => match values {
                None => !member,
                Some(values) => {
                    let found = values
                        .iter()
                        .any(|v| loose_compare(value, v) == Some(Ordering::Equal));
                    found == *member
                }
            },
            Predicate::DateBetween(bounds) => match (bounds, value.as_timestamp()) {
                (Some((start, end)), Some(ts)) => *start <= ts && ts <= *end,
                _ => false,
            },
            Predicate::DateWithinDays { days, now } => value
                .as_timestamp()
                .is_some_and(|ts| ts.days_between(*now) <= *days),
            Predicate::Pattern(regex) => match (regex, value.to_text()) {
                (Some(regex), Some(text)) => regex.is_match(&text),
                _ => false,
            },
            Predicate::Search(terms) => value.to_text().is_some_and(|text| {
                let haystack = text.to_lowercase();
                terms.iter().all(|term| haystack.contains(term.as_str()))
            }),
        }
    }
}

/// A validated filter condition, ready to evaluate.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    field: String,
    predicate: Predicate,
    negate: bool,
}

impl CompiledFilter {
    /// The field path this filter reads.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Evaluates the filter against a field value, applying `negate` last.
    pub fn matches(&self, field_value: &Value<'_>) -> bool {
        self.predicate.eval(field_value) != self.negate
    }

    /// Evaluates the filter against a record through an accessor.
    pub fn matches_record<T, F>(&self, item: &T, accessor: &F) -> bool
    where
        for<'a> F: Fn(&'a T, &str) -> Value<'a>,
    {
        self.matches(&accessor(item, &self.field))
    }
}

/// Compiles every condition, failing on the first invalid one.
pub fn compile_filters(filters: &[FilterCondition], now: Timestamp) -> Result<Vec<CompiledFilter>> {
    filters.iter().map(|f| f.compile(now)).collect()
}

/// Returns the items for which every condition holds (AND semantics).
///
/// An empty condition list keeps every item. Input order is preserved.
pub fn filter_records<'a, T, F>(
    items: &'a [T],
    filters: &[FilterCondition],
    accessor: F,
) -> Result<Vec<&'a T>>
where
    for<'b> F: Fn(&'b T, &str) -> Value<'b>,
{
    let compiled = compile_filters(filters, SystemClock.now())?;
    Ok(items
        .iter()
        .filter(|item| compiled.iter().all(|f| f.matches_record(*item, &accessor)))
        .collect())
}

/// Compares a field value with an operand, coercing comparable types.
///
/// Numbers compare numerically (numeric strings included), timestamps by
/// instant (date strings and epoch-millisecond numbers included), strings
/// and booleans natively. Anything else is incomparable.
pub(crate) fn loose_compare(field: &Value<'_>, operand: &FilterValue) -> Option<Ordering> {
    match (field, operand) {
        (_, FilterValue::Null) | (Value::None, _) => None,
        (Value::Number(a), FilterValue::Number(b)) => a.compare(*b),
        (Value::String(a), FilterValue::String(b)) => Some((*a).cmp(b.as_str())),
        (Value::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
        (Value::Timestamp(_), _) | (_, FilterValue::Timestamp(_)) => {
            Some(field.as_timestamp()?.cmp(&operand.as_value().as_timestamp()?))
        }
        (Value::Number(a), FilterValue::String(b)) => a.compare(Number::F64(b.trim().parse().ok()?)),
        (Value::String(a), FilterValue::Number(b)) => Number::F64(a.trim().parse().ok()?).compare(*b),
        _ => None,
    }
}

fn fold_case(text: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

/// Splits a query into lower-cased, whitespace-separated terms.
pub(crate) fn search_terms(query: &str) -> Vec<String> {
    query.split_whitespace().map(str::to_lowercase).collect()
}
