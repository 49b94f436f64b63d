//! Filter operators.
//!
//! The [`Op`] enum is the closed set of operators a filter condition can use.
//! Each operator belongs to an [`OpFamily`], which decides the operand shape
//! the condition must carry.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Comparison operator for a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Op {
    // Equality
    /// Equal.
    Eq,
    /// Not equal.
    Ne,

    // Comparison
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,

    // String
    /// Field text contains the operand.
    Contains,
    /// Field text starts with the operand.
    StartsWith,
    /// Field text ends with the operand.
    EndsWith,

    // Membership
    /// Field equals one of `values`.
    In,
    /// Field equals none of `values`.
    NotIn,

    // Nullness
    /// Field is absent or null.
    IsNull,
    /// Field is present and not null.
    IsNotNull,

    // Date
    /// Field date lies within the two dates in `values` (inclusive).
    DateBetween,
    /// Field date is at most `value` days away from now.
    DateWithinDays,

    // Pattern
    /// Field text matches the regular expression in `value`.
    Regex,

    // Search
    /// Every whitespace-separated term of `value` occurs in the field text.
    Search,
}

/// Operator family, determining which operand a condition needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpFamily {
    /// `Eq`, `Ne`: a single value.
    Equality,
    /// `Gt`, `Gte`, `Lt`, `Lte`: a single, non-null value.
    Comparison,
    /// `Contains`, `StartsWith`, `EndsWith`: a single value read as text.
    Text,
    /// `In`, `NotIn`: a value list.
    Membership,
    /// `IsNull`, `IsNotNull`: no operand.
    Nullness,
    /// `DateBetween` (two values) and `DateWithinDays` (a number of days).
    Date,
    /// `Regex`: a pattern.
    Pattern,
    /// `Search`: a term string.
    Search,
}

impl Op {
    /// Every operator, in declaration order.
    pub const ALL: [Op; 17] = [
        Op::Eq,
        Op::Ne,
        Op::Gt,
        Op::Gte,
        Op::Lt,
        Op::Lte,
        Op::Contains,
        Op::StartsWith,
        Op::EndsWith,
        Op::In,
        Op::NotIn,
        Op::IsNull,
        Op::IsNotNull,
        Op::DateBetween,
        Op::DateWithinDays,
        Op::Regex,
        Op::Search,
    ];

    /// Returns the family this operator belongs to.
    pub fn family(self) -> OpFamily {
        match self {
            Op::Eq | Op::Ne => OpFamily::Equality,
            Op::Gt | Op::Gte | Op::Lt | Op::Lte => OpFamily::Comparison,
            Op::Contains | Op::StartsWith | Op::EndsWith => OpFamily::Text,
            Op::In | Op::NotIn => OpFamily::Membership,
            Op::IsNull | Op::IsNotNull => OpFamily::Nullness,
            Op::DateBetween | Op::DateWithinDays => OpFamily::Date,
            Op::Regex => OpFamily::Pattern,
            Op::Search => OpFamily::Search,
        }
    }

    /// Evaluates an ordering-based operator given the result of comparing
    /// the field value with the operand.
    pub fn eval_ordering(self, ordering: Ordering) -> bool {
        match self {
            Op::Eq => ordering == Ordering::Equal,
            Op::Ne => ordering != Ordering::Equal,
            Op::Gt => ordering == Ordering::Greater,
            Op::Gte => ordering != Ordering::Less,
            Op::Lt => ordering == Ordering::Less,
            Op::Lte => ordering != Ordering::Greater,
            _ => false,
        }
    }

    /// Returns the wire name of this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::Gt => "gt",
            Op::Gte => "gte",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::Contains => "contains",
            Op::StartsWith => "starts_with",
            Op::EndsWith => "ends_with",
            Op::In => "in",
            Op::NotIn => "not_in",
            Op::IsNull => "is_null",
            Op::IsNotNull => "is_not_null",
            Op::DateBetween => "date_between",
            Op::DateWithinDays => "date_within_days",
            Op::Regex => "regex",
            Op::Search => "search",
        }
    }
}

impl FromStr for Op {
    type Err = QueryError;

    /// Parses a wire name. Long-form aliases (`equals`, `greater_than`, ...)
    /// are accepted too; matching ignores ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.to_ascii_lowercase().as_str() {
            "eq" | "equals" => Op::Eq,
            "ne" | "not_equals" => Op::Ne,
            "gt" | "greater_than" => Op::Gt,
            "gte" | "greater_than_or_equal" => Op::Gte,
            "lt" | "less_than" => Op::Lt,
            "lte" | "less_than_or_equal" => Op::Lte,
            "contains" => Op::Contains,
            "starts_with" | "startswith" => Op::StartsWith,
            "ends_with" | "endswith" => Op::EndsWith,
            "in" => Op::In,
            "not_in" | "nin" => Op::NotIn,
            "is_null" => Op::IsNull,
            "is_not_null" => Op::IsNotNull,
            "date_between" | "date_range" => Op::DateBetween,
            "date_within_days" | "date_within" => Op::DateWithinDays,
            "regex" => Op::Regex,
            "search" | "full_text" => Op::Search,
            _ => return Err(QueryError::UnknownOperator(s.to_string())),
        };
        Ok(op)
    }
}

impl TryFrom<String> for Op {
    type Error = QueryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Op> for &'static str {
    fn from(op: Op) -> Self {
        op.as_str()
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_families() {
        assert_eq!(Op::Eq.family(), OpFamily::Equality);
        assert_eq!(Op::Lte.family(), OpFamily::Comparison);
        assert_eq!(Op::EndsWith.family(), OpFamily::Text);
        assert_eq!(Op::NotIn.family(), OpFamily::Membership);
        assert_eq!(Op::IsNull.family(), OpFamily::Nullness);
        assert_eq!(Op::DateWithinDays.family(), OpFamily::Date);
        assert_eq!(Op::Regex.family(), OpFamily::Pattern);
        assert_eq!(Op::Search.family(), OpFamily::Search);
    }

    #[test]
    fn op_eval_ordering() {
        assert!(Op::Eq.eval_ordering(Ordering::Equal));
        assert!(!Op::Eq.eval_ordering(Ordering::Less));
        assert!(Op::Ne.eval_ordering(Ordering::Greater));
        assert!(Op::Gte.eval_ordering(Ordering::Equal));
        assert!(!Op::Gt.eval_ordering(Ordering::Equal));
        assert!(Op::Lt.eval_ordering(Ordering::Less));
        assert!(!Op::Lte.eval_ordering(Ordering::Greater));
        assert!(!Op::Contains.eval_ordering(Ordering::Equal));
    }

    #[test]
    fn op_names_round_trip() {
        for op in Op::ALL {
            assert_eq!(op.as_str().parse::<Op>().unwrap(), op);
        }
    }

    #[test]
    fn op_aliases() {
        assert_eq!("EQUALS".parse::<Op>().unwrap(), Op::Eq);
        assert_eq!("greater_than".parse::<Op>().unwrap(), Op::Gt);
        assert_eq!("date_range".parse::<Op>().unwrap(), Op::DateBetween);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = "like".parse::<Op>().unwrap_err();
        assert!(matches!(err, QueryError::UnknownOperator(ref name) if name == "like"));
    }

    #[test]
    fn op_serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&Op::StartsWith).unwrap(),
            "\"starts_with\""
        );
        let op: Op = serde_json::from_str("\"not_in\"").unwrap();
        assert_eq!(op, Op::NotIn);
        assert!(serde_json::from_str::<Op>("\"bogus\"").is_err());
    }
}
