//! Error types for the query crate.

use thiserror::Error;

/// Error type returned by asynchronous data sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when executing a query.
///
/// Validation variants are raised before any record is touched and carry the
/// offending field, operator or value so a caller can report them. Use
/// [`QueryError::is_validation`] to tell a bad request apart from a failure
/// while loading data.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Pagination configuration is malformed (`page < 1`, `limit == 0`).
    #[error("invalid pagination: {field} = {value} ({reason})")]
    InvalidPagination {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    /// Operator name not recognized.
    #[error("unknown filter operator '{0}'")]
    UnknownOperator(String),

    /// A filter condition is missing a required operand or has an operand of the wrong shape.
    #[error("invalid filter on '{field}' with operator '{op}': {reason}")]
    InvalidFilter {
        field: String,
        op: &'static str,
        reason: String,
    },

    /// A sort condition names no field.
    #[error("invalid sort condition at position {index}: {reason}")]
    InvalidSort { index: usize, reason: &'static str },

    /// Search configuration is malformed.
    #[error("invalid search: {0}")]
    InvalidSearch(String),

    /// Cursor token could not be decoded.
    #[error("invalid cursor '{0}'")]
    InvalidCursor(String),

    /// The data source failed to produce records.
    #[error(transparent)]
    Source(BoxError),
}

impl QueryError {
    /// Create a filter validation error.
    pub fn filter(field: impl Into<String>, op: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            field: field.into(),
            op,
            reason: reason.into(),
        }
    }

    /// Create a pagination validation error.
    pub fn pagination(field: &'static str, value: impl ToString, reason: &'static str) -> Self {
        Self::InvalidPagination {
            field,
            value: value.to_string(),
            reason,
        }
    }

    /// Returns `true` for errors caused by a malformed query rather than by execution.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Source(_))
    }
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
