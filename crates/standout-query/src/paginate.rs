//! Offset and cursor pagination.
//!
//! Both strategies slice an already filtered and sorted sequence. Cursor
//! tokens are opaque to callers, but they currently encode a plain offset
//! into that sequence rather than a stable row key: if the backing
//! collection changes between calls, a cursor can skip or repeat rows.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// Default page size.
pub const DEFAULT_LIMIT: usize = 20;

const CURSOR_PREFIX: &str = "o1:";

/// Pagination strategy and parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PaginationConfig {
    /// Page-number pagination, pages start at 1.
    Offset {
        page: usize,
        limit: usize,
        /// Caller-side total hint; the engine always reports the filtered count.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        total: Option<usize>,
    },
    /// Token pagination. No cursor means the first page.
    Cursor {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<String>,
        limit: usize,
    },
}

impl Default for PaginationConfig {
    fn default() -> Self {
        PaginationConfig::Offset {
            page: 1,
            limit: DEFAULT_LIMIT,
            total: None,
        }
    }
}

impl PaginationConfig {
    /// Offset pagination at `page` with `limit` items per page.
    pub fn offset(page: usize, limit: usize) -> Self {
        PaginationConfig::Offset {
            page,
            limit,
            total: None,
        }
    }

    /// Cursor pagination starting at `cursor`.
    pub fn cursor(cursor: Option<String>, limit: usize) -> Self {
        PaginationConfig::Cursor { cursor, limit }
    }

    /// Returns the page size.
    pub fn limit(&self) -> usize {
        match self {
            PaginationConfig::Offset { limit, .. } | PaginationConfig::Cursor { limit, .. } => *limit,
        }
    }

    /// Returns the strategy.
    pub fn kind(&self) -> PaginationType {
        match self {
            PaginationConfig::Offset { .. } => PaginationType::Offset,
            PaginationConfig::Cursor { .. } => PaginationType::Cursor,
        }
    }

    /// Checks the parameters and resolves the start offset.
    pub fn start_offset(&self) -> Result<usize> {
        if self.limit() == 0 {
            return Err(QueryError::pagination("limit", 0, "must be greater than zero"));
        }
        match self {
            PaginationConfig::Offset { page: 0, .. } => {
                Err(QueryError::pagination("page", 0, "must be at least 1"))
            }
            PaginationConfig::Offset { page, limit, .. } => Ok((page - 1).saturating_mul(*limit)),
            PaginationConfig::Cursor { cursor: None, .. } => Ok(0),
            PaginationConfig::Cursor {
                cursor: Some(token), ..
            } => decode_cursor(token),
        }
    }
}

/// Pagination strategy tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationType {
    Offset,
    Cursor,
}

/// Pagination metadata reported with a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    #[serde(rename = "type")]
    pub kind: PaginationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<usize>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_cursor: Option<String>,
    pub limit: usize,
}

/// One page of items and its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub info: PaginationInfo,
}

/// Slices `items` according to `config`.
///
/// # Example
///
/// ```
/// use standout_query::{paginate, PaginationConfig};
///
/// let items: Vec<u32> = (1..=23).collect();
/// let page = paginate(items, &PaginationConfig::offset(3, 10)).unwrap();
/// assert_eq!(page.items, vec![21, 22, 23]);
/// assert_eq!(page.info.total_pages, Some(3));
/// assert!(!page.info.has_next_page);
/// ```
pub fn paginate<T>(items: Vec<T>, config: &PaginationConfig) -> Result<Page<T>> {
    let start = config.start_offset()?;
    let limit = config.limit();
    let total = items.len();
    let end = start.saturating_add(limit);
    let has_next_page = end < total;

    let page_items: Vec<T> = items.into_iter().skip(start).take(limit).collect();

    let info = match config {
        PaginationConfig::Offset { page, .. } => PaginationInfo {
            kind: PaginationType::Offset,
            current_page: Some(*page),
            total_pages: Some(total.div_ceil(limit)),
            total_items: Some(total),
            has_next_page,
            has_previous_page: *page > 1,
            next_cursor: None,
            previous_cursor: None,
            limit,
        },
        PaginationConfig::Cursor { .. } => PaginationInfo {
            kind: PaginationType::Cursor,
            current_page: None,
            total_pages: None,
            total_items: Some(total),
            has_next_page,
            has_previous_page: start > 0,
            next_cursor: has_next_page.then(|| encode_cursor(end)),
            previous_cursor: (start > 0).then(|| encode_cursor(start.saturating_sub(limit))),
            limit,
        },
    };

    Ok(Page {
        items: page_items,
        info,
    })
}

/// Encodes an offset as a cursor token.
pub fn encode_cursor(offset: usize) -> String {
    URL_SAFE_NO_PAD.encode(format!("{CURSOR_PREFIX}{offset}"))
}

/// Decodes a cursor token back to an offset.
pub fn decode_cursor(token: &str) -> Result<usize> {
    URL_SAFE_NO_PAD
        .decode(token.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|text| text.strip_prefix(CURSOR_PREFIX)?.parse::<usize>().ok())
        .ok_or_else(|| QueryError::InvalidCursor(token.to_string()))
}
