//! Standout Query - filtering, search, sorting, pagination and result caching
//! for record collections.
//!
//! A [`DataQuery`] describes what a list view wants: filter conditions, sort
//! keys, a page and an optional text search. A [`QueryEngine`] runs it
//! against in-memory records or an async loader and returns a
//! [`PaginatedResponse`], caching pages under a canonical key so that equal
//! queries built in different ways share an entry.
//!
//! # Quick Start
//!
//! ```rust
//! use futures::executor::block_on;
//! use standout_query::{Dir, Number, Op, QueryBuilder, QueryEngine, QueryOptions, Record, Value};
//!
//! #[derive(Clone)]
//! struct Player {
//!     name: String,
//!     score: i64,
//! }
//!
//! impl Record for Player {
//!     fn field_value(&self, field: &str) -> Value<'_> {
//!         match field {
//!             "name" => Value::String(&self.name),
//!             "score" => Value::Number(Number::I64(self.score)),
//!             _ => Value::None,
//!         }
//!     }
//! }
//!
//! let players = vec![
//!     Player { name: "Bob".into(), score: 5 },
//!     Player { name: "Amy".into(), score: 9 },
//!     Player { name: "Zoe".into(), score: 2 },
//! ];
//!
//! let mut builder = QueryBuilder::new();
//! builder
//!     .filter("score", Op::Gte, 5)
//!     .sort("score", Dir::Desc, None)
//!     .limit(10);
//!
//! let engine = QueryEngine::new();
//! let page = block_on(engine.query(&players, &builder.build(), QueryOptions::default())).unwrap();
//!
//! let names: Vec<&str> = page.data.iter().map(|p| p.name.as_str()).collect();
//! assert_eq!(names, ["Amy", "Bob"]);
//! assert_eq!(page.metadata.total_filtered, 2);
//! ```
//!
//! # Semantics
//!
//! - Filters combine with AND. Evaluation never fails: a null field, an
//!   invalid regex or a malformed date range makes that condition false.
//!   Malformed *queries* (bad pagination, missing operands, unknown
//!   operators, undecodable cursors) are rejected before any record is read.
//! - Search matches every whitespace-separated term, case-insensitively, in
//!   at least one of the configured fields.
//! - Sorting is stable. Missing values sort last in both directions.
//! - Offset pages start at 1. Cursor tokens encode an offset into the
//!   filtered, sorted sequence.
//!
//! # Caching
//!
//! Each engine owns a bounded cache ([`CacheConfig`]): entries expire after
//! the TTL on lookup, and the oldest inserted entry is evicted when full.
//! Pass [`QueryOptions::uncached`] to bypass it for a call.
//!
//! # Standalone Helpers
//!
//! [`filter_records`], [`sort_records`] and [`paginate`] work on plain
//! slices with an accessor function, for callers that do not need the engine.

mod builder;
mod cache;
mod clock;
mod engine;
mod error;
mod filter;
mod op;
mod paginate;
pub mod presets;
mod query;
mod record;
mod search;
mod sort;
mod value;

// Re-export public API
pub use builder::QueryBuilder;
pub use cache::{cache_key, CacheConfig, CacheEntry, CacheStats, CacheStore};
pub use clock::{Clock, MockClock, SystemClock};
pub use engine::{
    DataSource, LoadFuture, PaginatedResponse, QueryEngine, QueryOptions, ResponseMetadata,
};
pub use error::{BoxError, QueryError, Result};
pub use filter::{
    compile_filters, filter_records, CompiledFilter, FilterCondition, FilterOptions, FilterValue,
};
pub use op::{Op, OpFamily};
pub use paginate::{
    decode_cursor, encode_cursor, paginate, Page, PaginationConfig, PaginationInfo, PaginationType,
    DEFAULT_LIMIT,
};
pub use query::DataQuery;
pub use record::Record;
pub use search::{SearchConfig, SearchMatcher, SearchOptions};
pub use sort::{
    compare_by_conditions, compare_values, effective_order, locale_compare, sort_records, Dir,
    SortCondition,
};
pub use value::{Number, Timestamp, Value};
