//! Query execution.
//!
//! [`QueryEngine`] runs a [`DataQuery`] against a [`DataSource`]:
//!
//! ```text
//! validate -> cache key -> cache hit? return stored page
//!          -> load source -> filter (AND) -> search -> sort -> paginate
//!          -> store page -> return
//! ```
//!
//! Each engine owns its cache. Engines are `Send + Sync` when the record
//! type is, so one can be shared behind an `Arc`.

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{CacheConfig, CacheStats, CacheStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{BoxError, QueryError, Result};
use crate::filter::FilterCondition;
use crate::paginate::{paginate, PaginationInfo};
use crate::query::DataQuery;
use crate::record::Record;
use crate::search::{SearchConfig, SearchMatcher};
use crate::sort::{sort_records, SortCondition};
use crate::value::Value;

/// Logs a pipeline stage at `debug`, or at `info` when the caller asked for
/// debug output.
macro_rules! stage {
    ($loud:expr, $($arg:tt)+) => {
        if $loud {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

/// Future returned by a loader source.
pub type LoadFuture<'a, T> = BoxFuture<'a, std::result::Result<Vec<T>, BoxError>>;

/// Where the records come from.
///
/// Materialized slices and vectors convert with `into()`; asynchronous
/// producers go through [`DataSource::loader`]. A loader runs at most once
/// per query and not at all when the result is served from cache.
pub enum DataSource<'a, T> {
    /// Borrowed records.
    Slice(&'a [T]),
    /// Owned records.
    Owned(Vec<T>),
    /// Deferred producer.
    Loader(Box<dyn FnOnce() -> LoadFuture<'a, T> + Send + 'a>),
}

impl<'a, T> DataSource<'a, T> {
    /// Wraps an async producer. Its error is passed through unchanged as
    /// [`QueryError::Source`].
    ///
    /// ```
    /// use standout_query::DataSource;
    ///
    /// let source: DataSource<'_, u32> =
    ///     DataSource::loader(|| async { Ok::<_, std::io::Error>(vec![1, 2, 3]) });
    /// # let _ = source;
    /// ```
    pub fn loader<F, Fut, E>(load: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = std::result::Result<Vec<T>, E>> + Send + 'a,
        E: Into<BoxError> + 'a,
        T: 'a,
    {
        DataSource::Loader(Box::new(move || -> LoadFuture<'a, T> {
            Box::pin(async move { load().await.map_err(Into::<BoxError>::into) })
        }))
    }
}

impl<'a, T: Clone> DataSource<'a, T> {
    /// Resolves the source into records, awaiting a loader if there is one.
    pub async fn load(self) -> Result<Cow<'a, [T]>> {
        match self {
            DataSource::Slice(items) => Ok(Cow::Borrowed(items)),
            DataSource::Owned(items) => Ok(Cow::Owned(items)),
            DataSource::Loader(load) => load().await.map(Cow::Owned).map_err(QueryError::Source),
        }
    }
}

impl<'a, T> From<&'a [T]> for DataSource<'a, T> {
    fn from(items: &'a [T]) -> Self {
        DataSource::Slice(items)
    }
}

impl<'a, T> From<&'a Vec<T>> for DataSource<'a, T> {
    fn from(items: &'a Vec<T>) -> Self {
        DataSource::Slice(items)
    }
}

impl<T> From<Vec<T>> for DataSource<'_, T> {
    fn from(items: Vec<T>) -> Self {
        DataSource::Owned(items)
    }
}

impl<T> std::fmt::Debug for DataSource<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Slice(items) => f.debug_tuple("Slice").field(&items.len()).finish(),
            DataSource::Owned(items) => f.debug_tuple("Owned").field(&items.len()).finish(),
            DataSource::Loader(_) => f.write_str("Loader"),
        }
    }
}

/// Per-call switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Read and populate the engine's cache.
    pub use_cache: bool,
    /// Report each stage at `info` level instead of `debug`.
    pub debug: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            debug: false,
        }
    }
}

impl QueryOptions {
    /// Options that bypass the cache entirely.
    pub fn uncached() -> Self {
        Self {
            use_cache: false,
            ..Self::default()
        }
    }
}

/// Execution facts reported with every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Wall time from the call to the response, in milliseconds.
    pub query_time_ms: f64,
    /// Whether the page came from the cache.
    pub cache_hit: bool,
    /// Records left after filtering and search, before pagination.
    pub total_filtered: usize,
}

/// One page of results with the query parts that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sorting: Vec<SortCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchConfig>,
    pub metadata: ResponseMetadata,
}

/// Runs queries and caches their pages.
///
/// # Example
///
/// ```
/// use futures::executor::block_on;
/// use serde_json::json;
/// use standout_query::{DataQuery, Dir, Op, QueryEngine, QueryOptions};
///
/// let engine = QueryEngine::<serde_json::Value>::new();
/// let rows = vec![
///     json!({"name": "Bob", "score": 5}),
///     json!({"name": "Amy", "score": 9}),
///     json!({"name": "Zoe", "score": 2}),
/// ];
///
/// let mut builder = DataQuery::builder();
/// builder.filter("score", Op::Gte, 5).sort("score", Dir::Desc, None);
/// let query = builder.build();
///
/// let page = block_on(engine.query(&rows, &query, QueryOptions::default())).unwrap();
/// let names: Vec<&str> = page.data.iter().map(|r| r["name"].as_str().unwrap()).collect();
/// assert_eq!(names, ["Amy", "Bob"]);
/// assert!(!page.metadata.cache_hit);
///
/// let again = block_on(engine.query(&rows, &query, QueryOptions::default())).unwrap();
/// assert!(again.metadata.cache_hit);
/// ```
pub struct QueryEngine<T> {
    cache: CacheStore<PaginatedResponse<T>>,
    clock: Arc<dyn Clock>,
}

impl<T> std::fmt::Debug for QueryEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl<T: Record + Clone> Default for QueryEngine<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record + Clone> QueryEngine<T> {
    /// Creates an engine with the default cache settings.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates an engine with the given cache settings.
    pub fn with_config(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an engine with an explicit time source, shared by cache
    /// expiry and `date_within_days` filters.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: CacheStore::with_clock(config, clock.clone()),
            clock,
        }
    }

    /// Runs `query` against `source`.
    ///
    /// Validation errors are returned before the source is touched. Source
    /// failures come back as [`QueryError::Source`]. Cache problems never
    /// fail the query.
    pub async fn query<'s, S>(
        &self,
        source: S,
        query: &DataQuery,
        options: QueryOptions,
    ) -> Result<PaginatedResponse<T>>
    where
        S: Into<DataSource<'s, T>>,
        T: 's,
    {
        let started = Instant::now();
        let source = source.into();
        let compiled = query.compile(self.clock.now())?;

        let key = if options.use_cache && self.cache.is_active() {
            match self.cache.key_for(query) {
                Ok(key) => Some(key),
                Err(err) => {
                    warn!(error = %err, "could not derive cache key, caching skipped");
                    None
                }
            }
        } else {
            None
        };

        if let Some(key) = &key {
            if let Some(mut hit) = self.cache.get(key) {
                hit.filters = query.filters.clone();
                hit.sorting = query.sorting.clone();
                hit.search = query.search.clone();
                hit.metadata.cache_hit = true;
                hit.metadata.query_time_ms = elapsed_ms(started);
                stage!(options.debug, key = %key, rows = hit.data.len(), "served from cache");
                return Ok(hit);
            }
            debug!(key = %key, "cache miss");
        }

        let records = match source.load().await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "data source failed");
                return Err(err);
            }
        };
        stage!(options.debug, loaded = records.len(), "source loaded");

        let mut matched: Vec<&T> = records
            .iter()
            .filter(|item| {
                compiled
                    .filters
                    .iter()
                    .all(|f| f.matches_record(*item, &T::accessor))
            })
            .collect();
        stage!(
            options.debug,
            conditions = compiled.filters.len(),
            remaining = matched.len(),
            "filters applied"
        );

        if let Some(search) = &query.search {
            let matcher = SearchMatcher::new(search);
            if !matcher.is_trivial() {
                matched.retain(|item| matcher.matches(*item, &T::accessor));
                stage!(options.debug, remaining = matched.len(), "search applied");
            }
        }

        let total_filtered = matched.len();
        let sorted = sort_records(matched, &query.sorting, deref_accessor::<T>);
        let page = paginate(sorted, &query.pagination)?;
        stage!(
            options.debug,
            total_filtered,
            rows = page.items.len(),
            "page assembled"
        );

        let response = PaginatedResponse {
            data: page.items.into_iter().cloned().collect(),
            pagination: page.info,
            filters: query.filters.clone(),
            sorting: query.sorting.clone(),
            search: query.search.clone(),
            metadata: ResponseMetadata {
                query_time_ms: elapsed_ms(started),
                cache_hit: false,
                total_filtered,
            },
        };

        if let Some(key) = key {
            self.cache.set(key, response.clone());
        }
        Ok(response)
    }

    /// Returns cache occupancy.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Empties the cache.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Drops the cached page for `query`, if any. Returns `true` if an entry
    /// was removed.
    pub fn invalidate(&self, query: &DataQuery) -> bool {
        match self.cache.key_for(query) {
            Ok(key) => self.cache.remove(&key),
            Err(err) => {
                warn!(error = %err, "could not derive cache key for invalidation");
                false
            }
        }
    }
}

fn deref_accessor<'a, T: Record>(item: &'a &T, field: &str) -> Value<'a> {
    item.field_value(field)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
