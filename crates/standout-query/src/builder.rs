//! Fluent query construction.

use crate::filter::{FilterCondition, FilterOptions, FilterValue};
use crate::op::Op;
use crate::paginate::PaginationConfig;
use crate::query::DataQuery;
use crate::search::{SearchConfig, SearchOptions};
use crate::sort::{Dir, SortCondition};

/// Accumulates a [`DataQuery`].
///
/// Mutators take `&mut self` and return `&mut Self`, so calls chain on a
/// binding and the builder can be reused: [`build`](Self::build) returns a
/// snapshot, [`reset`](Self::reset) starts over. Nothing is validated here;
/// malformed input surfaces when the query runs.
///
/// # Example
///
/// ```
/// use standout_query::{Dir, Op, QueryBuilder};
///
/// let mut builder = QueryBuilder::new();
/// builder
///     .filter("status", Op::Eq, "open")
///     .sort("createdAt", Dir::Desc, None)
///     .limit(10);
///
/// let first = builder.build();
/// builder.page(2);
/// let second = builder.build();
///
/// assert_eq!(first.pagination.limit(), 10);
/// assert_ne!(first, second);
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: DataQuery,
}

impl QueryBuilder {
    /// Creates a builder with default pagination (offset, page 1, limit 20).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a single-operand condition.
    pub fn filter(&mut self, field: &str, op: Op, value: impl Into<FilterValue>) -> &mut Self {
        self.query
            .filters
            .push(FilterCondition::new(field, op, value));
        self
    }

    /// Adds a condition with options (value list, case sensitivity, negation).
    pub fn filter_with(
        &mut self,
        field: &str,
        op: Op,
        value: impl Into<FilterValue>,
        options: FilterOptions,
    ) -> &mut Self {
        self.query
            .filters
            .push(FilterCondition::new(field, op, value).with_options(options));
        self
    }

    /// Adds a condition over a value list.
    pub fn filter_in<I, V>(&mut self, field: &str, op: Op, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        self.query
            .filters
            .push(FilterCondition::list(field, op, values));
        self
    }

    /// Adds a nullness check.
    pub fn filter_null(&mut self, field: &str, null: bool) -> &mut Self {
        let op = if null { Op::IsNull } else { Op::IsNotNull };
        self.query.filters.push(FilterCondition::unary(field, op));
        self
    }

    /// Adds a prebuilt condition.
    pub fn condition(&mut self, condition: FilterCondition) -> &mut Self {
        self.query.filters.push(condition);
        self
    }

    /// Adds a sort key. Without a priority the key takes its position in
    /// the list.
    pub fn sort(&mut self, field: &str, direction: Dir, priority: Option<i64>) -> &mut Self {
        self.query.sorting.push(SortCondition {
            field: field.to_string(),
            direction,
            priority,
        });
        self
    }

    /// Adds a prebuilt sort key.
    pub fn sort_by(&mut self, condition: SortCondition) -> &mut Self {
        self.query.sorting.push(condition);
        self
    }

    /// Replaces the pagination settings.
    pub fn paginate(&mut self, config: PaginationConfig) -> &mut Self {
        self.query.pagination = config;
        self
    }

    /// Selects an offset page, switching to offset pagination if needed.
    pub fn page(&mut self, page: usize) -> &mut Self {
        if let PaginationConfig::Offset { page: current, .. } = &mut self.query.pagination {
            *current = page;
        } else {
            let limit = self.query.pagination.limit();
            self.query.pagination = PaginationConfig::offset(page, limit);
        }
        self
    }

    /// Sets the page size, keeping the current strategy.
    pub fn limit(&mut self, limit: usize) -> &mut Self {
        match &mut self.query.pagination {
            PaginationConfig::Offset { limit: current, .. }
            | PaginationConfig::Cursor { limit: current, .. } => *current = limit,
        }
        self
    }

    /// Continues from a cursor, switching to cursor pagination if needed.
    /// `None` starts from the first page.
    pub fn cursor(&mut self, cursor: Option<String>) -> &mut Self {
        let limit = self.query.pagination.limit();
        self.query.pagination = PaginationConfig::cursor(cursor, limit);
        self
    }

    /// Sets a term search over `fields`.
    pub fn search<I, S>(&mut self, query: &str, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_with(query, fields, SearchOptions::default())
    }

    /// Sets a search with explicit flags.
    pub fn search_with<I, S>(&mut self, query: &str, fields: I, options: SearchOptions) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.search = Some(SearchConfig::new(query, fields).with_options(options));
        self
    }

    /// Appends relation names to the `includes` hint.
    pub fn include<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.includes.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Merges annotations into the query metadata.
    pub fn metadata<I, K>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        self.query
            .metadata
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Returns a snapshot of the accumulated query.
    pub fn build(&self) -> DataQuery {
        self.query.clone()
    }

    /// Discards everything accumulated so far.
    pub fn reset(&mut self) -> &mut Self {
        self.query = DataQuery::default();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_builder_uses_defaults() {
        let query = QueryBuilder::new().build();
        assert!(query.filters.is_empty());
        assert!(query.sorting.is_empty());
        assert_eq!(query.pagination, PaginationConfig::offset(1, 20));
        assert!(query.search.is_none());
    }

    #[test]
    fn accumulates_in_call_order() {
        let mut builder = QueryBuilder::new();
        builder
            .filter("a", Op::Eq, 1)
            .filter_with("b", Op::Contains, "x", FilterOptions::new().negate())
            .filter_in("c", Op::In, ["p", "q"])
            .filter_null("d", true)
            .sort("a", Dir::Desc, None)
            .sort("b", Dir::Asc, Some(3));

        let query = builder.build();
        let fields: Vec<&str> = query.filters.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b", "c", "d"]);
        assert!(query.filters[1].negate);
        assert_eq!(query.filters[2].values.as_ref().map(Vec::len), Some(2));
        assert_eq!(query.filters[3].operator, Op::IsNull);
        assert_eq!(query.sorting[0].priority, None);
        assert_eq!(query.sorting[1].priority, Some(3));
    }

    #[test]
    fn pagination_setters_patch_current_config() {
        let mut builder = QueryBuilder::new();
        builder.limit(5).page(3);
        assert_eq!(builder.build().pagination, PaginationConfig::offset(3, 5));

        builder.cursor(Some("abc".into()));
        assert_eq!(
            builder.build().pagination,
            PaginationConfig::cursor(Some("abc".into()), 5)
        );

        builder.limit(7);
        assert_eq!(builder.build().pagination.limit(), 7);

        builder.page(1);
        assert_eq!(builder.build().pagination, PaginationConfig::offset(1, 7));
    }

    #[test]
    fn build_is_a_snapshot() {
        let mut builder = QueryBuilder::new();
        builder.filter("a", Op::Eq, 1);
        let before = builder.build();
        builder.filter("b", Op::Eq, 2);
        assert_eq!(before.filters.len(), 1);
        assert_eq!(builder.build().filters.len(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut builder = QueryBuilder::new();
        builder
            .filter("a", Op::Eq, 1)
            .search("x", ["a"])
            .include(["author"])
            .metadata([("source", json!("ui"))])
            .limit(3);
        builder.reset();
        assert_eq!(builder.build(), DataQuery::default());
    }

    #[test]
    fn search_include_and_metadata() {
        let mut builder = QueryBuilder::new();
        builder
            .search_with(
                "rust",
                ["title", "body"],
                SearchOptions {
                    highlight: true,
                    ..SearchOptions::default()
                },
            )
            .include(["author"])
            .include(["tags"])
            .metadata([("source", json!("ui"))]);

        let query = builder.build();
        let search = query.search.unwrap();
        assert_eq!(search.fields, vec!["title", "body"]);
        assert!(search.highlight);
        assert_eq!(query.includes, vec!["author", "tags"]);
        assert_eq!(query.metadata.get("source"), Some(&json!("ui")));
    }
}
