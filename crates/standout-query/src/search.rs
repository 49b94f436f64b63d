//! Multi-field text search.
//!
//! Search is a linear scan: each configured field is rendered as lower-cased
//! text and checked for the query terms by substring.

use serde::{Deserialize, Serialize};

use crate::filter::search_terms;
use crate::value::Value;

/// Search settings for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// The search text.
    pub query: String,
    /// Field paths to search in.
    pub fields: Vec<String>,
    /// Match the whole query as one substring instead of term by term.
    #[serde(default)]
    pub exact: bool,
    /// Hint for collaborators; matching is unaffected.
    #[serde(default)]
    pub fuzzy: bool,
    /// Hint for collaborators; matching is unaffected.
    #[serde(default)]
    pub highlight: bool,
}

/// Optional search flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub exact: bool,
    pub fuzzy: bool,
    pub highlight: bool,
}

impl SearchConfig {
    /// Creates a term search over `fields`.
    pub fn new<I, S>(query: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SearchConfig {
            query: query.into(),
            fields: fields.into_iter().map(Into::into).collect(),
            exact: false,
            fuzzy: false,
            highlight: false,
        }
    }

    /// Applies optional flags.
    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.exact = options.exact;
        self.fuzzy = options.fuzzy;
        self.highlight = options.highlight;
        self
    }

    /// Tests a record against this search.
    pub fn matches<T, F>(&self, item: &T, accessor: &F) -> bool
    where
        for<'a> F: Fn(&'a T, &str) -> Value<'a>,
    {
        SearchMatcher::new(self).matches(item, accessor)
    }
}

/// A search prepared for repeated matching.
///
/// ```
/// use standout_query::{SearchConfig, SearchMatcher, Value};
///
/// fn accessor<'a>(s: &'a (&'static str, &'static str), field: &str) -> Value<'a> {
///     match field {
///         "title" => Value::String(s.0),
///         "body" => Value::String(s.1),
///         _ => Value::None,
///     }
/// }
///
/// let config = SearchConfig::new("rust async", ["title", "body"]);
/// let matcher = SearchMatcher::new(&config);
/// assert!(matcher.matches(&("Rust tips", "on async code"), &accessor));
/// assert!(!matcher.matches(&("Rust tips", "on ownership"), &accessor));
/// ```
#[derive(Debug, Clone)]
pub struct SearchMatcher<'c> {
    fields: &'c [String],
    mode: Mode,
}

#[derive(Debug, Clone)]
enum Mode {
    /// Empty query: everything matches.
    All,
    /// Whole query as one lower-cased substring.
    Exact(String),
    /// Each lower-cased term must occur in some field.
    Terms(Vec<String>),
}

impl<'c> SearchMatcher<'c> {
    /// Prepares the terms of `config`.
    pub fn new(config: &'c SearchConfig) -> Self {
        let query = config.query.trim();
        let mode = if query.is_empty() {
            Mode::All
        } else if config.exact {
            Mode::Exact(query.to_lowercase())
        } else {
            Mode::Terms(search_terms(query))
        };
        SearchMatcher {
            fields: &config.fields,
            mode,
        }
    }

    /// Returns `true` if the search is a no-op.
    pub fn is_trivial(&self) -> bool {
        matches!(self.mode, Mode::All)
    }

    /// Tests a record.
    pub fn matches<T, F>(&self, item: &T, accessor: &F) -> bool
    where
        for<'a> F: Fn(&'a T, &str) -> Value<'a>,
    {
        match &self.mode {
            Mode::All => true,
            Mode::Exact(needle) => self.field_texts(item, accessor).any(|text| text.contains(needle.as_str())),
            Mode::Terms(terms) => {
                let texts: Vec<String> = self.field_texts(item, accessor).collect();
                terms
                    .iter()
                    .all(|term| texts.iter().any(|text| text.contains(term.as_str())))
            }
        }
    }

    fn field_texts<'i, T, F>(&'i self, item: &'i T, accessor: &'i F) -> impl Iterator<Item = String> + 'i
    where
        for<'a> F: Fn(&'a T, &str) -> Value<'a>,
    {
        self.fields.iter().filter_map(move |field| {
            accessor(item, field)
                .to_text()
                .map(|text| text.to_lowercase())
        })
    }
}
