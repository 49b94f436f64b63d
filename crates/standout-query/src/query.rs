//! Query descriptions.
//!
//! A [`DataQuery`] is a plain value: filters, sort keys, pagination, an
//! optional search and two collaborator hints (`includes`, `metadata`). It is
//! usually assembled with [`QueryBuilder`](crate::QueryBuilder) and validated
//! only when executed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{QueryError, Result};
use crate::filter::{compile_filters, CompiledFilter, FilterCondition, FilterValue};
use crate::op::OpFamily;
use crate::paginate::PaginationConfig;
use crate::search::SearchConfig;
use crate::sort::{effective_order, SortCondition};
use crate::value::Timestamp;

/// A complete query: what to keep, in which order, and which page.
///
/// The wire form is camelCase JSON:
///
/// ```
/// use standout_query::{DataQuery, Op};
///
/// let query: DataQuery = serde_json::from_str(r#"{
///     "filters": [{"field": "score", "operator": "gte", "value": 5}],
///     "sorting": [{"field": "score", "direction": "desc"}],
///     "pagination": {"type": "offset", "page": 1, "limit": 2}
/// }"#).unwrap();
///
/// assert_eq!(query.filters[0].operator, Op::Gte);
/// assert_eq!(query.pagination.limit(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    /// Conditions combined with AND.
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    /// Sort keys.
    #[serde(default)]
    pub sorting: Vec<SortCondition>,
    /// Page selection.
    pub pagination: PaginationConfig,
    /// Optional text search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchConfig>,
    /// Relations collaborators should load; the engine does not read it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
    /// Free-form annotations; not part of the cache key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A query that passed validation.
#[derive(Debug, Clone)]
pub(crate) struct CompiledQuery {
    pub(crate) filters: Vec<CompiledFilter>,
}

impl DataQuery {
    /// Starts a builder.
    pub fn builder() -> crate::QueryBuilder {
        crate::QueryBuilder::new()
    }

    /// Validates the query without running it.
    ///
    /// Checks pagination parameters (including cursor tokens), filter operand
    /// shapes and sort fields.
    pub fn validate(&self) -> Result<()> {
        self.compile(Timestamp(0)).map(|_| ())
    }

    pub(crate) fn compile(&self, now: Timestamp) -> Result<CompiledQuery> {
        self.pagination.start_offset()?;
        for (index, condition) in self.sorting.iter().enumerate() {
            if condition.field.trim().is_empty() {
                return Err(QueryError::InvalidSort {
                    index,
                    reason: "field path is empty",
                });
            }
        }
        if let Some(search) = &self.search {
            if search.fields.iter().any(|f| f.trim().is_empty()) {
                return Err(QueryError::InvalidSearch(
                    "search field paths must not be empty".to_string(),
                ));
            }
        }
        Ok(CompiledQuery {
            filters: compile_filters(&self.filters, now)?,
        })
    }

    /// Returns the normalized form used to derive cache keys.
    ///
    /// Semantically identical queries produce equal forms:
    /// - filters are sorted (AND is commutative), membership lists sorted
    ///   and operands of nullness checks dropped
    /// - sort keys are listed in effective order without priorities
    /// - search fields and includes are sorted and deduplicated, the search
    ///   text folded the way matching folds it
    /// - the offset `total` hint and `metadata` are left out
    pub fn canonical_form(&self) -> serde_json::Result<serde_json::Value> {
        let mut filters: Vec<serde_json::Value> =
            self.filters.iter().map(canonical_filter).collect();
        filters.sort_by_cached_key(canonical_string);

        let sorting: Vec<serde_json::Value> = effective_order(&self.sorting)
            .into_iter()
            .map(|c| json!({ "field": c.field, "direction": c.direction }))
            .collect();

        let pagination = match &self.pagination {
            PaginationConfig::Offset { page, limit, .. } => {
                json!({ "type": "offset", "page": page, "limit": limit })
            }
            PaginationConfig::Cursor { cursor, limit } => {
                json!({ "type": "cursor", "cursor": cursor, "limit": limit })
            }
        };

        let search = self.search.as_ref().map(|s| {
            let text = if s.exact {
                s.query.trim().to_lowercase()
            } else {
                crate::filter::search_terms(&s.query).join(" ")
            };
            json!({
                "query": text,
                "fields": sorted_unique(&s.fields),
                "exact": s.exact,
                "fuzzy": s.fuzzy,
                "highlight": s.highlight,
            })
        });

        Ok(json!({
            "filters": filters,
            "sorting": sorting,
            "pagination": pagination,
            "search": search,
            "includes": sorted_unique(&self.includes),
        }))
    }
}

fn canonical_filter(condition: &FilterCondition) -> serde_json::Value {
    let (value, values) = match condition.operator.family() {
        OpFamily::Nullness => (None, None),
        _ => (
            condition.value.as_ref().map(typed_operand),
            condition.values.as_ref().map(|list| {
                let mut typed: Vec<serde_json::Value> = list.iter().map(typed_operand).collect();
                if condition.operator.family() == OpFamily::Membership {
                    typed.sort_by_cached_key(canonical_string);
                }
                typed
            }),
        ),
    };
    json!({
        "field": condition.field,
        "operator": condition.operator,
        "value": value,
        "values": values,
        "caseSensitive": condition.case_sensitive,
        "negate": condition.negate,
    })
}

/// Tags an operand with its type, so a timestamp and the string spelling of
/// the same instant stay distinct.
fn typed_operand(operand: &FilterValue) -> serde_json::Value {
    match operand {
        FilterValue::String(s) => json!({ "str": s }),
        FilterValue::Number(n) => json!({ "num": n }),
        FilterValue::Timestamp(t) => json!({ "ts": t.0 }),
        FilterValue::Bool(b) => json!({ "bool": b }),
        FilterValue::Null => serde_json::Value::Null,
    }
}

fn sorted_unique(items: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = items.iter().map(String::as_str).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Serializes JSON with object keys in sorted order, independent of how the
/// map type orders them.
pub(crate) fn canonical_string(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Op;
    use crate::sort::Dir;

    fn key(query: &DataQuery) -> String {
        canonical_string(&query.canonical_form().unwrap())
    }

    #[test]
    fn default_pagination_is_first_page_of_twenty() {
        let query = DataQuery::default();
        assert_eq!(query.pagination, PaginationConfig::offset(1, 20));
    }

    #[test]
    fn filter_order_does_not_change_key() {
        let a = DataQuery {
            filters: vec![
                FilterCondition::new("a", Op::Eq, 1),
                FilterCondition::new("b", Op::Contains, "x"),
            ],
            ..DataQuery::default()
        };
        let b = DataQuery {
            filters: vec![
                FilterCondition::new("b", Op::Contains, "x"),
                FilterCondition::new("a", Op::Eq, 1),
            ],
            ..DataQuery::default()
        };
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn membership_order_does_not_change_key() {
        let a = DataQuery {
            filters: vec![FilterCondition::list("s", Op::In, ["x", "y"])],
            ..DataQuery::default()
        };
        let b = DataQuery {
            filters: vec![FilterCondition::list("s", Op::In, ["y", "x"])],
            ..DataQuery::default()
        };
        assert_eq!(key(&a), key(&b));
    }

    #[test]
    fn equivalent_sort_priorities_share_a_key() {
        let implicit = DataQuery {
            sorting: vec![SortCondition::desc("score"), SortCondition::asc("name")],
            ..DataQuery::default()
        };
        let explicit = DataQuery {
            sorting: vec![
                SortCondition::asc("name").with_priority(5),
                SortCondition::desc("score").with_priority(1),
            ],
            ..DataQuery::default()
        };
        assert_eq!(key(&implicit), key(&explicit));

        let reversed = DataQuery {
            sorting: vec![SortCondition::asc("name"), SortCondition::desc("score")],
            ..DataQuery::default()
        };
        assert_ne!(key(&implicit), key(&reversed));
    }

    #[test]
    fn metadata_and_total_hint_are_ignored() {
        let plain = DataQuery::default();
        let mut annotated = DataQuery {
            pagination: PaginationConfig::Offset {
                page: 1,
                limit: 20,
                total: Some(99),
            },
            ..DataQuery::default()
        };
        annotated
            .metadata
            .insert("origin".into(), serde_json::json!("dashboard"));
        assert_eq!(key(&plain), key(&annotated));
    }

    #[test]
    fn meaningful_differences_change_key() {
        let base = DataQuery::default();
        let other_page = DataQuery {
            pagination: PaginationConfig::offset(2, 20),
            ..DataQuery::default()
        };
        let negated = DataQuery {
            filters: vec![FilterCondition {
                negate: true,
                ..FilterCondition::new("a", Op::Eq, 1)
            }],
            ..DataQuery::default()
        };
        let plain = DataQuery {
            filters: vec![FilterCondition::new("a", Op::Eq, 1)],
            ..DataQuery::default()
        };
        assert_ne!(key(&base), key(&other_page));
        assert_ne!(key(&plain), key(&negated));
    }

    #[test]
    fn timestamp_and_string_operands_get_distinct_keys() {
        let by_instant = DataQuery {
            filters: vec![FilterCondition::new("at", Op::Eq, Timestamp(0))],
            ..DataQuery::default()
        };
        let by_text = DataQuery {
            filters: vec![FilterCondition::new("at", Op::Eq, "1970-01-01T00:00:00.000Z")],
            ..DataQuery::default()
        };
        assert_ne!(key(&by_instant), key(&by_text));

        let instant_list = DataQuery {
            filters: vec![FilterCondition::list("at", Op::In, [Timestamp(0)])],
            ..DataQuery::default()
        };
        let text_list = DataQuery {
            filters: vec![FilterCondition::list(
                "at",
                Op::In,
                ["1970-01-01T00:00:00.000Z"],
            )],
            ..DataQuery::default()
        };
        assert_ne!(key(&instant_list), key(&text_list));
    }

    #[test]
    fn scalar_operand_types_stay_distinct() {
        let spellings = [
            FilterValue::from("1"),
            FilterValue::from(1),
            FilterValue::from(Timestamp(1)),
            FilterValue::from("true"),
            FilterValue::from(true),
        ];
        let keys: Vec<String> = spellings
            .iter()
            .map(|operand| {
                key(&DataQuery {
                    filters: vec![FilterCondition::new("f", Op::Eq, operand.clone())],
                    ..DataQuery::default()
                })
            })
            .collect();
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn canonical_string_sorts_keys() {
        let value = serde_json::json!({"b": 1, "a": {"d": [1, {"z": 0, "y": 1}], "c": null}});
        assert_eq!(
            canonical_string(&value),
            r#"{"a":{"c":null,"d":[1,{"y":1,"z":0}]},"b":1}"#
        );
    }

    #[test]
    fn validate_reports_bad_parts() {
        let bad_page = DataQuery {
            pagination: PaginationConfig::offset(0, 10),
            ..DataQuery::default()
        };
        assert!(bad_page.validate().is_err());

        let bad_sort = DataQuery {
            sorting: vec![SortCondition::new("", Dir::Asc)],
            ..DataQuery::default()
        };
        assert!(matches!(
            bad_sort.validate(),
            Err(QueryError::InvalidSort { index: 0, .. })
        ));

        let bad_cursor = DataQuery {
            pagination: PaginationConfig::cursor(Some("%%%".into()), 10),
            ..DataQuery::default()
        };
        assert!(matches!(
            bad_cursor.validate(),
            Err(QueryError::InvalidCursor(_))
        ));

        assert!(DataQuery::default().validate().is_ok());
    }
}
