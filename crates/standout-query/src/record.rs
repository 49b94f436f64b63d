//! Field access for queryable records.

use crate::value::{Number, Value};

/// Trait for types the query engine can read fields from.
///
/// Field names are dot-delimited paths. Implementations return
/// [`Value::None`] for paths that do not resolve to a scalar.
///
/// # Manual Implementation
///
/// ```
/// use standout_query::{Record, Value, Number};
///
/// struct Task {
///     name: String,
///     priority: u8,
/// }
///
/// impl Record for Task {
///     fn field_value(&self, field: &str) -> Value<'_> {
///         match field {
///             "name" => Value::String(&self.name),
///             "priority" => Value::Number(Number::U64(self.priority as u64)),
///             _ => Value::None,
///         }
///     }
/// }
/// ```
pub trait Record {
    /// Returns the value at `field` for comparison.
    fn field_value(&self, field: &str) -> Value<'_>;

    /// Returns a static accessor function suitable for the free-standing
    /// filter and sort helpers.
    fn accessor<'a>(item: &'a Self, field: &str) -> Value<'a>
    where
        Self: Sized,
    {
        item.field_value(field)
    }
}

/// JSON documents resolve dot paths segment by segment.
///
/// Object segments are looked up by key and array segments by index
/// (`tags.0`). Nested objects and arrays are not scalars and resolve to
/// [`Value::None`], as do missing segments and `null`.
///
/// ```
/// use serde_json::json;
/// use standout_query::{Record, Value};
///
/// let doc = json!({"user": {"name": "Amy", "roles": ["admin"]}});
/// assert_eq!(doc.field_value("user.name"), Value::String("Amy"));
/// assert_eq!(doc.field_value("user.roles.0"), Value::String("admin"));
/// assert_eq!(doc.field_value("user.email"), Value::None);
/// ```
impl Record for serde_json::Value {
    fn field_value(&self, field: &str) -> Value<'_> {
        match resolve_path(self, field) {
            Some(json) => json_scalar(json),
            None => Value::None,
        }
    }
}

fn resolve_path<'a>(root: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(root, |node, segment| match node {
        serde_json::Value::Object(map) => map.get(segment),
        serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn json_scalar(json: &serde_json::Value) -> Value<'_> {
    match json {
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(Number::I64(i))
            } else if let Some(u) = n.as_u64() {
                Value::Number(Number::U64(u))
            } else {
                n.as_f64()
                    .map_or(Value::None, |f| Value::Number(Number::F64(f)))
            }
        }
        serde_json::Value::Null | serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
            Value::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct TestItem {
        name: String,
        count: i32,
    }

    impl Record for TestItem {
        fn field_value(&self, field: &str) -> Value<'_> {
            match field {
                "name" => Value::String(&self.name),
                "count" => Value::Number(Number::I64(self.count as i64)),
                _ => Value::None,
            }
        }
    }

    #[test]
    fn manual_impl_and_accessor() {
        let item = TestItem {
            name: "test".to_string(),
            count: 42,
        };

        assert_eq!(item.field_value("name"), Value::String("test"));
        assert_eq!(
            TestItem::accessor(&item, "count"),
            Value::Number(Number::I64(42))
        );
        assert_eq!(item.field_value("unknown"), Value::None);
    }

    #[test]
    fn json_nested_paths() {
        let doc = json!({
            "id": 7,
            "ratio": 0.5,
            "big": u64::MAX,
            "active": true,
            "owner": {"profile": {"city": "Lisbon"}},
            "tags": ["a", "b"],
            "deleted": null
        });

        assert_eq!(doc.field_value("id"), Value::Number(Number::I64(7)));
        assert_eq!(doc.field_value("ratio"), Value::Number(Number::F64(0.5)));
        assert_eq!(doc.field_value("big"), Value::Number(Number::U64(u64::MAX)));
        assert_eq!(doc.field_value("active"), Value::Bool(true));
        assert_eq!(doc.field_value("owner.profile.city"), Value::String("Lisbon"));
        assert_eq!(doc.field_value("tags.1"), Value::String("b"));
    }

    #[test]
    fn json_unresolvable_paths_are_none() {
        let doc = json!({"owner": {"name": "x"}, "tags": ["a"], "deleted": null});

        assert_eq!(doc.field_value("deleted"), Value::None);
        assert_eq!(doc.field_value("owner"), Value::None);
        assert_eq!(doc.field_value("owner.name.first"), Value::None);
        assert_eq!(doc.field_value("tags.5"), Value::None);
        assert_eq!(doc.field_value("tags.x"), Value::None);
        assert_eq!(doc.field_value(""), Value::None);
        assert_eq!(doc.field_value("missing.path"), Value::None);
    }
}
