//! Multi-key stable sorting.
//!
//! Provides [`Dir`] for sort direction, [`SortCondition`] for a prioritized
//! field ordering, and [`sort_records`] to apply a list of them.

use std::cmp::Ordering;

use deunicode::deunicode;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dir {
    /// Ascending order (smallest first).
    #[default]
    Asc,
    /// Descending order (largest first).
    Desc,
}

impl Dir {
    /// Applies this direction to an ordering.
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Dir::Asc => ordering,
            Dir::Desc => ordering.reverse(),
        }
    }

    /// Returns the display name of this direction.
    pub fn as_str(self) -> &'static str {
        match self {
            Dir::Asc => "asc",
            Dir::Desc => "desc",
        }
    }
}

impl std::fmt::Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single sort key.
///
/// Conditions run in ascending `priority`; a condition without a priority
/// takes its position in the condition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortCondition {
    /// The field path to sort by.
    pub field: String,
    /// The sort direction.
    #[serde(default)]
    pub direction: Dir,
    /// Evaluation priority, lower first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

impl SortCondition {
    /// Creates a condition with the given direction.
    pub fn new(field: impl Into<String>, direction: Dir) -> Self {
        SortCondition {
            field: field.into(),
            direction,
            priority: None,
        }
    }

    /// Creates an ascending condition.
    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, Dir::Asc)
    }

    /// Creates a descending condition.
    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, Dir::Desc)
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Compares two field values under this condition.
    ///
    /// `None` always sorts after present values, whatever the direction.
    pub fn compare(&self, a: &Value<'_>, b: &Value<'_>) -> Ordering {
        match (a.is_none(), b.is_none()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.direction.apply(compare_values(a, b)),
        }
    }
}

/// Returns the conditions in evaluation order.
///
/// Sorted by ascending effective priority (explicit priority, or the list
/// index when unset); ties keep list order.
pub fn effective_order(conditions: &[SortCondition]) -> Vec<&SortCondition> {
    let mut ordered: Vec<(i64, usize, &SortCondition)> = conditions
        .iter()
        .enumerate()
        .map(|(i, c)| (c.priority.unwrap_or(i as i64), i, c))
        .collect();
    ordered.sort_by_key(|&(priority, index, _)| (priority, index));
    ordered.into_iter().map(|(_, _, c)| c).collect()
}

/// Compares two present values.
///
/// Values of different types order by type: numbers, then timestamps, then
/// strings, then booleans. Within a type, strings use a locale-style
/// comparison, numbers compare numerically (NaN after every other number)
/// and timestamps by instant.
pub fn compare_values(a: &Value<'_>, b: &Value<'_>) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => locale_compare(a, b),
        (Value::Number(a), Value::Number(b)) => a
            .compare(*b)
            .unwrap_or_else(|| a.to_f64().is_nan().cmp(&b.to_f64().is_nan())),
        (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value<'_>) -> u8 {
    match value {
        Value::Number(_) => 0,
        Value::Timestamp(_) => 1,
        Value::String(_) => 2,
        Value::Bool(_) => 3,
        Value::None => 4,
    }
}

/// Approximates a locale collation: letters compare without accents and case
/// first, then lower case before upper case, then by code point.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    let (plain_a, plain_b) = (deunicode(a), deunicode(b));
    plain_a
        .to_lowercase()
        .cmp(&plain_b.to_lowercase())
        .then_with(|| plain_a.cmp(&plain_b).reverse())
        .then_with(|| a.cmp(b))
}

/// Compares two items using a list of sort conditions.
///
/// The first condition in effective order that tells the items apart decides.
pub fn compare_by_conditions<T, F>(a: &T, b: &T, conditions: &[&SortCondition], accessor: &F) -> Ordering
where
    for<'a> F: Fn(&'a T, &str) -> Value<'a>,
{
    for condition in conditions {
        let ordering = condition.compare(
            &accessor(a, &condition.field),
            &accessor(b, &condition.field),
        );
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Sorts items by the given conditions.
///
/// Items that compare equal on every key keep their input order. The
/// guarantee comes from an explicit index tiebreak, not from the sort
/// primitive.
pub fn sort_records<T, F>(items: Vec<T>, conditions: &[SortCondition], accessor: F) -> Vec<T>
where
    for<'a> F: Fn(&'a T, &str) -> Value<'a>,
{
    if conditions.is_empty() {
        return items;
    }
    let ordered = effective_order(conditions);
    let mut decorated: Vec<(usize, T)> = items.into_iter().enumerate().collect();
    decorated.sort_unstable_by(|(ia, a), (ib, b)| {
        compare_by_conditions(a, b, &ordered, &accessor).then(ia.cmp(ib))
    });
    decorated.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Number, Timestamp};

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        name: &'static str,
        priority: Option<i64>,
        id: usize,
    }

    fn item_accessor<'a>(item: &'a Item, field: &str) -> Value<'a> {
        match field {
            "name" => Value::String(item.name),
            "priority" => item
                .priority
                .map_or(Value::None, |p| Value::Number(Number::I64(p))),
            _ => Value::None,
        }
    }

    fn item(name: &'static str, priority: Option<i64>, id: usize) -> Item {
        Item { name, priority, id }
    }

    fn ids(items: &[Item]) -> Vec<usize> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn dir_apply() {
        assert_eq!(Dir::Asc.apply(Ordering::Less), Ordering::Less);
        assert_eq!(Dir::Desc.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(Dir::Desc.apply(Ordering::Equal), Ordering::Equal);
        assert_eq!(Dir::Desc.to_string(), "desc");
    }

    #[test]
    fn effective_order_uses_priority_then_position() {
        let conditions = vec![
            SortCondition::asc("a"),
            SortCondition::asc("b").with_priority(-1),
            SortCondition::asc("c").with_priority(1),
        ];
        let fields: Vec<&str> = effective_order(&conditions)
            .iter()
            .map(|c| c.field.as_str())
            .collect();
        // a defaults to 0, c has explicit 1 and keeps its place after a
        assert_eq!(fields, vec!["b", "a", "c"]);
    }

    #[test]
    fn none_sorts_last_in_both_directions() {
        let items = vec![item("a", None, 0), item("b", Some(2), 1), item("c", Some(1), 2)];

        let asc = sort_records(items.clone(), &[SortCondition::asc("priority")], item_accessor);
        assert_eq!(ids(&asc), vec![2, 1, 0]);

        let desc = sort_records(items, &[SortCondition::desc("priority")], item_accessor);
        assert_eq!(ids(&desc), vec![1, 2, 0]);
    }

    #[test]
    fn ties_keep_input_order() {
        let items: Vec<Item> = (0..50).map(|i| item("same", Some((i % 3) as i64), i)).collect();
        let sorted = sort_records(items, &[SortCondition::asc("priority")], item_accessor);

        for window in sorted.windows(2) {
            if window[0].priority == window[1].priority {
                assert!(window[0].id < window[1].id);
            }
        }
    }

    #[test]
    fn multiple_keys() {
        let items = vec![
            item("b", Some(1), 0),
            item("a", Some(1), 1),
            item("a", Some(2), 2),
        ];
        let sorted = sort_records(
            items,
            &[SortCondition::desc("priority"), SortCondition::asc("name")],
            item_accessor,
        );
        assert_eq!(ids(&sorted), vec![2, 1, 0]);
    }

    #[test]
    fn no_conditions_is_identity() {
        let items = vec![item("b", None, 0), item("a", None, 1)];
        assert_eq!(sort_records(items.clone(), &[], item_accessor), items);
    }

    #[test]
    fn locale_comparison() {
        assert_eq!(locale_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("e", "é"), Ordering::Less);
        assert_eq!(locale_compare("éclair", "zebra"), Ordering::Less);
        assert_eq!(locale_compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn typed_comparisons() {
        assert_eq!(
            compare_values(&Value::Number(Number::I64(9)), &Value::Number(Number::F64(10.0))),
            Ordering::Less
        );
        assert_eq!(
            compare_values(
                &Value::Timestamp(Timestamp(2000)),
                &Value::Timestamp(Timestamp(1000))
            ),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(&Value::Number(Number::F64(f64::NAN)), &Value::Number(Number::I64(1))),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(&Value::Bool(false), &Value::Bool(true)),
            Ordering::Less
        );
    }

    #[test]
    fn mixed_types_order_by_type_first() {
        let accented = Value::String("é");
        let later = Value::String("f");
        let flag = Value::Bool(true);
        assert_eq!(compare_values(&accented, &later), Ordering::Less);
        assert_eq!(compare_values(&later, &flag), Ordering::Less);
        assert_eq!(compare_values(&accented, &flag), Ordering::Less);

        let nine = Value::Number(Number::I64(9));
        let ten = Value::Number(Number::I64(10));
        let text = Value::String("5x");
        assert_eq!(compare_values(&nine, &ten), Ordering::Less);
        assert_eq!(compare_values(&ten, &text), Ordering::Less);
        assert_eq!(compare_values(&nine, &text), Ordering::Less);
        assert_eq!(
            compare_values(&Value::Timestamp(Timestamp(0)), &nine),
            Ordering::Greater
        );
    }

    #[test]
    fn mixed_column_groups_equal_values() {
        let rows: Vec<Value<'static>> = (0..30)
            .map(|i| match i % 3 {
                0 => Value::String("é"),
                1 => Value::String("f"),
                _ => Value::Bool(true),
            })
            .collect();

        fn identity<'a>(v: &'a Value<'static>, _field: &str) -> Value<'a> {
            v.clone()
        }

        let sorted = sort_records(rows, &[SortCondition::asc("v")], identity);
        let expected: Vec<Value<'static>> = std::iter::repeat(Value::String("é"))
            .take(10)
            .chain(std::iter::repeat(Value::String("f")).take(10))
            .chain(std::iter::repeat(Value::Bool(true)).take(10))
            .collect();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn sort_condition_serde() {
        let cond = SortCondition::desc("createdAt").with_priority(2);
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"field": "createdAt", "direction": "desc", "priority": 2})
        );
        let parsed: SortCondition = serde_json::from_value(serde_json::json!({"field": "x"})).unwrap();
        assert_eq!(parsed, SortCondition::asc("x"));
    }
}
