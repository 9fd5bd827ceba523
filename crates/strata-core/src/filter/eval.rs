//! In-memory plan evaluation: row-level condition matching, sorting, and
//! windowing for backends that hold records directly rather than
//! compiling to a statement.

use crate::{
    filter::Operator,
    query::{PlannedCondition, QueryPlan},
    record::Record,
    value::Value,
};
use std::cmp::Ordering;

static NULL: Value = Value::Null;

/// Resolve a field reference against a record, treating the identity
/// field as a virtual column.
#[must_use]
pub fn field_value<'a>(identity_field: &str, record: &'a Record, field: &str) -> &'a Value {
    if field == identity_field {
        &record.id
    } else {
        record.get(field).unwrap_or(&NULL)
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    matches!(left.compare(right), Some(Ordering::Equal))
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Text(v) => Some(v.clone()),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::Time(_) => {
            Some(value.to_string())
        }
        _ => None,
    }
}

fn contains(actual: &Value, operand: &Value) -> bool {
    match actual {
        Value::List(items) => items.iter().any(|item| equals(item, operand)),
        _ => match (text_of(actual), operand.as_text()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
    }
}

/// Whether a record satisfies one planned condition.
#[must_use]
pub fn condition_matches(
    condition: &PlannedCondition,
    identity_field: &str,
    record: &Record,
) -> bool {
    let actual = field_value(identity_field, record, &condition.field);

    match condition.op {
        Operator::Is => condition.values.iter().any(|v| equals(actual, v)),
        Operator::Not => !condition.values.iter().any(|v| equals(actual, v)),
        Operator::Contains => condition.values.iter().any(|v| contains(actual, v)),
        Operator::NotContains => !condition.values.iter().any(|v| contains(actual, v)),
        Operator::Prefix => match (text_of(actual), condition.values.first()) {
            (Some(haystack), Some(Value::Text(needle))) => haystack.starts_with(needle),
            _ => false,
        },
        Operator::Suffix => match (text_of(actual), condition.values.first()) {
            (Some(haystack), Some(Value::Text(needle))) => haystack.ends_with(needle),
            _ => false,
        },
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let Some(operand) = condition.values.first() else {
                return false;
            };

            // unordered families never match a range condition
            actual.compare(operand).is_some_and(|ordering| match condition.op {
                Operator::Gt => ordering == Ordering::Greater,
                Operator::Gte => ordering != Ordering::Less,
                Operator::Lt => ordering == Ordering::Less,
                Operator::Lte => ordering != Ordering::Greater,
                _ => unreachable!("outer match narrowed to range operators"),
            })
        }
    }
}

/// Whether a record satisfies every planned condition.
#[must_use]
pub fn plan_matches(plan: &QueryPlan, record: &Record) -> bool {
    plan.criteria
        .iter()
        .all(|condition| condition_matches(condition, &plan.identity_field, record))
}

/// Sort records by the plan's sort keys, stable across equal keys.
pub fn sort_records(plan: &QueryPlan, records: &mut [Record]) {
    if plan.sort.is_empty() {
        return;
    }

    records.sort_by(|a, b| {
        for key in &plan.sort {
            let left = field_value(&plan.identity_field, a, &key.field);
            let right = field_value(&plan.identity_field, b, &key.field);
            let ordering = left.compare(right).unwrap_or(Ordering::Equal);
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        Ordering::Equal
    });
}

/// Apply the plan's offset and limit window.
#[must_use]
pub fn apply_window(plan: &QueryPlan, records: Vec<Record>) -> Vec<Record> {
    let offset = usize::try_from(plan.offset).unwrap_or(usize::MAX);
    let mut windowed: Vec<Record> = records.into_iter().skip(offset).collect();

    if let Some(limit) = plan.limit {
        windowed.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }

    windowed
}

/// Apply the plan's projection to one record.
#[must_use]
pub fn project(plan: &QueryPlan, mut record: Record) -> Record {
    if plan.projection.is_empty() {
        return record;
    }

    record
        .fields
        .retain(|name, _| plan.projection.iter().any(|keep| keep == name));

    // projecting the identity field alone strips every plain field but
    // keeps the id, which is always present on a record
    record
}
