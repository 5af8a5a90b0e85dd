//! In-memory evaluation of parsed filter documents.

use std::cmp::Ordering;

use serde_json::Value;

use super::filter_where::Condition;
use super::types::{Document, FilterOp, FilterWhereInfo};

/// Resolve a dotted path against a document
pub fn lookup<'a>(doc: &'a Document, field: &str) -> Option<&'a Value> {
    let mut parts = field.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

pub fn matches(condition: &Condition, doc: &Document) -> bool {
    match condition {
        Condition::All(parts) => parts.iter().all(|c| matches(c, doc)),
        Condition::Any(parts) => parts.iter().any(|c| matches(c, doc)),
        Condition::Not(inner) => !matches(inner, doc),
        Condition::Field(info) => matches_field(info, doc),
    }
}

fn matches_field(info: &FilterWhereInfo, doc: &Document) -> bool {
    let value = lookup(doc, &info.field);
    match info.operator {
        FilterOp::Eq => equals(value, &info.data),
        FilterOp::Ne => !equals(value, &info.data),
        FilterOp::Gt => compare_same_type(value, &info.data) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(compare_same_type(value, &info.data), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => compare_same_type(value, &info.data) == Some(Ordering::Less),
        FilterOp::Lte => matches!(compare_same_type(value, &info.data), Some(Ordering::Less | Ordering::Equal)),
        FilterOp::In => in_list(value, &info.data),
        FilterOp::NIn => !in_list(value, &info.data),
        FilterOp::Exists => value.is_some() == info.data.as_bool().unwrap_or(true),
    }
}

/// Equality as a filter sees it: `null` also matches a missing field, and a
/// scalar matches an array field that contains it.
fn equals(value: Option<&Value>, data: &Value) -> bool {
    match value {
        None => data.is_null(),
        Some(v) if values_equal(v, data) => true,
        Some(Value::Array(items)) => items.iter().any(|item| values_equal(item, data)),
        Some(_) => false,
    }
}

fn in_list(value: Option<&Value>, data: &Value) -> bool {
    data.as_array()
        .map(|candidates| candidates.iter().any(|c| equals(value, c)))
        .unwrap_or(false)
}

/// Numbers compare by value, so `1` equals `1.0`
pub fn values_equal(a: &Value, b: &Value) -> bool {
    compare_values(a, b) == Ordering::Equal
}

fn compare_same_type(value: Option<&Value>, data: &Value) -> Option<Ordering> {
    let value = value?;
    if type_rank(value) != type_rank(data) || value.is_null() {
        return None;
    }
    Some(compare_values(value, data))
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values: null < numbers < strings < objects < arrays < booleans
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| compare_values(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
