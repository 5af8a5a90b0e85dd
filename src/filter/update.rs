use serde_json::{Map, Number, Value};

use super::error::FilterError;
use super::matcher::lookup;
use super::projection::{insert_path, remove_path};
use super::types::{field_path, Document};

/// A validated update document
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// `{"$set": {...}, "$unset": {...}, "$inc": {...}}`
    Operators {
        set: Vec<(String, Value)>,
        unset: Vec<String>,
        inc: Vec<(String, Number)>,
    },
    /// Whole-document replacement; `_id` is carried over
    Replace(Document),
}

impl Update {
    pub fn parse(update: &Value) -> Result<Self, FilterError> {
        let obj = update
            .as_object()
            .ok_or_else(|| FilterError::InvalidUpdate("update must be an object".to_string()))?;

        let has_operators = obj.keys().any(|k| k.starts_with('$'));
        if !has_operators {
            return Ok(Update::Replace(obj.clone()));
        }

        let mut set = Vec::new();
        let mut unset = Vec::new();
        let mut inc = Vec::new();
        for (op, fields) in obj {
            let fields = match fields {
                Value::Object(fields) if op.starts_with('$') => fields,
                _ if !op.starts_with('$') => {
                    return Err(FilterError::InvalidUpdate(format!(
                        "cannot mix update operators and plain field '{}'",
                        op
                    )))
                }
                _ => return Err(FilterError::InvalidUpdate(format!("{} requires an object", op))),
            };
            for (field, value) in fields {
                field_path(field)?;
                if field == "_id" {
                    return Err(FilterError::InvalidUpdate("_id is immutable".to_string()));
                }
                match op.as_str() {
                    "$set" => set.push((field.clone(), value.clone())),
                    "$unset" => unset.push(field.clone()),
                    "$inc" => match value {
                        Value::Number(n) => inc.push((field.clone(), n.clone())),
                        _ => return Err(FilterError::InvalidUpdate(format!("$inc on '{}' requires a number", field))),
                    },
                    other => return Err(FilterError::UnsupportedOperator(other.to_string())),
                }
            }
        }
        Ok(Update::Operators { set, unset, inc })
    }

    /// Produce the updated copy of `doc`
    pub fn apply(&self, doc: &Document) -> Result<Document, FilterError> {
        match self {
            Update::Replace(replacement) => {
                let mut out = replacement.clone();
                out.remove("_id");
                if let Some(id) = doc.get("_id") {
                    out.insert("_id".to_string(), id.clone());
                }
                Ok(out)
            }
            Update::Operators { set, unset, inc } => {
                let mut out = doc.clone();
                for (field, value) in set {
                    insert_path(&mut out, field, value.clone());
                }
                for field in unset {
                    remove_path(&mut out, field);
                }
                for (field, delta) in inc {
                    let next = match lookup(&out, field) {
                        None | Some(Value::Null) => Value::Number(delta.clone()),
                        Some(Value::Number(current)) => add_numbers(current, delta),
                        Some(_) => {
                            return Err(FilterError::InvalidUpdate(format!(
                                "cannot $inc non-numeric field '{}'",
                                field
                            )))
                        }
                    };
                    insert_path(&mut out, field, next);
                }
                Ok(out)
            }
        }
    }

    /// Document to insert when an upsert finds nothing: `$set`/`$inc` applied to the query's equality fields
    pub fn seed(&self, query: &Value) -> Result<Document, FilterError> {
        let mut base = Map::new();
        if let Value::Object(q) = query {
            for (k, v) in q {
                let is_literal = !k.starts_with('$')
                    && !matches!(v, Value::Object(o) if o.keys().any(|key| key.starts_with('$')));
                if is_literal {
                    insert_path(&mut base, k, v.clone());
                }
            }
        }
        self.apply(&base)
    }
}

fn add_numbers(current: &Number, delta: &Number) -> Value {
    match (current.as_i64(), delta.as_i64()) {
        (Some(a), Some(b)) => match a.checked_add(b) {
            Some(sum) => Value::from(sum),
            None => Value::from(a as f64 + b as f64),
        },
        _ => {
            let sum = current.as_f64().unwrap_or(0.0) + delta.as_f64().unwrap_or(0.0);
            Number::from_f64(sum).map(Value::Number).unwrap_or(Value::Null)
        }
    }
}
