use serde_json::{Map, Value};

use super::error::FilterError;
use super::matcher::lookup;
use super::types::{field_path, Document};

/// A validated projection document: `{"email": 1}` or `{"password": 0}`
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Include { fields: Vec<String>, include_id: bool },
    Exclude(Vec<String>),
}

impl Projection {
    /// `None` for an absent or empty projection (return whole documents)
    pub fn parse(spec: &Value) -> Result<Option<Self>, FilterError> {
        let obj = match spec {
            Value::Null => return Ok(None),
            Value::Object(obj) if obj.is_empty() => return Ok(None),
            Value::Object(obj) => obj,
            other => return Err(FilterError::InvalidQuery(format!("projection must be an object, got {}", other))),
        };

        let mut include = Vec::new();
        let mut exclude = Vec::new();
        let mut include_id = true;
        for (field, flag) in obj {
            field_path(field)?;
            let on = match flag {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
                other => return Err(FilterError::InvalidQuery(format!("projection flag for '{}' must be 0/1, got {}", field, other))),
            };
            if field == "_id" {
                include_id = on;
                continue;
            }
            if on { include.push(field.clone()) } else { exclude.push(field.clone()) }
        }

        match (include.is_empty(), exclude.is_empty()) {
            (false, false) => Err(FilterError::InvalidQuery(
                "projection cannot mix inclusion and exclusion".to_string(),
            )),
            (false, true) => Ok(Some(Projection::Include { fields: include, include_id })),
            (true, _) => {
                if !include_id {
                    exclude.push("_id".to_string());
                }
                if exclude.is_empty() {
                    // only `{"_id": 1}`
                    return Ok(Some(Projection::Include { fields: vec![], include_id: true }));
                }
                Ok(Some(Projection::Exclude(exclude)))
            }
        }
    }

    pub fn apply(&self, doc: &Document) -> Document {
        match self {
            Projection::Include { fields, include_id } => {
                let mut out = Map::new();
                if *include_id {
                    if let Some(id) = doc.get("_id") {
                        out.insert("_id".to_string(), id.clone());
                    }
                }
                for field in fields {
                    if let Some(value) = lookup(doc, field) {
                        insert_path(&mut out, field, value.clone());
                    }
                }
                out
            }
            Projection::Exclude(fields) => {
                let mut out = doc.clone();
                for field in fields {
                    remove_path(&mut out, field);
                }
                out
            }
        }
    }
}

pub(crate) fn insert_path(doc: &mut Document, field: &str, value: Value) {
    let mut parts: Vec<&str> = field.split('.').collect();
    let last = parts.pop().unwrap_or(field);
    let mut current = doc;
    for part in parts {
        let entry = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
    current.insert(last.to_string(), value);
}

pub(crate) fn remove_path(doc: &mut Document, field: &str) -> Option<Value> {
    let mut parts: Vec<&str> = field.split('.').collect();
    let last = parts.pop()?;
    let mut current = doc;
    for part in parts {
        current = match current.get_mut(part) {
            Some(Value::Object(map)) => map,
            _ => return None,
        };
    }
    current.remove(last)
}
