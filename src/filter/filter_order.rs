use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::matcher::{compare_values, lookup};
use super::types::{field_path, Document, FilterOrderInfo, SortDirection, SqlParam};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `{"rent": -1, "name": "asc"}`, `"rent desc, name"` or `["rent desc", "name"]`
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let infos = match order {
            Value::Null => vec![],
            Value::String(s) => Self::parse_order_string(s)?,
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    let s = v
                        .as_str()
                        .ok_or_else(|| FilterError::InvalidSort("array entries must be strings".to_string()))?;
                    out.extend(Self::parse_order_string(s)?);
                }
                out
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (k, v) in obj {
                    out.push(FilterOrderInfo { field: k.clone(), sort: Self::parse_direction(v)? });
                }
                out
            }
            _ => return Err(FilterError::InvalidSort(order.to_string())),
        };

        for info in &infos {
            field_path(&info.field)?;
        }
        Ok(infos)
    }

    fn parse_direction(v: &Value) -> Result<SortDirection, FilterError> {
        match v {
            Value::Number(n) if n.as_i64() == Some(1) => Ok(SortDirection::Asc),
            Value::Number(n) if n.as_i64() == Some(-1) => Ok(SortDirection::Desc),
            Value::String(s) if s.eq_ignore_ascii_case("asc") => Ok(SortDirection::Asc),
            Value::String(s) if s.eq_ignore_ascii_case("desc") => Ok(SortDirection::Desc),
            other => Err(FilterError::InvalidSort(format!("unknown direction {}", other))),
        }
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        // split on commas, then each token into field and direction
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let mut it = trimmed.split_whitespace();
            if let Some(field) = it.next() {
                let dir = it.next().unwrap_or("asc");
                let sort = Self::parse_direction(&Value::String(dir.to_string()))?;
                out.push(FilterOrderInfo { field: field.to_string(), sort });
            }
        }
        Ok(out)
    }

    /// `ORDER BY` over the JSONB column; placeholders continue after `starting_param_index`
    pub fn generate(infos: &[FilterOrderInfo], starting_param_index: usize) -> (String, Vec<SqlParam>) {
        if infos.is_empty() { return (String::new(), vec![]); }
        let mut params = Vec::new();
        let parts: Vec<String> = infos
            .iter()
            .enumerate()
            .map(|(i, info)| {
                params.push(SqlParam::Path(info.field.split('.').map(str::to_string).collect()));
                format!("doc #> ${} {}", starting_param_index + i + 1, info.sort.to_sql())
            })
            .collect();
        (format!("ORDER BY {}", parts.join(", ")), params)
    }

    /// Stable in-memory sort; missing fields order as null
    pub fn sort_documents(docs: &mut [Document], infos: &[FilterOrderInfo]) {
        if infos.is_empty() { return; }
        docs.sort_by(|a, b| {
            for info in infos {
                let left = lookup(a, &info.field).unwrap_or(&Value::Null);
                let right = lookup(b, &info.field).unwrap_or(&Value::Null);
                let ord = match info.sort {
                    SortDirection::Asc => compare_values(left, right),
                    SortDirection::Desc => compare_values(right, left),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
}
