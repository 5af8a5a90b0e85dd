use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::FilterError;

/// A stored document: a JSON object with unique keys
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "$eq")] Eq,
    #[serde(rename = "$ne")] Ne,
    #[serde(rename = "$gt")] Gt,
    #[serde(rename = "$gte")] Gte,
    #[serde(rename = "$lt")] Lt,
    #[serde(rename = "$lte")] Lte,

    #[serde(rename = "$in")] In,
    #[serde(rename = "$nin")] NIn,

    #[serde(rename = "$exists")] Exists,
}

impl FilterOp {
    pub fn parse(op_key: &str) -> Result<Self, FilterError> {
        Ok(match op_key {
            "$eq" => FilterOp::Eq,
            "$ne" | "$neq" => FilterOp::Ne,
            "$gt" => FilterOp::Gt,
            "$gte" => FilterOp::Gte,
            "$lt" => FilterOp::Lt,
            "$lte" => FilterOp::Lte,
            "$in" => FilterOp::In,
            "$nin" => FilterOp::NIn,
            "$exists" => FilterOp::Exists,
            other => return Err(FilterError::UnsupportedOperator(other.to_string())),
        })
    }
}

/// One `field: {op: data}` term of a filter document
#[derive(Debug, Clone)]
pub struct FilterWhereInfo {
    pub field: String,
    pub operator: FilterOp,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOrderInfo {
    pub field: String,
    pub sort: SortDirection,
}

/// Bind parameter produced by the SQL compilers
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Bound as JSONB
    Json(Value),
    /// Bound as TEXT[] (a JSON path for `#>`)
    Path(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Split a dotted field path, rejecting anything but `[A-Za-z0-9_]` segments
pub fn field_path(field: &str) -> Result<Vec<String>, FilterError> {
    if field.is_empty() {
        return Err(FilterError::InvalidField("Field name cannot be empty".to_string()));
    }
    let mut parts = Vec::new();
    for segment in field.split('.') {
        let valid = !segment.is_empty()
            && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(FilterError::InvalidField(format!("Invalid field name format: {}", field)));
        }
        parts.push(segment.to_string());
    }
    Ok(parts)
}

/// Collections double as table names, so the same identifier rules apply
pub fn validate_collection_name(name: &str) -> Result<(), FilterError> {
    let mut chars = name.chars();
    let first_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !first_ok || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FilterError::InvalidCollectionName(name.to_string()));
    }
    Ok(())
}
