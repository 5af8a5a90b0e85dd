use serde_json::Value;

use super::error::FilterError;
use super::types::{field_path, FilterOp, FilterWhereInfo, SqlParam};

/// Parsed filter document
#[derive(Debug, Clone)]
pub enum Condition {
    /// Implicit conjunction of a filter object, or `$and`
    All(Vec<Condition>),
    /// `$or`
    Any(Vec<Condition>),
    /// `$not`
    Not(Box<Condition>),
    Field(FilterWhereInfo),
}

impl Condition {
    pub fn always() -> Self {
        Condition::All(vec![])
    }
}

/// Compiles filter documents to SQL over a `doc JSONB` column
pub struct FilterWhere {
    param_values: Vec<SqlParam>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Parse and compile `where_data`, numbering placeholders after `starting_param_index`
    pub fn generate(where_data: &Value, starting_param_index: usize) -> Result<(String, Vec<SqlParam>), FilterError> {
        let condition = Self::parse(where_data)?;
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.build_sql_condition(&condition);
        Ok((sql, filter_where.param_values))
    }

    pub fn parse(where_data: &Value) -> Result<Condition, FilterError> {
        match where_data {
            Value::Null => Ok(Condition::always()),
            Value::Object(obj) => {
                let mut conditions = Vec::new();
                for (key, value) in obj {
                    if key.starts_with('$') {
                        conditions.push(Self::parse_logical_operator(key, value)?);
                    } else {
                        conditions.extend(Self::parse_field_condition(key, value)?);
                    }
                }
                Ok(Condition::All(conditions))
            }
            _ => Err(FilterError::InvalidQuery("Query must be a JSON object".to_string())),
        }
    }

    fn parse_logical_operator(op: &str, value: &Value) -> Result<Condition, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .filter(|arr| !arr.is_empty())
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires a non-empty array", op)))?;
                let parts = arr.iter().map(Self::parse).collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { Condition::All(parts) } else { Condition::Any(parts) })
            }
            "$not" => Ok(Condition::Not(Box::new(Self::parse(value)?))),
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<Condition>, FilterError> {
        field_path(field)?;

        let operators = match value {
            Value::Object(obj) if obj.keys().any(|k| k.starts_with('$')) => obj,
            // Implicit equality: { field: value }
            _ => {
                return Ok(vec![Condition::Field(FilterWhereInfo {
                    field: field.to_string(),
                    operator: FilterOp::Eq,
                    data: value.clone(),
                })])
            }
        };

        let mut out = Vec::new();
        for (op_key, op_val) in operators {
            if !op_key.starts_with('$') {
                return Err(FilterError::InvalidOperatorData(format!(
                    "Cannot mix operators and fields under '{}'",
                    field
                )));
            }
            let operator = FilterOp::parse(op_key)?;
            match operator {
                FilterOp::In | FilterOp::NIn if !op_val.is_array() => {
                    return Err(FilterError::InvalidOperatorData(format!("{} requires an array", op_key)));
                }
                FilterOp::Exists if !op_val.is_boolean() => {
                    return Err(FilterError::InvalidOperatorData("$exists requires a boolean".to_string()));
                }
                _ => {}
            }
            out.push(Condition::Field(FilterWhereInfo {
                field: field.to_string(),
                operator,
                data: op_val.clone(),
            }));
        }
        Ok(out)
    }

    fn build_sql_condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::All(parts) if parts.is_empty() => "TRUE".to_string(),
            Condition::All(parts) => self.join(parts, " AND "),
            Condition::Any(parts) if parts.is_empty() => "FALSE".to_string(),
            Condition::Any(parts) => self.join(parts, " OR "),
            Condition::Not(inner) => format!("NOT ({})", self.build_sql_condition(inner)),
            Condition::Field(info) => self.build_field_condition(info),
        }
    }

    fn join(&mut self, parts: &[Condition], joiner: &str) -> String {
        let sql_parts: Vec<String> = parts
            .iter()
            .map(|part| format!("({})", self.build_sql_condition(part)))
            .collect();
        sql_parts.join(joiner)
    }

    fn build_field_condition(&mut self, info: &FilterWhereInfo) -> String {
        let empty_list = info.data.as_array().is_some_and(|values| values.is_empty());
        match info.operator {
            FilterOp::In if empty_list => return "FALSE".to_string(),
            FilterOp::NIn if empty_list => return "TRUE".to_string(),
            _ => {}
        }

        // field_path already validated during parse
        let path = info.field.split('.').map(str::to_string).collect::<Vec<_>>();
        let column = format!("doc #> {}", self.param(SqlParam::Path(path)));

        match info.operator {
            FilterOp::Eq => self.equality(&column, &info.data),
            FilterOp::Ne => format!("NOT ({})", self.equality(&column, &info.data)),
            FilterOp::Gt => self.comparison(&column, ">", &info.data),
            FilterOp::Gte => self.comparison(&column, ">=", &info.data),
            FilterOp::Lt => self.comparison(&column, "<", &info.data),
            FilterOp::Lte => self.comparison(&column, "<=", &info.data),
            FilterOp::In => self.membership(&column, &info.data),
            FilterOp::NIn => format!("NOT ({})", self.membership(&column, &info.data)),
            FilterOp::Exists => {
                if info.data.as_bool().unwrap_or(true) {
                    format!("({}) IS NOT NULL", column)
                } else {
                    format!("({}) IS NULL", column)
                }
            }
        }
    }

    fn equality(&mut self, column: &str, data: &Value) -> String {
        if data.is_null() {
            return format!("(({0}) IS NULL OR {0} = 'null'::jsonb)", column);
        }
        let p = self.param(SqlParam::Json(data.clone()));
        format!(
            "COALESCE({0} = {1} OR (jsonb_typeof({0}) = 'array' AND {0} @> jsonb_build_array({1})), FALSE)",
            column, p
        )
    }

    fn comparison(&mut self, column: &str, op: &str, data: &Value) -> String {
        let p = self.param(SqlParam::Json(data.clone()));
        format!(
            "COALESCE(jsonb_typeof({0}) = jsonb_typeof({1}) AND {0} {2} {1}, FALSE)",
            column, p, op
        )
    }

    fn membership(&mut self, column: &str, data: &Value) -> String {
        let values = data.as_array().cloned().unwrap_or_default();
        let parts: Vec<String> = values
            .iter()
            .map(|v| format!("({})", self.equality(column, v)))
            .collect();
        parts.join(" OR ")
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_query_matches_everything() {
        let (sql, params) = FilterWhere::generate(&json!({}), 0).unwrap();
        assert_eq!(sql, "TRUE");
        assert!(params.is_empty());

        let (sql, _) = FilterWhere::generate(&Value::Null, 0).unwrap();
        assert_eq!(sql, "TRUE");
    }

    #[test]
    fn implicit_equality_binds_path_and_value() {
        let (sql, params) = FilterWhere::generate(&json!({"username": "jo"}), 0).unwrap();
        assert!(sql.starts_with("(COALESCE(doc #> $1 = $2"));
        assert_eq!(
            params,
            vec![SqlParam::Path(vec!["username".into()]), SqlParam::Json(json!("jo"))]
        );
    }

    #[test]
    fn numbering_continues_from_offset() {
        let (sql, params) = FilterWhere::generate(&json!({"age": {"$gte": 18}}), 3).unwrap();
        assert!(sql.contains("doc #> $4"));
        assert!(sql.contains("$5"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn logical_operators_nest() {
        let q = json!({"$or": [{"city": "Nairobi"}, {"rent": {"$lt": 100}}]});
        let (sql, params) = FilterWhere::generate(&q, 0).unwrap();
        assert!(sql.contains(" OR "));
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(FilterWhere::parse(&json!([1, 2])).is_err());
        assert!(FilterWhere::parse(&json!({"$or": []})).is_err());
        assert!(FilterWhere::parse(&json!({"a": {"$in": 3}})).is_err());
        assert!(FilterWhere::parse(&json!({"a": {"$regex": "x"}})).is_err());
        assert!(FilterWhere::parse(&json!({"a": {"$gt": 1, "b": 2}})).is_err());
        assert!(FilterWhere::parse(&json!({"bad field": 1})).is_err());
    }

    #[test]
    fn empty_in_list_is_false() {
        let (sql, params) = FilterWhere::generate(&json!({"a": {"$in": []}}), 0).unwrap();
        assert_eq!(sql, "(FALSE)");
        assert!(params.is_empty());
    }
}
