//! Aggregation pipelines.
//!
//! Supported stages: `$match`, `$sort`, `$skip`, `$limit`, `$project`, `$count`.

use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{Condition, FilterWhere};
use super::matcher::matches;
use super::projection::Projection;
use super::types::{Document, FilterOrderInfo};

#[derive(Debug, Clone)]
pub enum Stage {
    /// Keeps the raw filter so backends can push it down
    Match { raw: Value, condition: Condition },
    Sort(Vec<FilterOrderInfo>),
    Skip(usize),
    Limit(usize),
    Project(Option<Projection>),
    Count(String),
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn parse(pipeline: &[Value]) -> Result<Self, FilterError> {
        let stages = pipeline.iter().map(Self::parse_stage).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { stages })
    }

    fn parse_stage(stage: &Value) -> Result<Stage, FilterError> {
        let obj = stage
            .as_object()
            .filter(|o| o.len() == 1)
            .ok_or_else(|| FilterError::InvalidStage(format!("a stage must have exactly one key: {}", stage)))?;
        let (name, spec) = obj
            .iter()
            .next()
            .ok_or_else(|| FilterError::InvalidStage(stage.to_string()))?;

        match name.as_str() {
            "$match" => Ok(Stage::Match { raw: spec.clone(), condition: FilterWhere::parse(spec)? }),
            "$sort" => Ok(Stage::Sort(FilterOrder::validate_and_parse(spec)?)),
            "$skip" => Ok(Stage::Skip(Self::count_arg(name, spec)?)),
            "$limit" => Ok(Stage::Limit(Self::count_arg(name, spec)?)),
            "$project" => Ok(Stage::Project(Projection::parse(spec)?)),
            "$count" => match spec {
                Value::String(field) if !field.is_empty() && !field.starts_with('$') => Ok(Stage::Count(field.clone())),
                _ => Err(FilterError::InvalidStage("$count requires a field name".to_string())),
            },
            other => Err(FilterError::InvalidStage(format!("unsupported stage {}", other))),
        }
    }

    fn count_arg(name: &str, spec: &Value) -> Result<usize, FilterError> {
        spec.as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| FilterError::InvalidStage(format!("{} requires a non-negative integer", name)))
    }

    /// The filter of a leading `$match`, if any
    pub fn leading_match(&self) -> Option<&Value> {
        match self.stages.first() {
            Some(Stage::Match { raw, .. }) => Some(raw),
            _ => None,
        }
    }

    /// Stages after the leading `$match` (all stages if there is none)
    pub fn without_leading_match(&self) -> Pipeline {
        let skip = usize::from(self.leading_match().is_some());
        Pipeline { stages: self.stages[skip..].to_vec() }
    }

    pub fn run(&self, mut docs: Vec<Document>) -> Vec<Document> {
        for stage in &self.stages {
            docs = match stage {
                Stage::Match { condition, .. } => docs.into_iter().filter(|d| matches(condition, d)).collect(),
                Stage::Sort(infos) => {
                    FilterOrder::sort_documents(&mut docs, infos);
                    docs
                }
                Stage::Skip(n) => docs.into_iter().skip(*n).collect(),
                Stage::Limit(n) => docs.into_iter().take(*n).collect(),
                Stage::Project(Some(projection)) => docs.iter().map(|d| projection.apply(d)).collect(),
                Stage::Project(None) => docs,
                Stage::Count(field) => {
                    // Like Mongo, an empty input yields no count document
                    if docs.is_empty() {
                        docs
                    } else {
                        let mut out = Map::new();
                        out.insert(field.clone(), Value::from(docs.len() as u64));
                        vec![out]
                    }
                }
            };
        }
        docs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payments() -> Vec<Document> {
        vec![
            json!({"_id": "1", "tenant": "a", "amount": 300}),
            json!({"_id": "2", "tenant": "b", "amount": 100}),
            json!({"_id": "3", "tenant": "a", "amount": 200}),
            json!({"_id": "4", "tenant": "a", "amount": 50}),
        ]
        .into_iter()
        .map(|v| v.as_object().cloned().unwrap())
        .collect()
    }

    #[test]
    fn runs_stages_in_order() {
        let pipeline = Pipeline::parse(&[
            json!({"$match": {"tenant": "a"}}),
            json!({"$sort": {"amount": 1}}),
            json!({"$skip": 1}),
            json!({"$limit": 1}),
            json!({"$project": {"amount": 1, "_id": 0}}),
        ])
        .unwrap();
        let out = pipeline.run(payments());
        assert_eq!(out.len(), 1);
        assert_eq!(Value::Object(out[0].clone()), json!({"amount": 200}));
    }

    #[test]
    fn counts_documents() {
        let pipeline = Pipeline::parse(&[json!({"$match": {"tenant": "a"}}), json!({"$count": "total"})]).unwrap();
        let out = pipeline.run(payments());
        assert_eq!(Value::Object(out[0].clone()), json!({"total": 3}));

        let none = Pipeline::parse(&[json!({"$match": {"tenant": "z"}}), json!({"$count": "total"})]).unwrap();
        assert!(none.run(payments()).is_empty());
    }

    #[test]
    fn splits_leading_match() {
        let pipeline = Pipeline::parse(&[json!({"$match": {"tenant": "a"}}), json!({"$limit": 2})]).unwrap();
        assert_eq!(pipeline.leading_match(), Some(&json!({"tenant": "a"})));
        let rest = pipeline.without_leading_match();
        assert!(rest.leading_match().is_none());
        assert_eq!(rest.run(payments()).len(), 2);
    }

    #[test]
    fn rejects_unknown_or_malformed_stages() {
        assert!(Pipeline::parse(&[json!({"$group": {"_id": "$tenant"}})]).is_err());
        assert!(Pipeline::parse(&[json!({"$limit": -1})]).is_err());
        assert!(Pipeline::parse(&[json!({"$match": {}, "$limit": 1})]).is_err());
        assert!(Pipeline::parse(&[json!("$match")]).is_err());
    }
}
