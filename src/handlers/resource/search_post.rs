// handlers/resource/search_post.rs - POST /api/v1/:collection/search

use axum::{
    body::Bytes,
    extract::{Path, State},
};
use serde_json::Value;

use crate::api::Envelope;
use crate::error::ApiError;
use crate::handlers::execute;
use crate::server::AppState;

use super::{documents_to_value, resolve};

/**
 * POST /api/v1/:collection/search - run an aggregation pipeline
 *
 * Body: `{"pipeline": [{"$match": {...}}, {"$sort": {...}}, {"$limit": 10}]}`
 * Stages: $match, $sort, $skip, $limit, $project, $count.
 */
pub async fn search_post(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    raw: Bytes,
) -> Result<Envelope, ApiError> {
    let collection = resolve(&collection)?;
    let action = format!("search{}", collection.noun());
    execute(&action, &raw, &["pipeline"], state.max_body_kb, |mut body| async move {
        let pipeline = match body.remove("pipeline") {
            Some(Value::Array(stages)) => stages,
            _ => return Err(ApiError::bad_request("pipeline must be an array of stages")),
        };
        let docs = state.data.aggregate(collection.name(), pipeline).await?;
        Ok(Envelope::ok(format!("{} search complete", collection.noun())).with_payload(documents_to_value(collection, docs)))
    })
    .await
}
