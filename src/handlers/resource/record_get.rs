// handlers/resource/record_get.rs - GET /api/v1/:collection/:id

use axum::extract::{Path, State};
use serde_json::Value;

use crate::api::Envelope;
use crate::error::ApiError;
use crate::server::AppState;

use super::{by_id, resolve};

pub async fn record_get(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Envelope, ApiError> {
    let collection = resolve(&collection)?;
    match state.data.find_one(collection.name(), by_id(&id), None).await? {
        Some(doc) => Ok(Envelope::ok(format!("{} fetched", collection.noun())).with_payload(Value::Object(collection.redact(doc)))),
        None => Err(ApiError::not_found(format!("{} not found", collection.noun()))),
    }
}
