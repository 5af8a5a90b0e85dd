// handlers/resource/record_delete.rs - DELETE /api/v1/:collection/:id

use axum::extract::{Path, State};
use serde_json::Value;

use crate::api::Envelope;
use crate::error::ApiError;
use crate::server::AppState;

use super::{by_id, resolve};

pub async fn record_delete(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Envelope, ApiError> {
    let collection = resolve(&collection)?;
    match state.data.find_one_and_delete(collection.name(), by_id(&id)).await? {
        Some(doc) => Ok(Envelope::ok(format!("{} deleted", collection.noun())).with_payload(Value::Object(collection.redact(doc)))),
        None => Err(ApiError::not_found(format!("{} not found", collection.noun()))),
    }
}
