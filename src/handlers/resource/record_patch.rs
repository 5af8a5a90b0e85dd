// handlers/resource/record_patch.rs - PATCH /api/v1/:collection/:id

use axum::{
    body::Bytes,
    extract::{Path, State},
};
use serde_json::{json, Value};

use crate::api::Envelope;
use crate::error::ApiError;
use crate::handlers::execute;
use crate::server::AppState;

use super::{by_id, hash_secret, resolve, stamp};

/// `$set` the body's fields on one document; replies with the document as it was before
pub async fn record_patch(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    raw: Bytes,
) -> Result<Envelope, ApiError> {
    let collection = resolve(&collection)?;
    let action = format!("update{}", collection.noun());
    execute(&action, &raw, &[], state.max_body_kb, |mut changes| async move {
        hash_secret(&mut changes);
        stamp(&mut changes, "updatedAt");

        let update = json!({ "$set": Value::Object(changes) });
        match state.data.find_one_and_update(collection.name(), by_id(&id), update).await? {
            Some(original) => Ok(Envelope::ok(format!("{} updated", collection.noun()))
                .with_payload(Value::Object(collection.redact(original)))),
            None => Err(ApiError::not_found(format!("{} not found", collection.noun()))),
        }
    })
    .await
}
