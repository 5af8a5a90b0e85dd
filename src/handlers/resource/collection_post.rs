// handlers/resource/collection_post.rs - POST /api/v1/:collection

use axum::{
    body::Bytes,
    extract::{Path, State},
};
use serde_json::json;

use crate::api::Envelope;
use crate::database::DataAccess;
use crate::error::ApiError;
use crate::filter::Document;
use crate::handlers::execute;
use crate::server::AppState;
use crate::types::Collection;

use super::{prepare_new, resolve};

/// Create one document after checking the collection's required fields
pub async fn collection_post(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    raw: Bytes,
) -> Result<Envelope, ApiError> {
    let collection = resolve(&collection)?;
    let action = format!("create{}", collection.noun());
    execute(&action, &raw, collection.required_fields(), state.max_body_kb, |body| {
        insert(&state.data, collection, body)
    })
    .await
}

async fn insert(data: &DataAccess, collection: Collection, body: Document) -> Result<Envelope, ApiError> {
    let document = prepare_new(collection, body)?;
    let id = data.insert(collection.name(), document).await?;
    Ok(Envelope::created(format!("{} created successfully", collection.noun())).with_payload(json!({ "_id": id })))
}
