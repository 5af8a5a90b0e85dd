// handlers/resource/collection_get.rs - GET /api/v1/:collection

use axum::extract::{Path, RawQuery, State};
use serde_json::{json, Value};
use tracing::info;

use crate::api::{context_params, Envelope, Pagination};
use crate::database::FindOptions;
use crate::error::ApiError;
use crate::server::AppState;

use super::{documents_to_value, resolve};

const DEFAULT_LIMIT: u64 = 20;
const MAX_LIMIT: u64 = 100;

/// List one page of a collection.
///
/// Query: `page` (from 1), `limit` (1-100, default 20), `sort` (e.g. `rent desc, name`).
/// Runs a count, then the paged find.
pub async fn collection_get(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Envelope, ApiError> {
    let collection = resolve(&collection)?;
    info!("listRecords() --> {}", collection);

    let params = context_params(query.as_deref());
    let page = parse_number(params.get("page"), "page", 1)?.max(1);
    let limit = parse_number(params.get("limit"), "limit", DEFAULT_LIMIT)?.clamp(1, MAX_LIMIT);

    let mut options = FindOptions::page(page, limit);
    if let Some(sort) = params.get("sort").filter(|s| !s.trim().is_empty()) {
        options = options.with_sort(Value::String(sort.clone()));
    }

    let total = state.data.count(collection.name(), json!({})).await?;
    let docs = state.data.find_with_options(collection.name(), json!({}), options).await?;

    info!("listRecords() <-- {} ({} of {})", collection, docs.len(), total);
    Ok(Envelope::ok(format!("{} records fetched", collection.noun()))
        .with_payload(documents_to_value(collection, docs))
        .with_pagination(Pagination::new(page, limit, total)))
}

fn parse_number(raw: Option<&String>, name: &str, default: u64) -> Result<u64, ApiError> {
    match raw.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|_| ApiError::bad_request(format!("Query parameter '{}' must be a positive integer", name))),
    }
}
