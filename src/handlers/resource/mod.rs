// handlers/resource/mod.rs - Generic collection routes under /api/v1/:collection

pub mod collection_get;
pub mod collection_post;
pub mod record_delete;
pub mod record_get;
pub mod record_patch;
pub mod search_post;

pub use collection_get::collection_get;
pub use collection_post::collection_post;
pub use record_delete::record_delete;
pub use record_get::record_get;
pub use record_patch::record_patch;
pub use search_post::search_post;

use serde_json::{json, Value};

use crate::database::models::{hash_password, UserRecord};
use crate::error::ApiError;
use crate::filter::Document;
use crate::types::Collection;

/// Resolve the `:collection` path segment
pub(crate) fn resolve(segment: &str) -> Result<Collection, ApiError> {
    Collection::parse(segment).ok_or_else(|| ApiError::not_found(format!("Unknown collection '{}'", segment)))
}

pub(crate) fn by_id(id: &str) -> Value {
    json!({ "_id": id })
}

/// Set `field` to the current UTC time
pub(crate) fn stamp(doc: &mut Document, field: &str) {
    doc.insert(field.to_string(), Value::String(chrono::Utc::now().to_rfc3339()));
}

/// Hash a plaintext `password` field in place
pub(crate) fn hash_secret(doc: &mut Document) {
    if let Some(Value::String(plain)) = doc.get("password") {
        let hashed = hash_password(plain);
        doc.insert("password".to_string(), Value::String(hashed));
    }
}

/// Storage form of a new document: users mapped onto their record, secrets hashed, `createdAt` set
pub(crate) fn prepare_new(collection: Collection, body: Document) -> Result<Document, ApiError> {
    let mut document = match collection {
        Collection::Users => UserRecord::from_body(body)?.into_document()?,
        _ => body,
    };
    hash_secret(&mut document);
    if !document.contains_key("createdAt") {
        stamp(&mut document, "createdAt");
    }
    Ok(document)
}

pub(crate) fn documents_to_value(collection: Collection, docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(|d| Value::Object(collection.redact(d))).collect())
}
