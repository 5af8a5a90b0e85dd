use axum::body::Bytes;
use serde_json::Value;
use tracing::warn;

use crate::error::ApiError;
use crate::filter::Document;

/// True when every required field is a key of `body`.
///
/// No required fields always passes; an empty body fails otherwise.
/// Only presence is checked, so `null` values count.
pub fn has_values(body: &Document, required: &[&str]) -> bool {
    if required.is_empty() {
        return true;
    }
    if body.is_empty() {
        return false;
    }
    required.iter().all(|field| body.contains_key(*field))
}

/// Size of the compact JSON encoding in whole KB
pub fn body_size_kb(body: &Document) -> usize {
    serde_json::to_vec(body).map(|bytes| bytes.len()).unwrap_or(0) / 1024
}

/// Parse and validate a request body: empty check, then size ceiling, then required fields.
pub fn validate_body(raw: &Bytes, required: &[&str], max_kb: usize) -> Result<Document, ApiError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        warn!("Rejected request: empty body");
        return Err(ApiError::bad_request("Request body cannot be empty"));
    }

    let body = match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(body)) => body,
        _ => {
            warn!("Rejected request: body is not a JSON object");
            return Err(ApiError::bad_request("Request body must be a JSON object"));
        }
    };
    if body.is_empty() {
        warn!("Rejected request: empty body");
        return Err(ApiError::bad_request("Request body cannot be empty"));
    }

    let size = body_size_kb(&body);
    if size > max_kb {
        warn!("Rejected request: body of {} KBs exceeds {} KBs", size, max_kb);
        return Err(ApiError::payload_too_large(format!("Request body too large -> [{} KBs]", size)));
    }

    if !has_values(&body, required) {
        let message = missing_fields_message(&body, required);
        warn!("Rejected request: {}", message);
        return Err(ApiError::precondition_failed(message));
    }

    Ok(body)
}

fn missing_fields_message(body: &Document, required: &[&str]) -> String {
    let mut received: Vec<&str> = body.keys().map(String::as_str).collect();
    received.sort_unstable();
    let missing: Vec<&str> = required.iter().copied().filter(|f| !body.contains_key(*f)).collect();
    format!(
        "Expected fields [{}], but only got [{}]; missing [{}]",
        required.join(", "),
        received.join(", "),
        missing.join(", ")
    )
}
