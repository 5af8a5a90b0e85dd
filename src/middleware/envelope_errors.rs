use axum::{
    body::to_bytes,
    http::header,
    response::{IntoResponse, Response},
};

use crate::api::Envelope;

const MAX_ERROR_BODY: usize = 64 * 1024;

/// Rewrite non-JSON error responses (axum rejections, 405s) as envelopes.
///
/// The original body text becomes the message; an empty body falls back to
/// the status reason phrase.
pub async fn envelope_bare_errors(response: Response) -> Response {
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }

    let (parts, body) = response.into_parts();
    let text = to_bytes(body, MAX_ERROR_BODY)
        .await
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .filter(|text| !text.is_empty());
    let message = text.unwrap_or_else(|| parts.status.canonical_reason().unwrap_or("Request failed").to_string());

    Envelope::new(parts.status.as_u16(), message).into_response()
}
