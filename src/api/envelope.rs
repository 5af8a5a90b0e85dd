use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Paging data attached to list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        let pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self { page, limit, total, pages }
    }
}

/// The `{code, message, payload?, pagination?}` body every route replies with.
///
/// Field order is fixed by declaration order; absent parts are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl Envelope {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), payload: None, pagination: None }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(200, message)
    }

    pub fn created(message: impl Into<String>) -> Self {
        Self::new(201, message)
    }

    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Pretty-printed JSON text of the envelope
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize response envelope: {}", e);
            "{\n  \"code\": 500,\n  \"message\": \"Failed to serialize response\"\n}".to_string()
        })
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
            self.render(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_code_and_message_only() {
        let text = Envelope::new(400, "Request body cannot be empty").render();
        assert_eq!(text, "{\n  \"code\": 400,\n  \"message\": \"Request body cannot be empty\"\n}");
    }

    #[test]
    fn keeps_field_order_with_payload_and_pagination() {
        let text = Envelope::ok("Houses fetched")
            .with_payload(json!([{"name": "A"}]))
            .with_pagination(Pagination::new(1, 10, 21))
            .render();
        let code = text.find("\"code\"").unwrap();
        let message = text.find("\"message\"").unwrap();
        let payload = text.find("\"payload\"").unwrap();
        let pagination = text.find("\"pagination\"").unwrap();
        assert!(code < message && message < payload && payload < pagination);

        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["pagination"], json!({"page": 1, "limit": 10, "total": 21, "pages": 3}));
    }

    #[test]
    fn rendering_is_deterministic() {
        let envelope = Envelope::created("User created successfully").with_payload(json!({"id": "u1"}));
        assert_eq!(envelope.render(), envelope.clone().render());
    }

    #[test]
    fn status_mirrors_code() {
        let response = Envelope::new(412, "missing").into_response();
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn pages_round_up() {
        assert_eq!(Pagination::new(1, 10, 0).pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).pages, 1);
        assert_eq!(Pagination::new(1, 10, 11).pages, 2);
        assert_eq!(Pagination::new(1, 0, 11).pages, 0);
    }
}
