// handlers/public/login.rs - POST /api/v1/login

use axum::{body::Bytes, extract::State};

use crate::api::Envelope;
use crate::error::ApiError;
use crate::handlers::execute;
use crate::server::AppState;

const LOGIN_FIELDS: &[&str] = &["username", "password"];

/**
 * POST /api/v1/login - credential check placeholder
 *
 * The body is validated like every other route so clients get the usual
 * 400/412 answers, then the request is refused with 501: sessions and
 * tokens are not issued by this service.
 */
pub async fn login_post(State(state): State<AppState>, raw: Bytes) -> Result<Envelope, ApiError> {
    execute("login", &raw, LOGIN_FIELDS, state.max_body_kb, |_| async {
        Err(ApiError::not_implemented("Login is not available yet"))
    })
    .await
}
