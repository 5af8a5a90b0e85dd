// handlers/public/register.rs - POST /api/v1/register

use axum::{body::Bytes, extract::State};

use crate::api::Envelope;
use crate::error::ApiError;
use crate::handlers::execute;
use crate::server::AppState;

use super::user::insert_user;

const REGISTER_FIELDS: &[&str] = &["username", "firstName", "lastName", "email", "phone", "password"];

/// Same contract as `POST /user`, but a password is mandatory
pub async fn register_post(State(state): State<AppState>, raw: Bytes) -> Result<Envelope, ApiError> {
    execute("register", &raw, REGISTER_FIELDS, state.max_body_kb, |body| insert_user(&state.data, body)).await
}
