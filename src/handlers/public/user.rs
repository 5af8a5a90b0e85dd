// handlers/public/user.rs - POST /user

use axum::{body::Bytes, extract::State};

use crate::api::Envelope;
use crate::database::DataAccess;
use crate::error::ApiError;
use crate::filter::Document;
use crate::handlers::execute;
use crate::handlers::resource::prepare_new;
use crate::server::AppState;
use crate::types::Collection;

/// POST /user - create a user from a validated body
pub async fn user_post(State(state): State<AppState>, raw: Bytes) -> Result<Envelope, ApiError> {
    execute("createUser", &raw, Collection::Users.required_fields(), state.max_body_kb, |body| {
        insert_user(&state.data, body)
    })
    .await
}

/// Map the body onto a user record and insert it
pub(crate) async fn insert_user(data: &DataAccess, body: Document) -> Result<Envelope, ApiError> {
    let document = prepare_new(Collection::Users, body)?;
    data.insert(Collection::Users.name(), document).await?;
    Ok(Envelope::created("User created successfully"))
}
