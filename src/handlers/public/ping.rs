// handlers/public/ping.rs - GET / and GET /api/v1/

use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::server::AppState;

/// Liveness check; reports the port the listener is actually bound to
pub async fn ping_get(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "message": format!("Server is up and running on port {}", state.port) }))
}
