// handlers/execute.rs - validate -> one data operation -> envelope

use std::future::Future;

use axum::body::Bytes;
use tracing::{error, info};

use crate::api::Envelope;
use crate::error::ApiError;
use crate::filter::Document;
use crate::middleware::validate_body;

/// Run one body-carrying request through validation and its task.
///
/// Rejections (400/413/412) return before `task` is called; the task's own
/// success or failure becomes the reply.
pub async fn execute<F, Fut>(action: &str, raw: &Bytes, required: &[&str], max_kb: usize, task: F) -> Result<Envelope, ApiError>
where
    F: FnOnce(Document) -> Fut,
    Fut: Future<Output = Result<Envelope, ApiError>>,
{
    info!("{}() -->", action);
    let body = validate_body(raw, required, max_kb)?;

    let result = task(body).await;
    match &result {
        Ok(envelope) => info!("{}() <-- {}", action, envelope.code),
        Err(e) => error!("{}() failed with {}: {}", action, e.status_code(), e),
    }
    result
}
