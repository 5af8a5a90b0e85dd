use axum::{
    http::{header, HeaderName, Method},
    middleware::map_response,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::Envelope;
use crate::database::DataAccess;
use crate::handlers::{public, resource};
use crate::middleware::envelope_bare_errors;

/// Shared per-process state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub data: DataAccess,
    /// Port the listener is bound to
    pub port: u16,
    /// Request body ceiling in KB
    pub max_body_kb: usize,
}

pub fn app(state: AppState, request_logging: bool) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(public::ping_get))
        .route("/api/v1/", get(public::ping_get))
        .route("/user", post(public::user_post))
        .route("/api/v1/register", post(public::register_post))
        .route("/api/v1/login", post(public::login_post))
        // Collections
        .merge(resource_routes())
        .fallback(not_found)
        .with_state(state)
        // Global middleware
        .layer(map_response(envelope_bare_errors))
        .layer(cors());

    if request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn resource_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/:collection",
            get(resource::collection_get).post(resource::collection_post),
        )
        .route("/api/v1/:collection/search", post(resource::search_post))
        .route(
            "/api/v1/:collection/:id",
            get(resource::record_get)
                .patch(resource::record_patch)
                .delete(resource::record_delete),
        )
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::PUT, Method::DELETE, Method::PATCH])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("access-control-allow-origin")])
}

async fn not_found() -> Envelope {
    Envelope::new(404, "Route not found")
}
