//! Router construction

use crate::auth::caller_identity_middleware;
use crate::handlers::{documents, health};
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    http::{HeaderName, HeaderValue, Method},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use vitrina_core::Config;

const DEFAULT_MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;
const DEFAULT_CONCURRENCY_LIMIT: usize = 10_000;

/// HTTP-layer knobs taken from `Config`
#[derive(Debug, Clone)]
pub struct RouteOptions {
    pub cors_origins: Vec<String>,
    pub max_request_body_bytes: usize,
    pub concurrency_limit: usize,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            cors_origins: vec!["*".to_string()],
            max_request_body_bytes: DEFAULT_MAX_REQUEST_BODY_BYTES,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

impl RouteOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cors_origins: config.cors_origins().to_vec(),
            max_request_body_bytes: config.max_request_body_bytes,
            ..Self::default()
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static("x-request-id")])
        .max_age(Duration::from_secs(3600))
}

/// Public routes (no caller identity required)
fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
}

/// Document lifecycle routes; every one of them needs `X-User-Id`.
fn document_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/documents/presign", post(documents::presign_document))
        .route("/documents/confirm", post(documents::confirm_document))
        .route("/documents/current", get(documents::current_document))
        .route("/documents/{id}/replace", post(documents::replace_document))
        .route("/documents/{id}/history", get(documents::document_history))
        .route(
            "/documents/{id}/moderation",
            post(documents::moderate_document),
        )
        .route_layer(axum::middleware::from_fn(caller_identity_middleware))
}

pub fn setup_routes(state: Arc<AppState>, options: &RouteOptions) -> Router {
    tracing::info!(
        cors_origins = %options.cors_origins.join(","),
        max_request_body_bytes = options.max_request_body_bytes,
        concurrency_limit = options.concurrency_limit,
        "Configuring HTTP routes"
    );

    public_routes()
        .merge(document_routes())
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(options.concurrency_limit.max(1)))
        .layer(RequestBodyLimitLayer::new(options.max_request_body_bytes))
        .layer(cors_layer(&options.cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
}
