//! proofmark-api
//!
//! Public verification over HTTP:
//! - `GET /v1/verify?hash=<hex>`
//! - `POST /v1/verify` with `{"hash": ...}` or a multipart `file`
//! - `GET /health`

pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use routes::VerifyResponse;
pub use state::AppState;

const REQUEST_ID: &str = "x-request-id";

/// Largest accepted request body, uploads included.
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub max_body_bytes: usize,
    /// Allowed CORS origins. Empty disables CORS headers; `*` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            cors_origins: Vec::new(),
        }
    }
}

/// Router with state and middleware applied.
pub fn app(state: AppState, http: &HttpConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID);
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id));
    let mut router = routes::router()
        .layer(DefaultBodyLimit::max(http.max_body_bytes))
        .layer(middleware);

    if let Some(cors) = cors_layer(&http.cors_origins) {
        router = router.layer(cors);
    }
    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let allow = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };
    Some(
        CorsLayer::new()
            .allow_origin(allow)
            .allow_methods([Method::GET, Method::POST]),
    )
}
