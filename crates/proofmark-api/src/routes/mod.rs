use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod verify;

pub use verify::VerifyResponse;

/// Build the route table. Layers are added by `crate::app`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/verify", get(verify::verify_get).post(verify::verify_post))
        .route("/health", get(health::health))
}
