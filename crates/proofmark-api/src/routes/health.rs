use axum::extract::State;
use axum::Json;
use proofmark_core::clock::format_rfc3339;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
    /// Fingerprint of the key currently signing.
    pub signer: String,
    /// `single`, `rotating` or `cutover`.
    pub rotation: &'static str,
    pub registry_configured: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (signer, rotation) = {
        let s = state.ctx.signer();
        (s.fingerprint().to_string(), s.rotation().state_name())
    };
    Json(HealthResponse {
        status: "ok",
        service: "proofmark-api",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: format_rfc3339(state.ctx.now()),
        signer,
        rotation,
        registry_configured: state.registry_configured,
    })
}
