//! `GET /v1/verify?hash=<hex>` and `POST /v1/verify`.
//!
//! POST accepts a JSON body `{"hash": "<hex>"}` or a multipart form with a
//! `file` field. Uploads are hashed chunk by chunk as they arrive.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::header;
use axum::Json;
use proofmark_core::hash::StreamingHasher;
use proofmark_core::verify::VerifyOutcome;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ApiError, FILE_REQUIRED, HASH_OR_FILE_REQUIRED};
use crate::state::AppState;

const FILE_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    pub hash: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyBody {
    pub hash: Option<String>,
}

/// Wire shape of a completed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub signer: Option<String>,
    pub issued_at: Option<String>,
    pub latency_ms: u64,
    pub errors: Vec<String>,
}

impl From<VerifyOutcome> for VerifyResponse {
    fn from(o: VerifyOutcome) -> Self {
        Self {
            valid: o.valid,
            signer: o.signer,
            issued_at: o.issued_at,
            latency_ms: o.latency_ms,
            errors: o.errors,
        }
    }
}

pub async fn verify_get(
    State(state): State<AppState>,
    Query(q): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let hash = non_empty(q.hash).ok_or_else(|| ApiError::bad_request(HASH_OR_FILE_REQUIRED))?;
    Ok(Json(respond(state.engine.verify_hash(&hash).await)))
}

pub async fn verify_post(State(state): State<AppState>, req: Request) -> Result<Json<VerifyResponse>, ApiError> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        return verify_upload(&state, multipart).await;
    }

    let body = Bytes::from_request(req, &state)
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?;
    let parsed = if body.iter().all(u8::is_ascii_whitespace) {
        VerifyBody::default()
    } else {
        serde_json::from_slice::<VerifyBody>(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?
    };
    let hash = non_empty(parsed.hash).ok_or_else(|| ApiError::bad_request(HASH_OR_FILE_REQUIRED))?;
    Ok(Json(respond(state.engine.verify_hash(&hash).await)))
}

async fn verify_upload(state: &AppState, mut multipart: Multipart) -> Result<Json<VerifyResponse>, ApiError> {
    let started = Instant::now();
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let mut hasher = StreamingHasher::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?
        {
            hasher.update(&chunk);
        }
        debug!(bytes = hasher.bytes_seen(), filename = field.file_name().unwrap_or(""), "upload hashed");

        let out = state.engine.verify_digest(&hasher.finalize()).await;
        let latency = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        return Ok(Json(respond(out.with_latency(latency))));
    }
    Err(ApiError::bad_request(FILE_REQUIRED))
}

fn respond(out: VerifyOutcome) -> VerifyResponse {
    info!(
        valid = out.valid,
        source = out.source.as_deref().unwrap_or("none"),
        latency_ms = out.latency_ms,
        "verification completed"
    );
    out.into()
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}
