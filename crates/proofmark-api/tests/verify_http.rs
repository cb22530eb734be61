//! verify_http.rs
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use proofmark_api::{app, AppState, HttpConfig, VerifyResponse};
use proofmark_core::clock::FixedClock;
use proofmark_core::config::{CoreConfig, RegistryConfig};
use proofmark_core::hash::sha256_hex;
use proofmark_core::model::{Metadata, Subject};
use proofmark_core::signer::{Signer, SigningKeyPair};
use proofmark_registry::{ProofIssuer, RegistryContext, VerificationEngine};
use proofmark_store::{MemoryObjectStore, ProofRepositoryRef, SqliteStore};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tower::ServiceExt;

const BOUNDARY: &str = "proofmark-test-boundary";

async fn setup(documents: &[&str]) -> Router {
    let now = OffsetDateTime::from_unix_timestamp(1_760_000_000).unwrap();
    let cfg = CoreConfig {
        registry: RegistryConfig::new("eu-west-1", "proofmark-test", "prod"),
        ..CoreConfig::default()
    };
    let ctx = RegistryContext::new(cfg, Signer::single(SigningKeyPair::from_bytes(&[5; 32])), Arc::new(FixedClock(now))).unwrap();
    let repo: ProofRepositoryRef = Arc::new(SqliteStore::open_in_memory().unwrap());

    let issuer = ProofIssuer::new(ctx.clone(), repo.clone());
    for doc in documents {
        issuer
            .issue_bytes(doc.as_bytes(), Subject::new("file", "default", *doc), Metadata::new(), None)
            .await
            .unwrap();
    }

    let engine = VerificationEngine::new(ctx.clone(), Some(Arc::new(MemoryObjectStore::new())), repo);
    app(AppState::new(ctx, engine, true), &HttpConfig::default())
}

async fn send(router: Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn multipart(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n").as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/v1/verify")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn get_with_known_hash_is_valid() {
    let router = setup(&["contract.pdf"]).await;
    let uri = format!("/v1/verify?hash={}", sha256_hex(b"contract.pdf"));
    let (status, body) = send(router, Request::get(uri).body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let out: VerifyResponse = serde_json::from_value(body.clone()).unwrap();
    assert!(out.valid, "{:?}", out.errors);
    assert_eq!(out.issued_at.as_deref(), Some("2025-10-09T08:53:20Z"));
    assert!(body.get("source").is_none());
}

#[tokio::test]
async fn unknown_hash_is_still_200() {
    let router = setup(&[]).await;
    let uri = format!("/v1/verify?hash={}", sha256_hex(b"nothing"));
    let (status, body) = send(router, Request::get(uri).body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(false));
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn get_without_hash_is_400() {
    let router = setup(&[]).await;
    let (status, body) = send(router, Request::get("/v1/verify").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Hash parameter or file is required"}));
}

#[tokio::test]
async fn post_json_hash() {
    let router = setup(&["contract.pdf"]).await;
    let req = Request::post("/v1/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"hash": sha256_hex(b"contract.pdf").to_string()}).to_string()))
        .unwrap();
    let (status, body) = send(router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(true));
}

#[tokio::test]
async fn post_without_input_is_400() {
    let router = setup(&[]).await;
    let req = Request::post("/v1/verify").body(Body::empty()).unwrap();
    let (status, body) = send(router.clone(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Hash parameter or file is required"));

    let req = Request::post("/v1/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, body) = send(router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Hash parameter or file is required"));
}

#[tokio::test]
async fn multipart_upload_is_hashed_and_verified() {
    let router = setup(&["contract.pdf"]).await;
    let (status, body) = send(router, multipart("file", "contract.pdf", b"contract.pdf")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], json!(true), "{body}");
}

#[tokio::test]
async fn multipart_without_file_field_is_400() {
    let router = setup(&[]).await;
    let (status, body) = send(router, multipart("attachment", "x.bin", b"abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "File is required for file-based verification"}));
}

#[tokio::test]
async fn malformed_hash_reports_in_body() {
    let router = setup(&[]).await;
    let (status, body) = send(router, Request::get("/v1/verify?hash=xyz").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["errors"], json!(["Invalid hash format"]));
}

#[tokio::test]
async fn health_reports_signer() {
    let router = setup(&[]).await;
    let (status, body) = send(router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
    assert_eq!(body["rotation"], json!("single"));
    assert_eq!(
        body["signer"],
        json!(SigningKeyPair::from_bytes(&[5; 32]).fingerprint().to_string())
    );
}
