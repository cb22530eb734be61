//! verify_engine.rs
//!
//! Registry-first verification with database fallback, timestamp tolerance,
//! tamper detection and timeouts.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proofmark_core::config::CoreConfig;
use proofmark_core::hash::sha256_hex;
use proofmark_registry::VerificationEngine;
use proofmark_store::{ObjectStore, StoreResult};
use time::Duration as TimeDuration;

use common::{config, key, proof_key, t0, Harness};

#[tokio::test]
async fn published_proof_verifies_from_registry() {
    let h = Harness::new();
    let issued = h.issue("report.pdf").await;
    h.publisher().publish(1, &[issued.proof.clone()]).await.unwrap();

    let out = h.engine().verify_hash(issued.proof.hash_full.as_str()).await;
    assert!(out.valid, "{:?}", out.errors);
    assert_eq!(out.source.as_deref(), Some("registry"));
    assert_eq!(out.signer.as_deref(), Some(key().fingerprint().as_str()));
    assert_eq!(out.issued_at.as_deref(), Some(issued.proof.signed_at.as_str()));
    assert!(out.errors.is_empty());
}

#[tokio::test]
async fn unpublished_proof_falls_back_to_database() {
    let h = Harness::new();
    let issued = h.issue("report.pdf").await;

    let out = h.engine().verify_bytes(b"report.pdf").await;
    assert!(out.valid, "{:?}", out.errors);
    assert_eq!(out.source.as_deref(), Some("database"));
    assert_eq!(out.signer.as_deref(), Some(issued.proof.signer_fingerprint.as_str()));
}

#[tokio::test]
async fn user_input_is_trimmed_and_lowercased() {
    let h = Harness::new();
    let issued = h.issue("report.pdf").await;
    let input = format!("  {}\n", issued.proof.hash_full.as_str().to_uppercase());
    assert!(h.engine().verify_hash(&input).await.valid);
}

#[tokio::test]
async fn flipped_signature_is_detected() {
    let h = Harness::new();
    let issued = h.issue("report.pdf").await;
    let mut tampered = issued.proof.clone();
    let first = if tampered.signature.starts_with('A') { "B" } else { "A" };
    tampered.signature.replace_range(..1, first);
    h.registry.insert_raw(
        proof_key(&tampered.hash_full),
        h.ctx.codec().to_json_bytes(&tampered).unwrap(),
    );

    let out = h.engine().verify_hash(tampered.hash_full.as_str()).await;
    assert!(!out.valid);
    assert_eq!(out.errors, vec!["Signature verification failed".to_string()]);
    assert!(out.issued_at.is_some());
}

#[tokio::test]
async fn timestamp_tolerance_is_enforced() {
    let h = Harness::new();
    let issued = h.issue("report.pdf").await;
    let hash = issued.proof.hash_full.as_str().to_string();

    let late = h.at(t0() + TimeDuration::hours(25)).engine().verify_hash(&hash).await;
    assert!(!late.valid);
    assert_eq!(late.errors, vec!["Timestamp outside tolerance window (25h > 24h)".to_string()]);

    let fine = h.at(t0() + TimeDuration::hours(23)).engine().verify_hash(&hash).await;
    assert!(fine.valid, "{:?}", fine.errors);

    let early = h.at(t0() - TimeDuration::hours(25)).engine().verify_hash(&hash).await;
    assert!(!early.valid);
}

#[tokio::test]
async fn unknown_hash_reports_both_sources_registry_first() {
    let h = Harness::new();
    let out = h.engine().verify_hash(sha256_hex(b"never issued").as_str()).await;
    assert!(!out.valid);
    assert_eq!(
        out.errors,
        vec![
            "Proof not found in registry".to_string(),
            "Proof not found in database".to_string()
        ]
    );
    assert!(out.signer.is_none());
}

#[tokio::test]
async fn partial_registry_config_skips_the_registry() {
    let mut cfg = config();
    cfg.registry.bucket = None;
    let h = Harness::with_config(cfg, t0());
    let issued = h.issue("report.pdf").await;
    h.registry.insert_raw(
        proof_key(&issued.proof.hash_full),
        h.ctx.codec().to_json_bytes(&issued.proof).unwrap(),
    );

    let out = h.engine().verify_hash(issued.proof.hash_full.as_str()).await;
    assert!(out.valid, "{:?}", out.errors);
    assert_eq!(out.source.as_deref(), Some("database"));

    let out = h.engine().verify_hash(sha256_hex(b"never issued").as_str()).await;
    assert_eq!(out.errors[0], "Registry not configured");
}

#[tokio::test]
async fn registry_outage_folds_into_errors() {
    let h = Harness::new();
    h.registry.fail_reads(true);
    let out = h.engine().verify_hash(sha256_hex(b"x").as_str()).await;
    assert_eq!(out.errors.len(), 2);
    assert!(out.errors[0].starts_with("Registry lookup failed"), "{}", out.errors[0]);

    // the database still answers for issued proofs
    let issued = h.issue("report.pdf").await;
    let out = h.engine().verify_hash(issued.proof.hash_full.as_str()).await;
    assert!(out.valid);
    assert_eq!(out.source.as_deref(), Some("database"));
}

#[tokio::test]
async fn malformed_hash_is_reported() {
    let h = Harness::new();
    let out = h.engine().verify_hash("not-a-hash").await;
    assert!(!out.valid);
    assert_eq!(out.errors, vec!["Invalid hash format".to_string()]);
}

#[tokio::test]
async fn reader_uploads_hash_like_bytes() {
    let h = Harness::new();
    h.issue("streamed").await;
    let out = h.engine().verify_reader(&b"streamed"[..]).await;
    assert!(out.valid, "{:?}", out.errors);
}

#[tokio::test]
async fn proofs_survive_key_rotation() {
    let h = Harness::new();
    let before = h.issue("before").await;

    let next = proofmark_core::signer::SigningKeyPair::from_bytes(&[8; 32]);
    h.ctx.begin_rotation(next.clone(), t0()).unwrap();
    let after = h.issue("after").await;
    assert_eq!(&after.proof.signer_fingerprint, next.fingerprint());
    assert_eq!(h.ctx.signer().rotation().state_name(), "cutover");

    let engine = h.engine();
    assert!(engine.verify_hash(before.proof.hash_full.as_str()).await.valid);
    assert!(engine.verify_hash(after.proof.hash_full.as_str()).await.valid);
}

#[derive(Debug)]
struct StalledStore;

#[async_trait]
impl ObjectStore for StalledStore {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn head_object(&self, _key: &str) -> StoreResult<bool> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(false)
    }

    async fn get_object(&self, _key: &str) -> StoreResult<Vec<u8>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(Vec::new())
    }

    async fn put_object(&self, _key: &str, _bytes: Vec<u8>, _content_type: &str) -> StoreResult<()> {
        Ok(())
    }

    async fn list_keys(&self, _prefix: &str) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn stalled_lookup_times_out() {
    let mut cfg: CoreConfig = config();
    cfg.verification.timeout_ms = 50;
    let h = Harness::with_config(cfg, t0());
    let engine = VerificationEngine::new(h.ctx.clone(), Some(Arc::new(StalledStore)), h.repo());

    let out = engine.verify_hash(sha256_hex(b"x").as_str()).await;
    assert!(!out.valid);
    assert_eq!(out.errors, vec!["Verification timed out after 50ms".to_string()]);
}
