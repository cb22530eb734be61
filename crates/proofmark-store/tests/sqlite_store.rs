//! sqlite_store.rs
//!
//! Exercises the SQLite repository end to end against an in-memory database
//! and a file-backed one.

use assert_matches::assert_matches;
use proofmark_core::audit::{result_score, summarize};
use proofmark_core::hash::sha256_hex;
use proofmark_core::model::{AuditResult, AuditSource};
use proofmark_store::{NewProof, ProofRepository, SqliteStore, StoreError};
use uuid::Uuid;

fn new_proof(name: &str) -> NewProof {
    NewProof {
        hash_full: sha256_hex(name.as_bytes()).to_string(),
        signature: "c2ln".into(),
        signed_at: "2026-05-01T09:00:00Z".into(),
        user_id: Some("user-1".into()),
        canonical_json: None,
    }
}

#[tokio::test]
async fn insert_and_lookup() {
    let db = SqliteStore::open_in_memory().unwrap();
    let a = db.insert_proof(new_proof("a")).await.unwrap();
    let b = db.insert_proof(new_proof("b")).await.unwrap();
    assert!(b > a);

    let rec = db.get_proof(a).await.unwrap().unwrap();
    assert_eq!(rec.hash_full, sha256_hex(b"a").to_string());
    assert_eq!(rec.user_id.as_deref(), Some("user-1"));
    assert!(rec.batch_id.is_none());

    let by_hash = db.find_by_hash(&rec.hash_full).await.unwrap().unwrap();
    assert_eq!(by_hash.id, a);
    assert!(db.find_by_hash(&sha256_hex(b"zzz").to_string()).await.unwrap().is_none());
    assert_eq!(db.count_proofs().await.unwrap(), 2);
    assert_eq!(db.proof_ids().await.unwrap(), vec![a, b]);
}

#[tokio::test]
async fn batching_is_monotonic_and_ordered() {
    let db = SqliteStore::open_in_memory().unwrap();
    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        ids.push(db.insert_proof(new_proof(name)).await.unwrap());
    }
    assert_eq!(db.max_batch_id().await.unwrap(), None);

    let first = db.unbatched(2).await.unwrap();
    assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), ids[..2].to_vec());
    db.mark_batched(1, &ids[..2]).await.unwrap();
    // marking again with the same batch is a no-op
    db.mark_batched(1, &ids[..2]).await.unwrap();

    assert_eq!(db.max_batch_id().await.unwrap(), Some(1));
    assert_eq!(db.unbatched(10).await.unwrap().len(), 1);
    assert_eq!(db.batch_proofs(1).await.unwrap().len(), 2);

    assert_matches!(db.mark_batched(2, &ids[..1]).await, Err(StoreError::Corrupt { .. }));
}

#[tokio::test]
async fn audit_runs_roundtrip() {
    let db = SqliteStore::open_in_memory().unwrap();
    let h = sha256_hex(b"a").to_string();
    let results = vec![
        AuditResult {
            proof_id: 1,
            original_hash: h.clone(),
            recovered_hash: Some(h.clone()),
            hash_match: true,
            signature_valid: true,
            source: AuditSource::ObjectStore,
            recovery_time_ms: 4,
            integrity_score: result_score(true, true, Some(true)),
            mirror_consistent: Some(true),
            error: None,
        },
        AuditResult {
            proof_id: 2,
            original_hash: h.clone(),
            recovered_hash: None,
            hash_match: false,
            signature_valid: false,
            source: AuditSource::Database,
            recovery_time_ms: 1,
            integrity_score: result_score(false, false, None),
            mirror_consistent: None,
            error: Some("not published".into()),
        },
    ];
    let summary = summarize(
        Uuid::new_v4(),
        "2026-05-01T09:00:00Z".into(),
        "2026-05-01T09:00:02Z".into(),
        &results,
        false,
    );

    db.save_audit(&summary, &results).await.unwrap();
    let (s, r) = db.load_audit(summary.run_id).await.unwrap().unwrap();
    assert_eq!(s, summary);
    assert_eq!(r, results);

    let recent = db.recent_audits(5).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert!(db.load_audit(Uuid::new_v4()).await.unwrap().is_none());

    // same run id twice violates the primary key and leaves nothing half-written
    assert_matches!(db.save_audit(&summary, &results).await, Err(StoreError::Transport(_)));
    let (_, r) = db.load_audit(summary.run_id).await.unwrap().unwrap();
    assert_eq!(r.len(), 2);
}

#[tokio::test]
async fn file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proofmark.db");
    {
        let db = SqliteStore::open(&path).unwrap();
        db.insert_proof(new_proof("kept")).await.unwrap();
    }
    let db = SqliteStore::open(&path).unwrap();
    assert_eq!(db.count_proofs().await.unwrap(), 1);
}
