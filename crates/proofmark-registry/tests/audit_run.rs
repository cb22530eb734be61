//! audit_run.rs
//!
//! Recovery audits over in-memory stores: scoring, persistence, cross-mirror
//! drift and the error budget.

mod common;

use std::sync::Arc;

use proofmark_core::config::AuditConfig;
use proofmark_core::model::{AuditResult, AuditSource, CanonicalProof};
use proofmark_store::{MemoryObjectStore, ObjectStore, ObjectStoreRef, ProofRepository};

use common::{proof_key, Harness};

fn reproducible(sample_size: usize) -> AuditConfig {
    AuditConfig {
        sample_size,
        reproducible: true,
        ..AuditConfig::default()
    }
}

async fn issue_and_publish(h: &Harness, names: &[&str]) -> Vec<CanonicalProof> {
    let mut proofs = Vec::new();
    for name in names {
        proofs.push(h.issue(name).await.proof);
    }
    h.publisher().publish(1, &proofs).await.unwrap();
    proofs
}

async fn mirror_of(h: &Harness, name: &str, proofs: &[CanonicalProof]) -> Arc<MemoryObjectStore> {
    let m = Arc::new(MemoryObjectStore::named(name));
    for p in proofs {
        let key = proof_key(&p.hash_full);
        m.insert_raw(key.clone(), h.registry.get_object(&key).await.unwrap());
    }
    m
}

fn successes(results: &[AuditResult]) -> u64 {
    results.iter().filter(|r| r.recovered()).count() as u64
}

#[tokio::test]
async fn healthy_registry_scores_full_marks() {
    let h = Harness::new();
    let proofs = issue_and_publish(&h, &["a", "b", "c"]).await;
    let a: ObjectStoreRef = mirror_of(&h, "mirror-a", &proofs).await;
    let b: ObjectStoreRef = mirror_of(&h, "mirror-b", &proofs).await;
    let mirrors = vec![a, b];

    let report = h.auditor(mirrors).run(&reproducible(10)).await.unwrap();
    let s = &report.summary;
    assert_eq!(s.total_audited, 3);
    assert_eq!(s.total_audited, report.results.len() as u64);
    assert_eq!(s.successful_recoveries, successes(&report.results));
    assert_eq!(s.successful_recoveries, 3);
    assert!(report.results.iter().all(|r| r.source == AuditSource::ObjectStore));
    assert!(report.results.iter().all(|r| r.mirror_consistent == Some(true)));
    assert_eq!(s.integrity_score, 100.0);
    assert!(!s.halted_early);
    assert_eq!(report.mirrors.len(), 3);
    assert!(report.mirrors.iter().all(|m| m.consistent));

    let (saved, rows) = h.db.load_audit(s.run_id).await.unwrap().unwrap();
    assert_eq!(&saved, s);
    assert_eq!(rows, report.results);
}

#[tokio::test]
async fn dissenting_mirror_is_named() {
    let h = Harness::new();
    let proofs = issue_and_publish(&h, &["a", "b"]).await;
    let good: ObjectStoreRef = mirror_of(&h, "mirror-a", &proofs).await;
    let drifted = mirror_of(&h, "mirror-b", &proofs).await;
    // mirror-b holds the second proof under the first proof's key
    let wrong = h.registry.get_object(&proof_key(&proofs[1].hash_full)).await.unwrap();
    drifted.insert_raw(proof_key(&proofs[0].hash_full), wrong);

    let cfg = AuditConfig {
        sources: vec![AuditSource::ObjectStore],
        ..reproducible(1)
    };
    let mirrors: Vec<ObjectStoreRef> = vec![good, drifted as ObjectStoreRef];
    let report = h.auditor(mirrors).run(&cfg).await.unwrap();

    assert_eq!(report.mirrors.len(), 1);
    let v = &report.mirrors[0];
    assert!(!v.consistent);
    assert_eq!(v.consensus_hash.as_deref(), Some(proofs[0].hash_full.as_str()));
    assert_eq!(v.discrepancies.len(), 1);
    assert_eq!(v.discrepancies[0].mirror, "mirror-b");
    assert_eq!(v.discrepancies[0].observed_hash.as_deref(), Some(proofs[1].hash_full.as_str()));

    let r = &report.results[0];
    assert!(r.hash_match && r.signature_valid);
    assert_eq!(r.mirror_consistent, Some(false));
    assert!(!r.recovered());
    assert_eq!(report.summary.mirror_inconsistencies, 1);
    assert_eq!(report.summary.successful_recoveries, 0);
    assert_eq!(report.summary.integrity_score, 0.0);
}

#[tokio::test]
async fn unpublished_proof_fails_its_sample() {
    let h = Harness::new();
    h.issue("draft").await;

    let report = h.auditor(Vec::new()).run(&reproducible(5)).await.unwrap();
    assert_eq!(report.results.len(), 1);
    let r = &report.results[0];
    assert!(!r.recovered());
    assert_eq!(r.source, AuditSource::ObjectStore);
    assert_eq!(r.recovered_hash, None);
    assert_eq!(r.error.as_deref(), Some("object-store: Proof not published"));
    assert_eq!(report.summary.total_audited, 1);
    assert_eq!(report.summary.failed_recoveries, 1);
    assert_eq!(report.summary.integrity_score, 0.0);
    assert!(report.mirrors.is_empty());
}

#[tokio::test]
async fn score_counts_samples_not_sources() {
    let h = Harness::new();
    issue_and_publish(&h, &["a", "b", "c"]).await;
    h.issue("draft").await;

    let report = h.auditor(Vec::new()).run(&reproducible(10)).await.unwrap();
    assert_eq!(report.summary.total_audited, 4);
    assert_eq!(report.summary.successful_recoveries, 3);
    assert_eq!(report.summary.integrity_score, 75.0);
    let ids: Vec<i64> = report.results.iter().map(|r| r.proof_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn database_only_audit_passes_unpublished_proofs() {
    let h = Harness::new();
    h.issue("draft").await;
    let cfg = AuditConfig {
        sources: vec![AuditSource::Database],
        ..reproducible(5)
    };

    let report = h.auditor(Vec::new()).run(&cfg).await.unwrap();
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].recovered());
    assert_eq!(report.results[0].source, AuditSource::Database);
    assert_eq!(report.summary.integrity_score, 100.0);
}

#[tokio::test]
async fn registry_without_prefix_is_not_configured() {
    let mut cfg = common::config();
    cfg.registry.prefix = Some("  ".into());
    let h = Harness::with_config(cfg, common::t0());
    h.issue("draft").await;
    let audit = AuditConfig {
        sources: vec![AuditSource::ObjectStore],
        ..reproducible(5)
    };

    let report = h.auditor(Vec::new()).run(&audit).await.unwrap();
    assert_eq!(report.results[0].error.as_deref(), Some("Registry not configured"));
    assert_eq!(report.summary.failed_recoveries, 1);
}

#[tokio::test]
async fn run_halts_once_errors_exceed_budget() {
    let h = Harness::new();
    for name in ["a", "b", "c", "d", "e"] {
        h.issue(name).await;
    }
    let cfg = AuditConfig {
        sources: vec![AuditSource::ObjectStore],
        max_errors: 1,
        concurrency: 1,
        ..reproducible(5)
    };

    let report = h.auditor(Vec::new()).run(&cfg).await.unwrap();
    assert!(report.summary.halted_early);
    assert_eq!(report.summary.total_audited, 2);
    assert_eq!(report.summary.failed_recoveries, 2);
    assert_eq!(
        report.results.iter().map(|r| r.proof_id).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(h.db.recent_audits(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sample_is_capped_by_batch_size() {
    let h = Harness::new();
    issue_and_publish(&h, &["a", "b", "c", "d"]).await;
    let cfg = AuditConfig {
        batch_size: 3,
        sources: vec![AuditSource::Database],
        ..reproducible(100)
    };
    let report = h.auditor(Vec::new()).run(&cfg).await.unwrap();
    assert_eq!(report.summary.total_audited, 3);
    assert_eq!(report.summary.successful_recoveries, 3);
}

#[tokio::test]
async fn empty_repository_audits_nothing() {
    let h = Harness::new();
    let report = h.auditor(Vec::new()).run_default().await.unwrap();
    assert_eq!(report.summary.total_audited, 0);
    assert_eq!(report.summary.integrity_score, 0.0);
    assert!(h.db.count_proofs().await.unwrap() == 0);
}
