//! Recovery auditor.
//!
//! Samples issued proofs and re-derives each one from the database and from
//! the published registry, optionally cross-checking the registry object
//! against every mirror. Each sample yields one result, which passes only if
//! every source recovered it. Scoring and consensus live in
//! `proofmark_core::audit`; this module does the I/O.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use proofmark_core::audit::{
    check_summary, fold_sample, mirror_consensus, result_score, sample_ids, summarize, ErrorBudget, MirrorObservation,
};
use proofmark_core::clock::format_rfc3339;
use proofmark_core::config::AuditConfig;
use proofmark_core::hash::HashHex;
use proofmark_core::model::{AuditResult, AuditSource, AuditSummary, CanonicalProof, CrossMirrorValidation, RawProofRecord};
use proofmark_core::{ProofmarkError, ProofmarkResult};
use proofmark_store::{ObjectStoreRef, ProofRepositoryRef, RegistryLayout, StoreError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::context::RegistryContext;

/// Everything one run produced. `summary` and `results` are what was persisted.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub summary: AuditSummary,
    pub results: Vec<AuditResult>,
    pub mirrors: Vec<CrossMirrorValidation>,
}

struct SampleOutcome {
    result: AuditResult,
    mirror: Option<CrossMirrorValidation>,
}

pub struct RecoveryAuditor {
    ctx: Arc<RegistryContext>,
    repo: ProofRepositoryRef,
    registry: Option<ObjectStoreRef>,
    mirrors: Vec<ObjectStoreRef>,
}

impl RecoveryAuditor {
    pub fn new(
        ctx: Arc<RegistryContext>,
        repo: ProofRepositoryRef,
        registry: Option<ObjectStoreRef>,
        mirrors: Vec<ObjectStoreRef>,
    ) -> Self {
        Self {
            ctx,
            repo,
            registry,
            mirrors,
        }
    }

    /// Run with the context's default audit settings.
    pub async fn run_default(&self) -> ProofmarkResult<AuditReport> {
        let cfg = self.ctx.config().audit.clone();
        self.run(&cfg).await
    }

    pub async fn run(&self, cfg: &AuditConfig) -> ProofmarkResult<AuditReport> {
        let res = self.run_inner(cfg).await;
        if let Err(e) = &res {
            error!(error = %e, "audit run failed");
        }
        res
    }

    async fn run_inner(&self, cfg: &AuditConfig) -> ProofmarkResult<AuditReport> {
        let run_id = Uuid::new_v4();
        let started_at = format_rfc3339(self.ctx.now());

        let sources = primary_sources(&cfg.sources)?;
        let ids = self.repo.proof_ids().await?;
        let want = cfg.sample_size.min(cfg.batch_size);
        let sampled = sample_ids(ids, want, cfg.reproducible, &mut rand::thread_rng());
        info!(%run_id, sampled = sampled.len(), concurrency = cfg.concurrency, "audit run started");

        let cross_mirror = cfg.cross_mirror && !self.mirrors.is_empty();
        let sources = sources.as_slice();
        let mut samples = stream::iter(sampled)
            .map(move |id| self.audit_sample(id, sources, cross_mirror))
            .buffered(cfg.concurrency.max(1));

        let mut budget = ErrorBudget::new(cfg.max_errors);
        let mut results = Vec::new();
        let mut mirrors = Vec::new();
        let mut halted = false;
        while let Some(outcome) = samples.next().await {
            let outcome = outcome?;
            budget.record(&outcome.result);
            results.push(outcome.result);
            mirrors.extend(outcome.mirror);
            if budget.exhausted() {
                warn!(%run_id, errors = budget.errors(), max_errors = cfg.max_errors, "audit halted early");
                halted = true;
                break;
            }
        }
        drop(samples);

        let summary = summarize(run_id, started_at, format_rfc3339(self.ctx.now()), &results, halted);
        check_summary(&summary, &results)?;
        self.repo.save_audit(&summary, &results).await?;

        info!(
            %run_id,
            total = summary.total_audited,
            successful = summary.successful_recoveries,
            failed = summary.failed_recoveries,
            mirror_inconsistencies = summary.mirror_inconsistencies,
            integrity_score = summary.integrity_score,
            halted_early = summary.halted_early,
            "audit run finished"
        );
        Ok(AuditReport {
            summary,
            results,
            mirrors,
        })
    }

    async fn audit_sample(&self, id: i64, sources: &[AuditSource], cross_mirror: bool) -> ProofmarkResult<SampleOutcome> {
        let Some(row) = self.repo.get_proof(id).await? else {
            let source = sources.first().copied().unwrap_or(AuditSource::Database);
            let result = failed(id, String::new(), source, 0, format!("proof {id} no longer exists"));
            return Ok(SampleOutcome { result, mirror: None });
        };

        let mut checks = Vec::with_capacity(sources.len());
        for source in sources {
            let r = match source {
                AuditSource::Database => self.recover_from_database(&row),
                AuditSource::ObjectStore => self.recover_from_registry(&row).await,
                AuditSource::Mirror => continue,
            };
            checks.push(r);
        }

        let mut mirror = None;
        if cross_mirror {
            let primary = checks
                .iter()
                .find(|r| r.source == AuditSource::ObjectStore)
                .or_else(|| checks.first())
                .and_then(|r| r.recovered_hash.clone());
            let validation = self.cross_check(&row, primary.as_deref()).await;
            if !validation.consistent {
                warn!(
                    proof_id = id,
                    discrepancies = validation.discrepancies.len(),
                    "mirror copies disagree"
                );
            }
            mirror = Some(validation);
        }

        let consistent = mirror.as_ref().map(|v| v.consistent);
        let result = fold_sample(checks, consistent).ok_or_else(|| {
            ProofmarkError::invariant(format!("proof {id} was audited against no source"))
        })?;
        Ok(SampleOutcome { result, mirror })
    }

    fn recover_from_database(&self, row: &RawProofRecord) -> AuditResult {
        let started = Instant::now();
        let (recovered, err) = match row.canonical_json.as_deref() {
            Some(json) => match self.ctx.codec().decode(json.as_bytes()) {
                Ok(p) => (Some(p.hash_full.to_string()), None),
                Err(e) => (None, Some(format!("stored canonical JSON is invalid: {e}"))),
            },
            None => (Some(row.hash_full.clone()), None),
        };
        let signature_valid = self.ctx.signer().verify(&row.hash_full, &row.signature);

        let hash_match = recovered.as_deref() == Some(row.hash_full.as_str());
        AuditResult {
            proof_id: row.id,
            original_hash: row.hash_full.clone(),
            recovered_hash: recovered,
            hash_match,
            signature_valid,
            source: AuditSource::Database,
            recovery_time_ms: elapsed_ms(started),
            integrity_score: result_score(hash_match, signature_valid, None),
            mirror_consistent: None,
            error: err.or_else(|| (!signature_valid).then(|| "raw signature does not verify".to_string())),
        }
    }

    async fn recover_from_registry(&self, row: &RawProofRecord) -> AuditResult {
        let started = Instant::now();
        let proof = match self.fetch_published(self.registry.as_ref(), row).await {
            Ok(p) => p,
            Err(e) => {
                return failed(row.id, row.hash_full.clone(), AuditSource::ObjectStore, elapsed_ms(started), e);
            }
        };

        let signature_valid = {
            let signer = self.ctx.signer();
            self.ctx
                .codec()
                .signing_digest(&proof)
                .ok()
                .and_then(|d| signer.verifying_fingerprint(d.as_str(), &proof.signature))
                .is_some_and(|fp| fp == proof.signer_fingerprint)
        };
        let recovered = proof.hash_full.to_string();
        let hash_match = recovered == row.hash_full;
        debug!(proof_id = row.id, hash_match, signature_valid, "registry copy checked");

        AuditResult {
            proof_id: row.id,
            original_hash: row.hash_full.clone(),
            recovered_hash: Some(recovered),
            hash_match,
            signature_valid,
            source: AuditSource::ObjectStore,
            recovery_time_ms: elapsed_ms(started),
            integrity_score: result_score(hash_match, signature_valid, None),
            mirror_consistent: None,
            error: (!signature_valid).then(|| "canonical signature does not verify".to_string()),
        }
    }

    async fn cross_check(&self, row: &RawProofRecord, primary: Option<&str>) -> CrossMirrorValidation {
        let mut observations = Vec::with_capacity(self.mirrors.len());
        for m in &self.mirrors {
            let observed = match self.fetch_published(Some(m), row).await {
                Ok(p) => Some(p.hash_full.to_string()),
                Err(e) => {
                    debug!(proof_id = row.id, mirror = m.name(), reason = %e, "mirror copy unavailable");
                    None
                }
            };
            observations.push(MirrorObservation::new(m.name(), observed));
        }
        mirror_consensus(row.id, &row.hash_full, primary, &observations)
    }

    async fn fetch_published(&self, store: Option<&ObjectStoreRef>, row: &RawProofRecord) -> Result<CanonicalProof, String> {
        let Some(store) = store else {
            return Err("Registry not configured".to_string());
        };
        let target = self
            .ctx
            .config()
            .registry
            .require()
            .map_err(|_| "Registry not configured".to_string())?;
        let hash = HashHex::parse(&row.hash_full).map_err(|e| format!("stored hash is invalid: {e}"))?;
        let key = RegistryLayout::new(&target.prefix).proof_key(&hash);

        let bytes = store.get_object(&key).await.map_err(|e| match e {
            StoreError::NotFound(_) => "Proof not published".to_string(),
            other => format!("{} read failed: {other}", store.name()),
        })?;
        self.ctx
            .codec()
            .decode(&bytes)
            .map_err(|e| format!("published proof is malformed: {e}"))
    }
}

/// Database and object-store, deduplicated, in the order given.
fn primary_sources(requested: &[AuditSource]) -> ProofmarkResult<Vec<AuditSource>> {
    let mut out = Vec::new();
    for s in requested {
        if *s != AuditSource::Mirror && !out.contains(s) {
            out.push(*s);
        }
    }
    if out.is_empty() {
        return Err(ProofmarkError::invalid_argument(
            "audit needs the database or object-store source",
        ));
    }
    Ok(out)
}

fn failed(proof_id: i64, original_hash: String, source: AuditSource, recovery_time_ms: u64, error: String) -> AuditResult {
    AuditResult {
        proof_id,
        original_hash,
        recovered_hash: None,
        hash_match: false,
        signature_valid: false,
        source,
        recovery_time_ms,
        integrity_score: result_score(false, false, None),
        mirror_consistent: None,
        error: Some(error),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
