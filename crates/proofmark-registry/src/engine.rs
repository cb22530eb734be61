//! Verification engine.
//!
//! Resolves a hash against the published registry first and the relational
//! store second, then applies `VerifyPolicy`. Every failure is reported in the
//! outcome; nothing on this path returns an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use proofmark_core::hash::{HashHex, StreamingHasher};
use proofmark_core::model::ResolvedProof;
use proofmark_core::verify::{VerifyOutcome, VerifyPolicy};
use proofmark_store::{ObjectStoreRef, ProofRepositoryRef, RegistryLayout, StoreError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::context::RegistryContext;

const READ_CHUNK: usize = 64 * 1024;

pub struct VerificationEngine {
    ctx: Arc<RegistryContext>,
    registry: Option<ObjectStoreRef>,
    repo: ProofRepositoryRef,
}

impl VerificationEngine {
    pub fn new(ctx: Arc<RegistryContext>, registry: Option<ObjectStoreRef>, repo: ProofRepositoryRef) -> Self {
        Self { ctx, registry, repo }
    }

    /// Verify a hex hash supplied by a user. Surrounding whitespace and
    /// uppercase are tolerated.
    pub async fn verify_hash(&self, input: &str) -> VerifyOutcome {
        let started = Instant::now();
        let out = match HashHex::parse_user_input(input) {
            Ok(hash) => self.verify_bounded(&hash).await,
            Err(_) => VerifyOutcome::invalid_hash(),
        };
        out.with_latency(elapsed_ms(started))
    }

    /// Hash `bytes` and verify the result.
    pub async fn verify_bytes(&self, bytes: &[u8]) -> VerifyOutcome {
        let started = Instant::now();
        let mut h = StreamingHasher::new();
        h.update(bytes);
        let out = self.verify_bounded(&h.finalize()).await;
        out.with_latency(elapsed_ms(started))
    }

    /// Stream `reader` through the hasher, then verify.
    pub async fn verify_reader<R: AsyncRead + Unpin + Send>(&self, mut reader: R) -> VerifyOutcome {
        let started = Instant::now();
        let mut h = StreamingHasher::new();
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => h.update(&buf[..n]),
                Err(e) => {
                    return VerifyOutcome::invalid(vec![format!("Failed to read upload: {e}")])
                        .with_latency(elapsed_ms(started));
                }
            }
        }
        debug!(bytes = h.bytes_seen(), "upload hashed");
        let out = self.verify_bounded(&h.finalize()).await;
        out.with_latency(elapsed_ms(started))
    }

    /// Verify an already-computed hash.
    pub async fn verify_digest(&self, hash: &HashHex) -> VerifyOutcome {
        let started = Instant::now();
        self.verify_bounded(hash).await.with_latency(elapsed_ms(started))
    }

    async fn verify_bounded(&self, hash: &HashHex) -> VerifyOutcome {
        let timeout_ms = self.ctx.config().verification.timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), self.resolve_and_check(hash)).await {
            Ok(out) => out,
            Err(_) => {
                warn!(hash = %hash, timeout_ms, "verification timed out");
                VerifyOutcome::timed_out(timeout_ms)
            }
        }
    }

    async fn resolve_and_check(&self, hash: &HashHex) -> VerifyOutcome {
        let resolved = match self.from_registry(hash).await {
            Ok(p) => p,
            Err(registry_err) => {
                warn!(hash = %hash, reason = %registry_err, "registry miss, falling back to database");
                match self.from_database(hash).await {
                    Ok(r) => r,
                    Err(db_err) => return VerifyOutcome::not_found(registry_err, db_err),
                }
            }
        };

        let policy = VerifyPolicy::new(self.ctx.config().verification.timestamp_tolerance_hours);
        let now = self.ctx.now();
        let signer = self.ctx.signer();
        policy.check(&resolved, self.ctx.codec(), &signer, now)
    }

    async fn from_registry(&self, hash: &HashHex) -> Result<ResolvedProof, String> {
        let Some(store) = &self.registry else {
            return Err("Registry not configured".to_string());
        };
        let target = self
            .ctx
            .config()
            .registry
            .require()
            .map_err(|_| "Registry not configured".to_string())?;

        let key = RegistryLayout::new(&target.prefix).proof_key(hash);
        let bytes = store.get_object(&key).await.map_err(|e| match e {
            StoreError::NotFound(_) => "Proof not found in registry".to_string(),
            other => format!("Registry lookup failed: {other}"),
        })?;

        let proof = self
            .ctx
            .codec()
            .decode(&bytes)
            .map_err(|e| format!("Registry proof is malformed: {e}"))?;
        if &proof.hash_full != hash {
            return Err("Registry proof does not match requested hash".to_string());
        }
        Ok(ResolvedProof::Registry(proof))
    }

    async fn from_database(&self, hash: &HashHex) -> Result<ResolvedProof, String> {
        match self.repo.find_by_hash(hash.as_str()).await {
            Ok(Some(rec)) => Ok(ResolvedProof::Database(rec)),
            Ok(None) => Err("Proof not found in database".to_string()),
            Err(e) => Err(format!("Database lookup failed: {e}")),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
