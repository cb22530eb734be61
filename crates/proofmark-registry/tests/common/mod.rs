//! Shared fixtures: in-memory registry, in-memory SQLite, pinned clock.

#![allow(dead_code)]

use std::sync::Arc;

use proofmark_core::clock::FixedClock;
use proofmark_core::config::{CoreConfig, RegistryConfig};
use proofmark_core::hash::HashHex;
use proofmark_core::model::{Metadata, Subject};
use proofmark_core::signer::{Signer, SigningKeyPair};
use proofmark_registry::{IssuedProof, ProofIssuer, RecoveryAuditor, RegistryContext, SnapshotPublisher, VerificationEngine};
use proofmark_store::{MemoryObjectStore, ObjectStoreRef, ProofRepositoryRef, RegistryLayout, SqliteStore};
use time::OffsetDateTime;

pub const PREFIX: &str = "prod";

pub fn t0() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_760_000_000).unwrap()
}

pub fn key() -> SigningKeyPair {
    SigningKeyPair::from_bytes(&[7; 32])
}

pub fn config() -> CoreConfig {
    CoreConfig {
        registry: RegistryConfig::new("eu-west-1", "proofmark-test", PREFIX),
        ..CoreConfig::default()
    }
}

pub struct Harness {
    pub ctx: Arc<RegistryContext>,
    pub db: Arc<SqliteStore>,
    pub registry: Arc<MemoryObjectStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config(), t0())
    }

    pub fn with_config(cfg: CoreConfig, now: OffsetDateTime) -> Self {
        let ctx = RegistryContext::new(cfg, Signer::single(key()), Arc::new(FixedClock(now))).unwrap();
        Self {
            ctx,
            db: Arc::new(SqliteStore::open_in_memory().unwrap()),
            registry: Arc::new(MemoryObjectStore::named("primary")),
        }
    }

    /// Same stores and key, clock moved to `now`.
    pub fn at(&self, now: OffsetDateTime) -> Self {
        let ctx = RegistryContext::new(self.ctx.config().clone(), Signer::single(key()), Arc::new(FixedClock(now))).unwrap();
        Self {
            ctx,
            db: self.db.clone(),
            registry: self.registry.clone(),
        }
    }

    pub fn repo(&self) -> ProofRepositoryRef {
        self.db.clone()
    }

    pub fn store(&self) -> ObjectStoreRef {
        self.registry.clone()
    }

    pub fn issuer(&self) -> ProofIssuer {
        ProofIssuer::new(self.ctx.clone(), self.repo())
    }

    pub fn publisher(&self) -> SnapshotPublisher {
        SnapshotPublisher::new(self.ctx.clone(), self.store())
    }

    pub fn engine(&self) -> VerificationEngine {
        VerificationEngine::new(self.ctx.clone(), Some(self.store()), self.repo())
    }

    pub fn auditor(&self, mirrors: Vec<ObjectStoreRef>) -> RecoveryAuditor {
        RecoveryAuditor::new(self.ctx.clone(), self.repo(), Some(self.store()), mirrors)
    }

    pub async fn issue(&self, name: &str) -> IssuedProof {
        self.issuer()
            .issue_bytes(name.as_bytes(), Subject::new("file", "default", name), Metadata::new(), Some("user-1".into()))
            .await
            .unwrap()
    }
}

pub fn proof_key(hash: &HashHex) -> String {
    RegistryLayout::new(PREFIX).proof_key(hash)
}
