//! proofmark-registry
//!
//! The stateful half of proofmark, built on `proofmark-core` and
//! `proofmark-store`:
//! - `ProofIssuer`: sign and persist new proofs
//! - `SnapshotPublisher`: idempotent batch publication to the object store
//! - `VerificationEngine`: registry-first, database-fallback verification
//! - `RecoveryAuditor`: sampled recovery audits with cross-mirror consensus
//!
//! Every component shares one `RegistryContext`. `Settings` builds it, and
//! the stores, from `PROOFMARK_*` environment variables.

pub mod auditor;
pub mod context;
pub mod engine;
pub mod export;
pub mod issuer;
pub mod publisher;
pub mod settings;

pub use auditor::{AuditReport, RecoveryAuditor};
pub use context::RegistryContext;
pub use engine::VerificationEngine;
pub use export::{decode_export, encode_export};
pub use issuer::{IssueRequest, IssuedProof, ProofIssuer};
pub use publisher::SnapshotPublisher;
pub use settings::{RegistryBackend, Settings};
