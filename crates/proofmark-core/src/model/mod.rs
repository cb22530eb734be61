//! proofmark data models.
//!
//! This module defines the strongly-typed Rust representations for proofmark
//! records: canonical proofs, batches and snapshot manifests, relational rows,
//! and audit artifacts.
//!
//! Design goals:
//! - **Deterministic serialization:** bytes used for hashing and signing are
//!   produced by `crate::canonical`, never by default serde formatting.
//! - **Minimal policy:** models are mostly data. Validation lives in
//!   `crate::codec`; verification policy lives in `crate::verify`.
//!
//! Recommended imports: `use proofmark_core::prelude::*;`

mod audit;
mod manifest;
mod metadata;
mod proof;
mod record;

pub use audit::{AuditResult, AuditSource, AuditSummary, CrossMirrorValidation, MirrorDiscrepancy};
pub use manifest::{ManifestSigningPayload, ProofBatch, SnapshotManifest};
pub use metadata::{Metadata, MetadataValue};
pub use proof::{CanonicalProof, Subject};
pub use record::{RawProofRecord, ResolvedProof};
