//! proofmark-core
//!
//! Core primitives for proofmark:
//! - Canonical proof model and codec with versioned, backward-compatible schemas
//! - Canonical JSON encoding for deterministic signing bytes
//! - Ed25519 signing with an explicit key-rotation state machine
//! - Merkle roots over ordered proof batches
//! - Pure verification and audit policy
//!
//! Nothing in this crate performs I/O or reads the clock on its own.

pub mod audit;
pub mod canonical;
pub mod clock;
pub mod codec;
pub mod config;
pub mod errors;
pub mod hash;
pub mod merkle;
pub mod model;
pub mod signer;
pub mod verify;
pub mod version;

pub use crate::errors::{ProofmarkError, ProofmarkResult};

/// Object-key layout inside a registry prefix.
pub mod layout {
    pub const SNAPSHOTS_DIR: &str = "snapshots";
    pub const PROOFS_DIR: &str = "proofs";
    pub const MANIFEST_SUFFIX: &str = ".manifest.json";
    pub const EXPORT_SUFFIX: &str = ".jsonl.gz";
}

/// Content types used for registry objects.
pub mod content_type {
    pub const JSON: &str = "application/json";
    pub const GZIP_JSONL: &str = "application/gzip";
}

/// Convenience re-exports.
pub mod prelude {
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::codec::{ProofCodec, SchemaRegistry};
    pub use crate::config::{CoreConfig, RegistryConfig, RegistryTarget};
    pub use crate::hash::{sha256_hex, HashAlgo, HashHex, StreamingHasher};
    pub use crate::merkle::compute_merkle_root;
    pub use crate::model::{
        AuditResult, AuditSource, AuditSummary, CanonicalProof, CrossMirrorValidation, Metadata,
        ProofBatch, RawProofRecord, ResolvedProof, SnapshotManifest, Subject,
    };
    pub use crate::signer::{KeyRotation, PublicKey, Signer, SigningKeyPair};
    pub use crate::verify::{VerifyOutcome, VerifyPolicy};
    pub use crate::version::SchemaVersion;
    pub use crate::{ProofmarkError, ProofmarkResult};
}
