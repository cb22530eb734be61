//! Error taxonomy for proofmark.
//!
//! Errors are split by how the caller is expected to react:
//! - `Configuration`: missing signing/storage configuration. Fatal, never retried.
//! - `Transport`: storage or database I/O failure. The caller retries the whole
//!   (idempotent) operation, never a partial step.
//! - `Validation`: malformed proof or schema mismatch. Rejected locally and never
//!   persisted.
//! - `EmptyBatch`: a Merkle root was requested over zero leaves.
//! - `RegistryPublish`: a snapshot publication failed on its transport.
//! - `NotFound`: a stored object or row that was asked for does not exist.
//!
//! Verification failures (bad signature, skewed timestamp) are *not* errors; they
//! are reported outcomes carried in `VerifyOutcome::errors`.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed transport cause, kept unmodified from the underlying client.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used across proofmark crates.
pub type ProofmarkResult<T> = Result<T, ProofmarkError>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum ProofmarkError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("cannot compute a merkle root over an empty batch")]
    EmptyBatch,

    #[error("registry publish failed for batch {batch_id}: {source}")]
    RegistryPublish {
        batch_id: u64,
        #[source]
        source: TransportError,
    },

    #[error("signing error: {0}")]
    Signing(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl ProofmarkError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True for errors a caller may retry by re-running the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RegistryPublish { .. })
    }
}

/// A storage or database I/O failure.
///
/// `source` is the client error exactly as it was returned.
#[derive(Debug, Error)]
#[error("{operation} {key}: {source}")]
pub struct TransportError {
    pub operation: &'static str,
    pub key: String,
    #[source]
    pub source: BoxError,
}

impl TransportError {
    pub fn new(operation: &'static str, key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            operation,
            key: key.into(),
            source: source.into(),
        }
    }
}

/// Why a proof document was rejected by the codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("document is not a JSON object")]
    NotAnObject,

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("hash must be 64 lowercase hex characters")]
    InvalidHash,

    #[error("timestamp must be RFC3339 UTC: {0}")]
    InvalidTimestamp(String),

    #[error("unsupported schema version: {0}")]
    UnsupportedSchemaVersion(u32),

    #[error("unknown schema: {0}")]
    UnknownSchema(String),

    #[error("metadata rejected: {0}")]
    Metadata(String),
}

impl ValidationError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
