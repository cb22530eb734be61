//! Store error type.
//!
//! Backend failures keep the client error intact inside a `TransportError`,
//! so callers can tell a missing object from a broken connection.

use proofmark_core::errors::{ProofmarkError, TransportError};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The object or row does not exist. Not a transport failure.
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A stored value could not be decoded.
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("invalid object key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    pub fn transport(
        operation: &'static str,
        key: impl Into<String>,
        source: impl Into<proofmark_core::errors::BoxError>,
    ) -> Self {
        Self::Transport(TransportError::new(operation, key, source))
    }

    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StoreError> for ProofmarkError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transport(t) => ProofmarkError::Transport(t),
            StoreError::NotFound(key) => ProofmarkError::not_found(key),
            StoreError::Corrupt { key, reason } => {
                ProofmarkError::serialization(format!("corrupt record {key}: {reason}"))
            }
            StoreError::InvalidKey(key) => ProofmarkError::invalid_argument(format!("invalid object key: {key}")),
        }
    }
}
