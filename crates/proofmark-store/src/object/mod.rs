//! Object storage abstraction used for the snapshot registry and its mirrors.
//!
//! The registry is append-only: callers never delete, and only the publisher
//! writes. Implementations:
//! - `MemoryObjectStore`: tests; counts calls and injects faults
//! - `FsObjectStore` (`fs` feature): local directory, useful for dev and mirrors
//! - `S3ObjectStore` (`s3` feature): Amazon S3

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::StoreResult;

#[cfg(feature = "fs")]
mod fs;
mod memory;
#[cfg(feature = "s3")]
mod s3;

#[cfg(feature = "fs")]
pub use fs::FsObjectStore;
pub use memory::{MemoryObjectStore, StoreCalls};
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short name for logs and mirror reports.
    fn name(&self) -> &str;

    /// Existence check only; never downloads the body.
    async fn head_object(&self, key: &str) -> StoreResult<bool>;

    /// Fetch an object. Missing objects are `StoreError::NotFound`.
    async fn get_object(&self, key: &str) -> StoreResult<Vec<u8>>;

    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<()>;

    /// Keys under `prefix`, sorted.
    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

pub type ObjectStoreRef = Arc<dyn ObjectStore>;

/// Reject keys that could escape a root directory or are empty.
pub(crate) fn check_key(key: &str) -> StoreResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(crate::errors::StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
