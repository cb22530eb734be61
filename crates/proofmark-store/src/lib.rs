//! proofmark-store
//!
//! Persistence for proofmark:
//! - `ObjectStore`: the snapshot registry and its mirrors (memory, filesystem, S3)
//! - `ProofRepository`: issued proofs, batch assignment, audit runs (SQLite)
//! - `RegistryLayout`: deterministic object keys
//!
//! Features:
//! - `sqlite` (default): `SqliteStore`
//! - `fs` (default): `FsObjectStore`
//! - `s3`: `S3ObjectStore`

pub mod errors;
pub mod layout;
pub mod object;
pub mod repo;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use errors::{StoreError, StoreResult};
pub use layout::RegistryLayout;
pub use object::{MemoryObjectStore, ObjectStore, ObjectStoreRef, StoreCalls};
pub use repo::{NewProof, ProofRepository, ProofRepositoryRef};

#[cfg(feature = "fs")]
pub use object::FsObjectStore;
#[cfg(feature = "s3")]
pub use object::S3ObjectStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
