//! Batch and snapshot manifest models.

use serde::{Deserialize, Serialize};

use crate::errors::ProofmarkResult;
use crate::hash::HashHex;
use crate::merkle::compute_merkle_root;

/// An ordered batch of proof hashes and its Merkle root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBatch {
    pub batch_id: u64,
    /// Creation order. Reordering changes the root.
    pub hashes: Vec<HashHex>,
    pub merkle_root: HashHex,
    pub count: u64,
}

impl ProofBatch {
    /// Build a batch. Fails with `EmptyBatch` on zero hashes.
    pub fn build(batch_id: u64, hashes: Vec<HashHex>) -> ProofmarkResult<Self> {
        let merkle_root = compute_merkle_root(&hashes)?;
        let count = hashes.len() as u64;
        Ok(Self {
            batch_id,
            hashes,
            merkle_root,
            count,
        })
    }
}

/// Published summary of one batch. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotManifest {
    pub batch: u64,
    pub count: u64,
    pub merkle_root: HashHex,
    pub schema_version: u32,
    pub created_at: String,
    pub signature: String,
    pub s3_url: String,
}

/// The manifest fields covered by the manifest signature.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestSigningPayload<'a> {
    pub batch: u64,
    pub count: u64,
    pub merkle_root: &'a HashHex,
    pub schema_version: u32,
    pub created_at: &'a str,
}

impl SnapshotManifest {
    pub fn signing_payload(&self) -> ManifestSigningPayload<'_> {
        ManifestSigningPayload {
            batch: self.batch,
            count: self.count,
            merkle_root: &self.merkle_root,
            schema_version: self.schema_version,
            created_at: &self.created_at,
        }
    }
}
