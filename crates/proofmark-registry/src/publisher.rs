//! Snapshot publication.
//!
//! Publishing a batch writes, in order:
//! 1. `<prefix>/snapshots/<id>.jsonl.gz` (gzip JSONL export)
//! 2. `<prefix>/proofs/<hash>.json` for each proof
//! 3. `<prefix>/snapshots/<id>.manifest.json`, last, as the commit marker
//!
//! The manifest key is checked first. If it exists the stored manifest is
//! returned verbatim and nothing is written or signed. A stored manifest
//! whose root or count disagrees with the given proofs is an invariant
//! error. A failed publish is retried by calling `publish` again from the
//! top.

use std::io;
use std::sync::Arc;

use proofmark_core::canonical::canonical_hash;
use proofmark_core::clock::format_rfc3339;
use proofmark_core::content_type;
use proofmark_core::errors::TransportError;
use proofmark_core::hash::HashHex;
use proofmark_core::merkle::compute_merkle_root;
use proofmark_core::model::{CanonicalProof, ProofBatch, RawProofRecord, SnapshotManifest};
use proofmark_core::{ProofmarkError, ProofmarkResult};
use proofmark_store::{ObjectStoreRef, ProofRepository, RegistryLayout, StoreError};
use tracing::{error, info, warn};

use crate::context::RegistryContext;
use crate::export::encode_export;

pub struct SnapshotPublisher {
    ctx: Arc<RegistryContext>,
    store: ObjectStoreRef,
}

impl SnapshotPublisher {
    pub fn new(ctx: Arc<RegistryContext>, store: ObjectStoreRef) -> Self {
        Self { ctx, store }
    }

    /// Publish `proofs` (creation order) as batch `batch_id`. Idempotent.
    pub async fn publish(&self, batch_id: u64, proofs: &[CanonicalProof]) -> ProofmarkResult<SnapshotManifest> {
        let res = self.publish_inner(batch_id, proofs).await;
        if let Err(e) = &res {
            error!(batch_id, error = %e, "snapshot publish failed");
        }
        res
    }

    async fn publish_inner(&self, batch_id: u64, proofs: &[CanonicalProof]) -> ProofmarkResult<SnapshotManifest> {
        let target = self.ctx.config().registry.require()?;
        let batch = ProofBatch::build(batch_id, proofs.iter().map(|p| p.hash_full.clone()).collect())?;
        let layout = RegistryLayout::new(&target.prefix);
        let manifest_key = layout.manifest_key(batch_id);

        let exists = self
            .store
            .head_object(&manifest_key)
            .await
            .map_err(|e| publish_error(batch_id, "head_object", &manifest_key, e))?;

        if exists {
            let bytes = self
                .store
                .get_object(&manifest_key)
                .await
                .map_err(|e| publish_error(batch_id, "get_object", &manifest_key, e))?;
            let manifest: SnapshotManifest = serde_json::from_slice(&bytes)
                .map_err(|e| ProofmarkError::serialization(format!("stored manifest {manifest_key}: {e}")))?;
            if manifest.merkle_root != batch.merkle_root || manifest.count != batch.count {
                warn!(
                    batch_id,
                    stored_root = %manifest.merkle_root,
                    computed_root = %batch.merkle_root,
                    "published manifest differs from recomputed batch"
                );
                return Err(ProofmarkError::invariant(format!(
                    "batch {batch_id} is already published with {} proofs (root {}), not the {} proofs given (root {})",
                    manifest.count, manifest.merkle_root, batch.count, batch.merkle_root
                )));
            }
            info!(batch_id, key = %manifest_key, "snapshot already published");
            return Ok(manifest);
        }

        let codec = self.ctx.codec();
        let export = encode_export(codec, proofs)?;
        let export_key = layout.export_key(batch_id);
        self.put(batch_id, &export_key, export, content_type::GZIP_JSONL).await?;

        for p in proofs {
            let key = layout.proof_key(&p.hash_full);
            self.put(batch_id, &key, codec.to_json_bytes(p)?, content_type::JSON)
                .await?;
        }

        let mut manifest = SnapshotManifest {
            batch: batch_id,
            count: batch.count,
            merkle_root: batch.merkle_root,
            schema_version: codec.current_version().as_wire(),
            created_at: format_rfc3339(self.ctx.now()),
            signature: String::new(),
            s3_url: target.object_url(&manifest_key),
        };
        let digest = canonical_hash(&manifest.signing_payload())?;
        manifest.signature = self.ctx.sign(&digest).0;

        let body = serde_json::to_vec(&manifest)
            .map_err(|e| ProofmarkError::serialization(format!("manifest {batch_id}: {e}")))?;
        self.put(batch_id, &manifest_key, body, content_type::JSON).await?;

        info!(
            batch_id,
            count = manifest.count,
            merkle_root = %manifest.merkle_root,
            url = %manifest.s3_url,
            "snapshot published"
        );
        Ok(manifest)
    }

    async fn put(&self, batch_id: u64, key: &str, bytes: Vec<u8>, content_type: &str) -> ProofmarkResult<()> {
        self.store
            .put_object(key, bytes, content_type)
            .await
            .map_err(|e| publish_error(batch_id, "put_object", key, e))
    }

    /// Check a manifest's signature against the current verification keys.
    pub fn verify_manifest(&self, manifest: &SnapshotManifest) -> bool {
        match canonical_hash(&manifest.signing_payload()) {
            Ok(digest) => self.ctx.signer().verify(digest.as_str(), &manifest.signature),
            Err(_) => false,
        }
    }

    /// Fetch a published manifest, if any.
    pub async fn fetch_manifest(&self, batch_id: u64) -> ProofmarkResult<Option<SnapshotManifest>> {
        let target = self.ctx.config().registry.require()?;
        let key = RegistryLayout::new(&target.prefix).manifest_key(batch_id);
        match self.store.get_object(&key).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| ProofmarkError::serialization(format!("stored manifest {key}: {e}"))),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Batch ids with a published manifest, ascending.
    pub async fn published_batches(&self) -> ProofmarkResult<Vec<u64>> {
        let target = self.ctx.config().registry.require()?;
        let layout = RegistryLayout::new(&target.prefix);
        let keys = self.store.list_keys(&layout.snapshots_prefix()).await?;
        let mut ids: Vec<u64> = keys.iter().filter_map(|k| layout.batch_id_of_manifest(k)).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Take up to `max` unbatched proofs from `repo`, publish them as the next
    /// batch, then mark them batched. `None` when nothing is pending.
    ///
    /// A crash between publish and marking is safe: the next run finds the
    /// manifest already under that id and adopts it for the rows it covers.
    pub async fn roll_next_batch(&self, repo: &dyn ProofRepository, max: usize) -> ProofmarkResult<Option<SnapshotManifest>> {
        self.ctx.config().registry.require()?;

        let rows = repo.unbatched(max).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        let batch_id = repo.max_batch_id().await?.map_or(1, |m| m + 1);

        // a previous roll published this id but never marked its rows
        if let Some(existing) = self.fetch_manifest(batch_id).await? {
            return self.adopt_published(repo, existing, &rows).await.map(Some);
        }

        let codec = self.ctx.codec();
        let mut proofs = Vec::with_capacity(rows.len());
        for row in &rows {
            let json = row.canonical_json.as_deref().ok_or_else(|| {
                ProofmarkError::invariant(format!("proof {} has no canonical JSON to publish", row.id))
            })?;
            proofs.push(codec.decode(json.as_bytes())?);
        }

        let manifest = self.publish(batch_id, &proofs).await?;
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        repo.mark_batched(batch_id, &ids).await?;
        Ok(Some(manifest))
    }

    /// Mark the rows an already-published manifest covers. They are the
    /// oldest `count` unbatched rows; the root must match before any row is
    /// touched. Rows issued after that publish stay pending.
    async fn adopt_published(
        &self,
        repo: &dyn ProofRepository,
        manifest: SnapshotManifest,
        rows: &[RawProofRecord],
    ) -> ProofmarkResult<SnapshotManifest> {
        let batch_id = manifest.batch;
        let covered = usize::try_from(manifest.count)
            .ok()
            .filter(|n| *n > 0 && *n <= rows.len())
            .ok_or_else(|| {
                ProofmarkError::invariant(format!(
                    "published batch {batch_id} covers {} proofs but {} are pending",
                    manifest.count,
                    rows.len()
                ))
            })?;
        let rows = &rows[..covered];

        let hashes = rows
            .iter()
            .map(|r| HashHex::parse(&r.hash_full).map_err(ProofmarkError::from))
            .collect::<ProofmarkResult<Vec<_>>>()?;
        let root = compute_merkle_root(&hashes)?;
        if root != manifest.merkle_root {
            return Err(ProofmarkError::invariant(format!(
                "published batch {batch_id} has root {} but the oldest {covered} pending proofs give {root}",
                manifest.merkle_root
            )));
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        repo.mark_batched(batch_id, &ids).await?;
        info!(batch_id, count = covered, "adopted previously published batch");
        Ok(manifest)
    }

    /// Re-run publication for an existing batch from the repository.
    pub async fn republish(&self, repo: &dyn ProofRepository, batch_id: u64) -> ProofmarkResult<SnapshotManifest> {
        let rows = repo.batch_proofs(batch_id).await?;
        let codec = self.ctx.codec();
        let proofs = rows
            .iter()
            .map(|r| {
                let json = r.canonical_json.as_deref().ok_or_else(|| {
                    ProofmarkError::invariant(format!("proof {} has no canonical JSON to publish", r.id))
                })?;
                codec.decode(json.as_bytes()).map_err(ProofmarkError::from)
            })
            .collect::<ProofmarkResult<Vec<_>>>()?;
        self.publish(batch_id, &proofs).await
    }
}

fn publish_error(batch_id: u64, op: &'static str, key: &str, e: StoreError) -> ProofmarkError {
    let source = match e {
        StoreError::Transport(t) => t,
        StoreError::NotFound(k) => TransportError::new(op, k, io::Error::new(io::ErrorKind::NotFound, "object vanished")),
        other => TransportError::new(op, key, other),
    };
    ProofmarkError::RegistryPublish { batch_id, source }
}
