//! Relational proof repository.
//!
//! Holds issued proofs (with their raw signatures), batch assignment, and
//! audit runs. The registry crate only talks to this trait.

use std::sync::Arc;

use async_trait::async_trait;
use proofmark_core::model::{AuditResult, AuditSummary, RawProofRecord};
use uuid::Uuid;

use crate::errors::StoreResult;

/// A proof row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProof {
    pub hash_full: String,
    pub signature: String,
    pub signed_at: String,
    pub user_id: Option<String>,
    pub canonical_json: Option<String>,
}

#[async_trait]
pub trait ProofRepository: Send + Sync {
    /// Insert a proof and return its id. Ids increase in creation order.
    async fn insert_proof(&self, proof: NewProof) -> StoreResult<i64>;

    async fn get_proof(&self, id: i64) -> StoreResult<Option<RawProofRecord>>;

    /// Oldest proof for `hash_full`.
    async fn find_by_hash(&self, hash_full: &str) -> StoreResult<Option<RawProofRecord>>;

    async fn proof_ids(&self) -> StoreResult<Vec<i64>>;

    async fn count_proofs(&self) -> StoreResult<u64>;

    /// Proofs without a batch, oldest first.
    async fn unbatched(&self, limit: usize) -> StoreResult<Vec<RawProofRecord>>;

    /// Proofs assigned to `batch_id`, in creation order.
    async fn batch_proofs(&self, batch_id: u64) -> StoreResult<Vec<RawProofRecord>>;

    async fn max_batch_id(&self) -> StoreResult<Option<u64>>;

    async fn mark_batched(&self, batch_id: u64, ids: &[i64]) -> StoreResult<()>;

    /// Persist one summary and its results atomically.
    async fn save_audit(&self, summary: &AuditSummary, results: &[AuditResult]) -> StoreResult<()>;

    async fn load_audit(&self, run_id: Uuid) -> StoreResult<Option<(AuditSummary, Vec<AuditResult>)>>;

    /// Most recent audit summaries, newest first.
    async fn recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditSummary>>;
}

pub type ProofRepositoryRef = Arc<dyn ProofRepository>;
