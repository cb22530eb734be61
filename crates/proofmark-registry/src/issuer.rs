//! Proof issuance.
//!
//! An issued proof carries two signatures: the canonical one inside the proof
//! (over its signing digest) and the raw one on the database row (over
//! `hash_full`). Both are made by the same key under one read lock.

use std::sync::Arc;

use proofmark_core::hash::{sha256_hex, HashHex};
use proofmark_core::model::{CanonicalProof, Metadata, Subject};
use proofmark_core::{ProofmarkError, ProofmarkResult};
use proofmark_store::{NewProof, ProofRepositoryRef};
use tracing::{error, info};

use crate::context::RegistryContext;

#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub hash: HashHex,
    pub subject: Subject,
    pub metadata: Metadata,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedProof {
    pub id: i64,
    pub proof: CanonicalProof,
}

pub struct ProofIssuer {
    ctx: Arc<RegistryContext>,
    repo: ProofRepositoryRef,
}

impl ProofIssuer {
    pub fn new(ctx: Arc<RegistryContext>, repo: ProofRepositoryRef) -> Self {
        Self { ctx, repo }
    }

    pub async fn issue(&self, req: IssueRequest) -> ProofmarkResult<IssuedProof> {
        let hash = req.hash.clone();
        let res = self.issue_inner(req).await;
        if let Err(e) = &res {
            error!(hash = %hash, error = %e, "proof issuance failed");
        }
        res
    }

    /// Hash `bytes` and issue a proof for the digest.
    pub async fn issue_bytes(
        &self,
        bytes: &[u8],
        subject: Subject,
        metadata: Metadata,
        user_id: Option<String>,
    ) -> ProofmarkResult<IssuedProof> {
        self.issue(IssueRequest {
            hash: sha256_hex(bytes),
            subject,
            metadata,
            user_id,
        })
        .await
    }

    async fn issue_inner(&self, req: IssueRequest) -> ProofmarkResult<IssuedProof> {
        self.ctx.advance_rotation();
        let codec = self.ctx.codec();
        let now = self.ctx.now();

        let (proof, raw_signature) = {
            let signer = self.ctx.signer();
            let mut proof = codec.canonicalize(
                req.hash.clone(),
                req.subject,
                req.metadata,
                signer.fingerprint().clone(),
                now,
            )?;
            let digest = codec.signing_digest(&proof)?;
            proof.signature = signer.sign(&digest);
            (proof, signer.sign(&req.hash))
        };

        let wire = String::from_utf8(codec.to_json_bytes(&proof)?)
            .map_err(|e| ProofmarkError::serialization(e.to_string()))?;
        let id = self
            .repo
            .insert_proof(NewProof {
                hash_full: proof.hash_full.to_string(),
                signature: raw_signature,
                signed_at: proof.signed_at.clone(),
                user_id: req.user_id,
                canonical_json: Some(wire),
            })
            .await?;

        info!(
            id,
            hash = %proof.hash_full,
            signer = %proof.signer_fingerprint,
            "proof issued"
        );
        Ok(IssuedProof { id, proof })
    }
}
