//! Relational proof rows and the resolved-proof variant used by verification.

use serde::{Deserialize, Serialize};

use crate::model::CanonicalProof;

/// A row of the `proofs` table, as stored.
///
/// Fields are raw strings on purpose: a corrupted row must still load so that
/// verification and audit can report what is wrong with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawProofRecord {
    pub id: i64,
    pub hash_full: String,
    /// Base64 signature over the decoded `hash_full`.
    pub signature: String,
    pub signed_at: String,
    pub user_id: Option<String>,
    /// Wire JSON of the canonical proof, when it was kept.
    pub canonical_json: Option<String>,
    pub batch_id: Option<u64>,
}

/// A proof found during verification, tagged by where it came from.
#[derive(Debug, Clone)]
pub enum ResolvedProof {
    /// Published registry object. Verified against its canonical signing bytes.
    Registry(CanonicalProof),
    /// Relational fallback. Verified against the raw hash.
    Database(RawProofRecord),
}

impl ResolvedProof {
    pub fn signed_at(&self) -> &str {
        match self {
            Self::Registry(p) => &p.signed_at,
            Self::Database(r) => &r.signed_at,
        }
    }

    pub fn source_name(&self) -> &'static str {
        match self {
            Self::Registry(_) => "registry",
            Self::Database(_) => "database",
        }
    }
}
