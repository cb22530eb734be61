//! Canonical proof record.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::hash::{HashAlgo, HashHex};
use crate::model::Metadata;
use crate::version::SchemaVersion;

/// What a proof is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "type")]
    pub r#type: String,
    pub namespace: String,
    pub id: String,
}

impl Subject {
    pub fn new(r#type: impl Into<String>, namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("id".into(), Value::String(self.id.clone()));
        obj.insert("namespace".into(), Value::String(self.namespace.clone()));
        obj.insert("type".into(), Value::String(self.r#type.clone()));
        Value::Object(obj)
    }
}

/// The immutable, signed record binding a content hash to a time and a signer.
///
/// `signature` covers `ProofCodec::serialize_for_signing`, which is every field
/// here except the signature itself. Instances are only produced by the codec
/// (`canonicalize` or `validate`), so field contents are already checked.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalProof {
    pub schema_version: SchemaVersion,
    pub hash_algo: HashAlgo,
    pub hash_full: HashHex,
    /// RFC3339 UTC, kept exactly as issued so signing bytes never drift.
    pub signed_at: String,
    pub signer_fingerprint: HashHex,
    pub subject: Subject,
    pub metadata: Metadata,
    /// Base64 Ed25519 signature. Empty until signed.
    pub signature: String,
}

impl CanonicalProof {
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// JSON object without the signature. `hash_algo` is present only for
    /// schema versions that declare it.
    pub fn unsigned_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("schema_version".into(), Value::from(self.schema_version.as_wire()));
        if self.schema_version.signs_hash_algo() {
            obj.insert("hash_algo".into(), Value::String(self.hash_algo.as_str().into()));
        }
        obj.insert("hash_full".into(), Value::String(self.hash_full.to_string()));
        obj.insert("signed_at".into(), Value::String(self.signed_at.clone()));
        obj.insert(
            "signer_fingerprint".into(),
            Value::String(self.signer_fingerprint.to_string()),
        );
        obj.insert("subject".into(), self.subject.to_json());
        obj.insert("metadata".into(), self.metadata.to_json());
        Value::Object(obj)
    }

    /// Full wire JSON including the signature.
    pub fn to_json(&self) -> Value {
        let mut v = self.unsigned_json();
        if let Value::Object(obj) = &mut v {
            obj.insert("signature".into(), Value::String(self.signature.clone()));
        }
        v
    }
}

impl Serialize for CanonicalProof {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        crate::canonical::canonical_json_value(&self.to_json()).serialize(serializer)
    }
}
