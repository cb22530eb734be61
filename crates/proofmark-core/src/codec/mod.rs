//! Canonical proof codec.
//!
//! Owns the registered schema set and turns between wire JSON and
//! `CanonicalProof`:
//! - `canonicalize` builds a new, unsigned proof at the current schema version
//! - `serialize_for_signing` produces the exact bytes the signature covers
//! - `validate` checks a raw document against the newest schema accepting its
//!   version; `validate_against` checks it against one named schema
//!
//! Backward compatibility is a hard requirement: a proof issued under an older
//! schema must keep validating (and keep its signature bytes) under every newer
//! schema that accepts it.

mod schema;

pub use schema::{SchemaDefinition, SchemaRegistry};

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::canonical::canonical_json_bytes;
use crate::clock::{format_rfc3339, parse_rfc3339_utc};
use crate::config::{CodecConfig, CoreConfig, LimitsConfig};
use crate::errors::{ProofmarkError, ProofmarkResult, ValidationError};
use crate::hash::{is_hash_hex, sha256_hex, HashAlgo, HashHex};
use crate::model::{CanonicalProof, Metadata, Subject};
use crate::version::SchemaVersion;

const SUBJECT_FIELDS: [&str; 3] = ["type", "namespace", "id"];
const MAX_SUBJECT_FIELD_BYTES: usize = 256;

/// Proof encoder/validator. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ProofCodec {
    schemas: SchemaRegistry,
    limits: LimitsConfig,
    strict: bool,
}

impl ProofCodec {
    pub fn new(schemas: SchemaRegistry, limits: LimitsConfig, codec: &CodecConfig) -> ProofmarkResult<Self> {
        if schemas.get(SchemaVersion::CURRENT).is_none() {
            return Err(ProofmarkError::configuration(format!(
                "current schema {} is not registered",
                SchemaVersion::CURRENT.label()
            )));
        }
        Ok(Self {
            schemas,
            limits,
            strict: codec.strict,
        })
    }

    pub fn from_config(cfg: &CoreConfig) -> ProofmarkResult<Self> {
        Self::new(SchemaRegistry::builtin()?, cfg.limits.clone(), &cfg.codec)
    }

    /// Built-in schemas with default limits and strict decoding.
    pub fn builtin() -> ProofmarkResult<Self> {
        Self::from_config(&CoreConfig::default())
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn current_version(&self) -> SchemaVersion {
        SchemaVersion::CURRENT
    }

    /// Build an unsigned proof stamped with the current schema version.
    pub fn canonicalize(
        &self,
        hash: HashHex,
        subject: Subject,
        metadata: Metadata,
        signer_fingerprint: HashHex,
        signed_at: OffsetDateTime,
    ) -> Result<CanonicalProof, ValidationError> {
        check_subject(&subject)?;
        metadata.check_limits(&self.limits)?;

        Ok(CanonicalProof {
            schema_version: self.current_version(),
            hash_algo: HashAlgo::Sha256,
            hash_full: hash,
            signed_at: format_rfc3339(signed_at),
            signer_fingerprint,
            subject,
            metadata,
            signature: String::new(),
        })
    }

    /// Deterministic bytes covered by the signature (everything but `signature`).
    pub fn serialize_for_signing(&self, proof: &CanonicalProof) -> ProofmarkResult<Vec<u8>> {
        canonical_json_bytes(&proof.unsigned_json())
    }

    /// sha256 of `serialize_for_signing`; this digest is what gets signed.
    pub fn signing_digest(&self, proof: &CanonicalProof) -> ProofmarkResult<HashHex> {
        Ok(sha256_hex(&self.serialize_for_signing(proof)?))
    }

    /// Canonical wire bytes, signature included.
    pub fn to_json_bytes(&self, proof: &CanonicalProof) -> ProofmarkResult<Vec<u8>> {
        canonical_json_bytes(&proof.to_json())
    }

    /// Parse bytes as JSON, then `validate`.
    pub fn decode(&self, bytes: &[u8]) -> Result<CanonicalProof, ValidationError> {
        let raw: Value = serde_json::from_slice(bytes)
            .map_err(|e| ValidationError::invalid_field("document", e.to_string()))?;
        self.validate(&raw)
    }

    /// Validate against the newest registered schema that accepts the
    /// document's `schema_version`.
    pub fn validate(&self, raw: &Value) -> Result<CanonicalProof, ValidationError> {
        let version = read_version(raw)?;
        let def = self
            .schemas
            .newest_accepting(version)
            .ok_or(ValidationError::UnsupportedSchemaVersion(version.as_wire()))?;
        self.validate_with(raw, version, def)
    }

    /// Validate against one named schema, e.g. `"1.1"`.
    pub fn validate_against(&self, raw: &Value, label: &str) -> Result<CanonicalProof, ValidationError> {
        let def = self.schemas.by_label(label)?;
        let version = read_version(raw)?;
        if !def.accepts_version(version) {
            return Err(ValidationError::UnsupportedSchemaVersion(version.as_wire()));
        }
        self.validate_with(raw, version, def)
    }

    fn validate_with(
        &self,
        raw: &Value,
        version: SchemaVersion,
        def: &SchemaDefinition,
    ) -> Result<CanonicalProof, ValidationError> {
        let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;

        if self.strict {
            if let Some(k) = obj.keys().find(|k| !def.allows_field(k)) {
                return Err(ValidationError::UnknownField(k.clone()));
            }
        }
        for field in &def.required {
            if !obj.contains_key(*field) {
                return Err(ValidationError::MissingField((*field).to_string()));
            }
        }

        let hash_algo = match obj.get("hash_algo") {
            None => HashAlgo::Sha256,
            Some(_) if !version.signs_hash_algo() => {
                return Err(ValidationError::invalid_field(
                    "hash_algo",
                    format!("not defined for schema {}", version.label()),
                ));
            }
            Some(v) => HashAlgo::parse(str_field(v, "hash_algo")?)?,
        };

        let hash_full = HashHex::parse(str_field(&obj["hash_full"], "hash_full")?)?;

        let signed_at = str_field(&obj["signed_at"], "signed_at")?;
        parse_rfc3339_utc(signed_at)?;

        let fp = str_field(&obj["signer_fingerprint"], "signer_fingerprint")?;
        if !is_hash_hex(fp) {
            return Err(ValidationError::invalid_field(
                "signer_fingerprint",
                "must be 64 lowercase hex characters",
            ));
        }

        let subject = self.read_subject(&obj["subject"])?;
        let metadata = Metadata::from_json(&obj["metadata"], &self.limits)?;
        let signature = str_field(&obj["signature"], "signature")?;
        if signature.is_empty() {
            return Err(ValidationError::invalid_field("signature", "must not be empty"));
        }

        Ok(CanonicalProof {
            schema_version: version,
            hash_algo,
            hash_full,
            signed_at: signed_at.to_string(),
            signer_fingerprint: HashHex::parse(fp)?,
            subject,
            metadata,
            signature: signature.to_string(),
        })
    }

    fn read_subject(&self, v: &Value) -> Result<Subject, ValidationError> {
        let obj: &Map<String, Value> = v
            .as_object()
            .ok_or_else(|| ValidationError::invalid_field("subject", "must be an object"))?;

        if self.strict {
            if let Some(k) = obj.keys().find(|k| !SUBJECT_FIELDS.contains(&k.as_str())) {
                return Err(ValidationError::UnknownField(format!("subject.{k}")));
            }
        }

        let get = |name: &str| -> Result<String, ValidationError> {
            let field = format!("subject.{name}");
            obj.get(name)
                .ok_or_else(|| ValidationError::MissingField(field.clone()))
                .and_then(|v| str_field(v, &field).map(str::to_string))
        };

        let subject = Subject::new(get("type")?, get("namespace")?, get("id")?);
        check_subject(&subject)?;
        Ok(subject)
    }
}

fn read_version(raw: &Value) -> Result<SchemaVersion, ValidationError> {
    let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;
    let v = obj
        .get("schema_version")
        .ok_or_else(|| ValidationError::MissingField("schema_version".into()))?;
    let n = v
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| ValidationError::invalid_field("schema_version", "must be a positive integer"))?;
    SchemaVersion::from_wire(n)
}

fn str_field<'a>(v: &'a Value, field: &str) -> Result<&'a str, ValidationError> {
    v.as_str()
        .ok_or_else(|| ValidationError::invalid_field(field, "must be a string"))
}

fn check_subject(s: &Subject) -> Result<(), ValidationError> {
    for (name, value) in [("type", &s.r#type), ("namespace", &s.namespace), ("id", &s.id)] {
        if value.trim().is_empty() {
            return Err(ValidationError::invalid_field(
                format!("subject.{name}"),
                "must not be empty",
            ));
        }
        if value.len() > MAX_SUBJECT_FIELD_BYTES {
            return Err(ValidationError::invalid_field(
                format!("subject.{name}"),
                format!("exceeds {MAX_SUBJECT_FIELD_BYTES} bytes"),
            ));
        }
    }
    Ok(())
}
