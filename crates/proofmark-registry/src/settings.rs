//! Process settings read from `PROOFMARK_*` environment variables.
//!
//! Shared by the API server and the CLI. Values are looked up through a
//! closure so tests can supply a map instead of the real environment.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use proofmark_core::clock::parse_rfc3339_utc;
use proofmark_core::config::{CoreConfig, RegistryConfig};
use proofmark_core::signer::{KeyRotation, PublicKey, Signer, SigningKeyPair};
use proofmark_core::{ProofmarkError, ProofmarkResult};
use proofmark_store::{FsObjectStore, ObjectStoreRef, ProofRepositoryRef, SqliteStore};
use tracing::{info, warn};

use crate::context::RegistryContext;

pub const SIGNING_KEY_PEM: &str = "PROOFMARK_SIGNING_KEY_PEM";
pub const SECONDARY_KEY_PEM: &str = "PROOFMARK_SECONDARY_KEY_PEM";
pub const ROTATION_CUTOFF: &str = "PROOFMARK_ROTATION_CUTOFF";
pub const REGISTRY_REGION: &str = "PROOFMARK_REGISTRY_REGION";
pub const REGISTRY_BUCKET: &str = "PROOFMARK_REGISTRY_BUCKET";
pub const REGISTRY_PREFIX: &str = "PROOFMARK_REGISTRY_PREFIX";
pub const REGISTRY_DIR: &str = "PROOFMARK_REGISTRY_DIR";
pub const DATABASE_PATH: &str = "PROOFMARK_DATABASE_PATH";
pub const TOLERANCE_HOURS: &str = "PROOFMARK_TOLERANCE_HOURS";
pub const VERIFY_TIMEOUT_MS: &str = "PROOFMARK_VERIFY_TIMEOUT_MS";
pub const MIRRORS: &str = "PROOFMARK_MIRRORS";
/// Comma-separated public keys (inline SPKI PEM or file paths) that signed
/// earlier proofs and must keep verifying.
pub const RETIRED_PUBLIC_KEYS: &str = "PROOFMARK_RETIRED_PUBLIC_KEYS";

const DEFAULT_DATABASE: &str = "proofmark.db";

/// Where registry objects live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryBackend {
    /// Local directory (`PROOFMARK_REGISTRY_DIR`).
    Directory(PathBuf),
    /// Amazon S3, addressed by the registry region and bucket.
    S3,
    None,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub core: CoreConfig,
    /// PEM text of the primary signing key, when configured.
    pub signing_key_pem: Option<String>,
    pub secondary_key_pem: Option<String>,
    pub rotation_cutoff: Option<String>,
    /// PEM text of each retired verification key.
    pub retired_public_keys: Vec<String>,
    pub database_path: PathBuf,
    pub registry: RegistryBackend,
    pub mirrors: Vec<PathBuf>,
}

impl Settings {
    pub fn from_env() -> ProofmarkResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ProofmarkResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut core = CoreConfig {
            registry: RegistryConfig {
                region: get(REGISTRY_REGION),
                bucket: get(REGISTRY_BUCKET),
                prefix: get(REGISTRY_PREFIX),
            },
            ..CoreConfig::default()
        };
        if let Some(v) = get(TOLERANCE_HOURS) {
            core.verification.timestamp_tolerance_hours = parse_number(TOLERANCE_HOURS, &v)?;
        }
        if let Some(v) = get(VERIFY_TIMEOUT_MS) {
            core.verification.timeout_ms = parse_number(VERIFY_TIMEOUT_MS, &v)?;
        }

        let registry = match (get(REGISTRY_DIR), core.registry.bucket.is_some()) {
            (Some(dir), _) => RegistryBackend::Directory(PathBuf::from(dir)),
            (None, true) => RegistryBackend::S3,
            (None, false) => RegistryBackend::None,
        };

        let mirrors: Vec<PathBuf> = get(MIRRORS)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        let retired_public_keys = get(RETIRED_PUBLIC_KEYS)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| read_pem(s.to_string()))
                    .collect::<ProofmarkResult<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            core,
            signing_key_pem: get(SIGNING_KEY_PEM).map(read_pem).transpose()?,
            secondary_key_pem: get(SECONDARY_KEY_PEM).map(read_pem).transpose()?,
            rotation_cutoff: get(ROTATION_CUTOFF),
            retired_public_keys,
            database_path: get(DATABASE_PATH).map_or_else(|| PathBuf::from(DEFAULT_DATABASE), PathBuf::from),
            registry,
            mirrors,
        })
    }

    /// Build the signer, including a pending rotation when one is configured.
    pub fn signer(&self) -> ProofmarkResult<Signer> {
        let pem = self
            .signing_key_pem
            .as_deref()
            .ok_or_else(|| ProofmarkError::configuration(format!("{SIGNING_KEY_PEM} is not set")))?;
        let retired = self
            .retired_public_keys
            .iter()
            .map(|p| PublicKey::from_public_key_pem(p))
            .collect::<ProofmarkResult<Vec<_>>>()
            .map_err(|e| ProofmarkError::configuration(format!("{RETIRED_PUBLIC_KEYS}: {e}")))?;
        let mut rotation = KeyRotation::single(SigningKeyPair::from_pkcs8_pem(pem)?).with_retired(retired);

        match (&self.secondary_key_pem, &self.rotation_cutoff) {
            (Some(secondary), Some(cutoff)) => {
                let cutoff_at = parse_rfc3339_utc(cutoff)
                    .map_err(|e| ProofmarkError::configuration(format!("{ROTATION_CUTOFF}: {e}")))?;
                rotation = rotation.begin_rotation(SigningKeyPair::from_pkcs8_pem(secondary)?, cutoff_at)?;
            }
            (Some(_), None) => {
                return Err(ProofmarkError::configuration(format!(
                    "{SECONDARY_KEY_PEM} requires {ROTATION_CUTOFF}"
                )));
            }
            (None, Some(_)) => warn!("{ROTATION_CUTOFF} is set without {SECONDARY_KEY_PEM}; ignoring"),
            (None, None) => {}
        }
        Ok(Signer::new(rotation))
    }

    pub fn context(&self) -> ProofmarkResult<Arc<RegistryContext>> {
        RegistryContext::with_system_clock(self.core.clone(), self.signer()?)
    }

    pub fn open_repository(&self) -> ProofmarkResult<ProofRepositoryRef> {
        info!(path = %self.database_path.display(), "opening proof database");
        Ok(Arc::new(SqliteStore::open(&self.database_path)?))
    }

    /// The primary registry store, if one is configured.
    pub async fn open_registry(&self) -> ProofmarkResult<Option<ObjectStoreRef>> {
        match &self.registry {
            RegistryBackend::Directory(dir) => {
                Ok(Some(Arc::new(FsObjectStore::new(dir.clone()).with_name("registry"))))
            }
            RegistryBackend::S3 => open_s3(&self.core.registry).await.map(Some),
            RegistryBackend::None => Ok(None),
        }
    }

    pub fn open_mirrors(&self) -> Vec<ObjectStoreRef> {
        self.mirrors
            .iter()
            .enumerate()
            .map(|(i, dir)| {
                Arc::new(FsObjectStore::new(dir.clone()).with_name(format!("mirror-{}", i + 1))) as ObjectStoreRef
            })
            .collect()
    }
}

#[cfg(feature = "s3")]
async fn open_s3(cfg: &RegistryConfig) -> ProofmarkResult<ObjectStoreRef> {
    let target = cfg.require()?;
    let store = proofmark_store::S3ObjectStore::connect(&target.region, &target.bucket).await;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "s3"))]
async fn open_s3(_cfg: &RegistryConfig) -> ProofmarkResult<ObjectStoreRef> {
    Err(ProofmarkError::configuration(format!(
        "{REGISTRY_BUCKET} is set but this build has no S3 support; set {REGISTRY_DIR} or enable the `s3` feature"
    )))
}

/// Accept inline PEM text or a path to a PEM file.
fn read_pem(value: String) -> ProofmarkResult<String> {
    if value.starts_with("-----BEGIN") {
        return Ok(value);
    }
    fs::read_to_string(&value).map_err(|e| ProofmarkError::configuration(format!("cannot read key file {value}: {e}")))
}

fn parse_number<T: std::str::FromStr>(name: &str, v: &str) -> ProofmarkResult<T> {
    v.parse()
        .map_err(|_| ProofmarkError::configuration(format!("{name} must be a non-negative integer, got {v:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proofmark_store::ObjectStore;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    fn pem(seed: u8) -> String {
        SigningKeyPair::from_bytes(&[seed; 32]).to_pkcs8_pem().unwrap()
    }

    #[test]
    fn defaults_without_environment() {
        let s = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(s.database_path, PathBuf::from("proofmark.db"));
        assert_eq!(s.registry, RegistryBackend::None);
        assert_eq!(s.core.verification.timestamp_tolerance_hours, 24);
        assert!(s.mirrors.is_empty());
        assert_matches!(s.signer(), Err(ProofmarkError::Configuration(_)));
    }

    #[test]
    fn reads_registry_and_tolerance() {
        let s = Settings::from_lookup(lookup(&[
            (REGISTRY_REGION, "eu-west-1"),
            (REGISTRY_BUCKET, "proofs"),
            (REGISTRY_PREFIX, "prod"),
            (TOLERANCE_HOURS, "48"),
            (MIRRORS, "/srv/m1, /srv/m2,"),
        ]))
        .unwrap();
        assert_eq!(s.registry, RegistryBackend::S3);
        assert_eq!(s.core.registry.require().unwrap().bucket, "proofs");
        assert_eq!(s.core.verification.timestamp_tolerance_hours, 48);
        assert_eq!(s.mirrors, vec![PathBuf::from("/srv/m1"), PathBuf::from("/srv/m2")]);
        assert_eq!(s.open_mirrors()[1].name(), "mirror-2");
    }

    #[test]
    fn bad_number_is_a_configuration_error() {
        let err = Settings::from_lookup(lookup(&[(TOLERANCE_HOURS, "a day")])).unwrap_err();
        assert_matches!(err, ProofmarkError::Configuration(msg) if msg.contains(TOLERANCE_HOURS));
    }

    #[test]
    fn rotation_from_environment() {
        let (first, second) = (pem(1), pem(2));
        let s = Settings::from_lookup(lookup(&[
            (SIGNING_KEY_PEM, first.as_str()),
            (SECONDARY_KEY_PEM, second.as_str()),
            (ROTATION_CUTOFF, "2030-01-01T00:00:00Z"),
        ]))
        .unwrap();
        let signer = s.signer().unwrap();
        assert_eq!(signer.rotation().state_name(), "rotating");
        assert_eq!(signer.fingerprint(), SigningKeyPair::from_bytes(&[1; 32]).fingerprint());

        let missing_cutoff = Settings::from_lookup(lookup(&[
            (SIGNING_KEY_PEM, first.as_str()),
            (SECONDARY_KEY_PEM, second.as_str()),
        ]))
        .unwrap();
        assert_matches!(missing_cutoff.signer(), Err(ProofmarkError::Configuration(_)));
    }

    #[test]
    fn key_may_come_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signing.pem");
        std::fs::write(&path, pem(3)).unwrap();
        let s = Settings::from_lookup(lookup(&[(SIGNING_KEY_PEM, path.to_str().unwrap())])).unwrap();
        assert_eq!(s.signer().unwrap().fingerprint(), SigningKeyPair::from_bytes(&[3; 32]).fingerprint());
    }

    #[test]
    fn retired_keys_keep_old_proofs_verifiable() {
        let old = SigningKeyPair::from_bytes(&[1; 32]);
        let h = proofmark_core::hash::sha256_hex(b"issued before cutover");
        let old_signature = Signer::single(old.clone()).sign(&h);

        let dir = tempfile::tempdir().unwrap();
        let old_pub = dir.path().join("old.pub.pem");
        std::fs::write(&old_pub, old.public_key().to_public_key_pem().unwrap()).unwrap();
        let other_pub = SigningKeyPair::from_bytes(&[9; 32]).public_key().to_public_key_pem().unwrap();
        let retired = format!("{}, {}", old_pub.display(), other_pub);

        // the new key has been promoted into the signing slot
        let new = pem(2);
        let s = Settings::from_lookup(lookup(&[(SIGNING_KEY_PEM, new.as_str()), (RETIRED_PUBLIC_KEYS, retired.as_str())]))
            .unwrap();
        let signer = s.signer().unwrap();
        assert_eq!(signer.fingerprint(), SigningKeyPair::from_bytes(&[2; 32]).fingerprint());
        assert_eq!(signer.rotation().state_name(), "cutover");
        assert_eq!(signer.verifying_fingerprint(h.as_str(), &old_signature).as_ref(), Some(old.fingerprint()));

        let without = Settings::from_lookup(lookup(&[(SIGNING_KEY_PEM, new.as_str())])).unwrap();
        assert!(!without.signer().unwrap().verify(h.as_str(), &old_signature));
    }

    #[test]
    fn unreadable_retired_key_is_a_configuration_error() {
        let first = pem(1);
        let s = Settings::from_lookup(lookup(&[
            (SIGNING_KEY_PEM, first.as_str()),
            (RETIRED_PUBLIC_KEYS, "-----BEGIN PUBLIC KEY-----\nnope\n-----END PUBLIC KEY-----"),
        ]))
        .unwrap();
        assert_matches!(s.signer(), Err(ProofmarkError::Configuration(msg)) if msg.contains(RETIRED_PUBLIC_KEYS));
    }
}
