//! Ed25519 signing, verification and key rotation.
//!
//! Signatures travel as standard base64. A key is identified by its
//! fingerprint: sha256 over the DER-encoded SPKI public key.
//!
//! Rotation is an explicit state value:
//!
//! ```text
//! Single{key} --begin_rotation--> Rotating{primary, secondary, cutoff_at}
//!     Rotating --advance(now >= cutoff_at)--> Cutover{primary = secondary, retired += old primary}
//!     Cutover  --begin_rotation--> Rotating (retired keys carried along)
//! ```
//!
//! Verification keys are only ever added. A retired key never signs again but
//! keeps verifying, so no previously valid signature becomes unverifiable.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use time::OffsetDateTime;

use crate::clock::format_rfc3339;
use crate::errors::{ProofmarkError, ProofmarkResult};
use crate::hash::{sha256_hex, HashHex};

/// DER prefix of an Ed25519 SubjectPublicKeyInfo (RFC 8410); the raw 32-byte
/// key follows.
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// sha256 of the SPKI DER encoding of `key`.
pub fn fingerprint(key: &VerifyingKey) -> HashHex {
    let mut der = Vec::with_capacity(ED25519_SPKI_PREFIX.len() + 32);
    der.extend_from_slice(&ED25519_SPKI_PREFIX);
    der.extend_from_slice(key.as_bytes());
    sha256_hex(&der)
}

/// A private signing key with its cached fingerprint.
#[derive(Clone)]
pub struct SigningKeyPair {
    key: SigningKey,
    fingerprint: HashHex,
}

impl SigningKeyPair {
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(secret))
    }

    /// Load a PKCS#8 PEM private key.
    pub fn from_pkcs8_pem(pem: &str) -> ProofmarkResult<Self> {
        let key = SigningKey::from_pkcs8_pem(pem.trim())
            .map_err(|e| ProofmarkError::configuration(format!("invalid signing key PEM: {e}")))?;
        Ok(Self::from_signing_key(key))
    }

    pub fn to_pkcs8_pem(&self) -> ProofmarkResult<String> {
        let pem = self
            .key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| ProofmarkError::signing(format!("encode private key: {e}")))?;
        Ok(pem.to_string())
    }

    fn from_signing_key(key: SigningKey) -> Self {
        let fingerprint = fingerprint(&key.verifying_key());
        Self { key, fingerprint }
    }

    pub fn fingerprint(&self) -> &HashHex {
        &self.fingerprint
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: self.key.verifying_key(),
            fingerprint: self.fingerprint.clone(),
        }
    }

    fn sign_bytes(&self, msg: &[u8]) -> String {
        STANDARD.encode(self.key.sign(msg).to_bytes())
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("fingerprint", &self.fingerprint.as_str())
            .finish_non_exhaustive()
    }
}

/// A public verification key with its cached fingerprint.
#[derive(Clone)]
pub struct PublicKey {
    key: VerifyingKey,
    fingerprint: HashHex,
}

impl PublicKey {
    /// Load an SPKI PEM public key.
    pub fn from_public_key_pem(pem: &str) -> ProofmarkResult<Self> {
        let key = VerifyingKey::from_public_key_pem(pem.trim())
            .map_err(|e| ProofmarkError::configuration(format!("invalid public key PEM: {e}")))?;
        Ok(Self {
            fingerprint: fingerprint(&key),
            key,
        })
    }

    pub fn to_public_key_pem(&self) -> ProofmarkResult<String> {
        self.key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| ProofmarkError::signing(format!("encode public key: {e}")))
    }

    pub fn fingerprint(&self) -> &HashHex {
        &self.fingerprint
    }

    fn verify_bytes(&self, msg: &[u8], sig: &Signature) -> bool {
        self.key.verify(msg, sig).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("fingerprint", &self.fingerprint.as_str())
            .finish()
    }
}

/// Key rotation state.
#[derive(Debug, Clone)]
pub enum KeyRotation {
    Single {
        key: SigningKeyPair,
    },
    Rotating {
        primary: SigningKeyPair,
        secondary: SigningKeyPair,
        cutoff_at: OffsetDateTime,
        retired: Vec<PublicKey>,
    },
    Cutover {
        primary: SigningKeyPair,
        retired: Vec<PublicKey>,
    },
}

impl KeyRotation {
    pub fn single(key: SigningKeyPair) -> Self {
        Self::Single { key }
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Single { .. } => "single",
            Self::Rotating { .. } => "rotating",
            Self::Cutover { .. } => "cutover",
        }
    }

    /// The key that signs right now.
    pub fn primary(&self) -> &SigningKeyPair {
        match self {
            Self::Single { key } => key,
            Self::Rotating { primary, .. } | Self::Cutover { primary, .. } => primary,
        }
    }

    /// Every key a signature may verify against, primary first.
    pub fn verification_keys(&self) -> Vec<PublicKey> {
        match self {
            Self::Single { key } => vec![key.public_key()],
            Self::Rotating {
                primary,
                secondary,
                retired,
                ..
            } => {
                let mut keys = vec![primary.public_key(), secondary.public_key()];
                keys.extend(retired.iter().cloned());
                keys
            }
            Self::Cutover { primary, retired } => {
                let mut keys = vec![primary.public_key()];
                keys.extend(retired.iter().cloned());
                keys
            }
        }
    }

    /// Add keys that no longer sign but must keep verifying, for example the
    /// previous primary after a restart past a cutover. `Single` becomes
    /// `Cutover`. Keys already in the verification set are skipped.
    pub fn with_retired(self, keys: Vec<PublicKey>) -> Self {
        let mut known: Vec<HashHex> = self
            .verification_keys()
            .iter()
            .map(|k| k.fingerprint().clone())
            .collect();
        let mut fresh = Vec::new();
        for k in keys {
            if !known.contains(k.fingerprint()) {
                known.push(k.fingerprint().clone());
                fresh.push(k);
            }
        }
        if fresh.is_empty() {
            return self;
        }

        match self {
            Self::Single { key } => Self::Cutover {
                primary: key,
                retired: fresh,
            },
            Self::Rotating {
                primary,
                secondary,
                cutoff_at,
                mut retired,
            } => {
                retired.extend(fresh);
                Self::Rotating {
                    primary,
                    secondary,
                    cutoff_at,
                    retired,
                }
            }
            Self::Cutover { primary, mut retired } => {
                retired.extend(fresh);
                Self::Cutover { primary, retired }
            }
        }
    }

    /// Add `secondary` to the verification set. It takes over signing once
    /// `advance` observes `cutoff_at`.
    pub fn begin_rotation(self, secondary: SigningKeyPair, cutoff_at: OffsetDateTime) -> ProofmarkResult<Self> {
        if self
            .verification_keys()
            .iter()
            .any(|k| k.fingerprint() == secondary.fingerprint())
        {
            return Err(ProofmarkError::invalid_argument(format!(
                "key {} is already in the verification set",
                secondary.fingerprint()
            )));
        }

        match self {
            Self::Single { key } => Ok(Self::Rotating {
                primary: key,
                secondary,
                cutoff_at,
                retired: Vec::new(),
            }),
            Self::Cutover { primary, retired } => Ok(Self::Rotating {
                primary,
                secondary,
                cutoff_at,
                retired,
            }),
            Self::Rotating { cutoff_at: pending, .. } => Err(ProofmarkError::invalid_argument(format!(
                "rotation already in progress (cutoff {})",
                format_rfc3339(pending)
            ))),
        }
    }

    /// Perform the Rotating → Cutover transition once `now >= cutoff_at`.
    /// Returns whether a transition happened.
    pub fn advance(&mut self, now: OffsetDateTime) -> bool {
        let due = matches!(self, Self::Rotating { cutoff_at, .. } if now >= *cutoff_at);
        if !due {
            return false;
        }

        let placeholder = Self::Cutover {
            primary: self.primary().clone(),
            retired: Vec::new(),
        };
        if let Self::Rotating {
            primary,
            secondary,
            mut retired,
            ..
        } = std::mem::replace(self, placeholder)
        {
            retired.push(primary.public_key());
            *self = Self::Cutover {
                primary: secondary,
                retired,
            };
        }
        true
    }

    /// Explicit cutover; fails unless rotating and past the cutoff.
    pub fn cutover(&mut self, now: OffsetDateTime) -> ProofmarkResult<()> {
        match self {
            Self::Rotating { cutoff_at, .. } if now < *cutoff_at => Err(ProofmarkError::invalid_argument(
                format!("cutover not due until {}", format_rfc3339(*cutoff_at)),
            )),
            Self::Rotating { .. } => {
                self.advance(now);
                Ok(())
            }
            other => Err(ProofmarkError::invalid_argument(format!(
                "cannot cut over from state {}",
                other.state_name()
            ))),
        }
    }
}

/// Signs with the current primary key and verifies against the full key set.
#[derive(Debug, Clone)]
pub struct Signer {
    rotation: KeyRotation,
}

impl Signer {
    pub fn new(rotation: KeyRotation) -> Self {
        Self { rotation }
    }

    pub fn single(key: SigningKeyPair) -> Self {
        Self::new(KeyRotation::single(key))
    }

    pub fn rotation(&self) -> &KeyRotation {
        &self.rotation
    }

    pub fn rotation_mut(&mut self) -> &mut KeyRotation {
        &mut self.rotation
    }

    pub fn fingerprint(&self) -> &HashHex {
        self.rotation.primary().fingerprint()
    }

    /// Sign the decoded bytes of `hash`. Returns base64.
    pub fn sign(&self, hash: &HashHex) -> String {
        self.rotation.primary().sign_bytes(&hash.to_bytes())
    }

    /// Run pending rotation transitions, then sign.
    pub fn sign_at(&mut self, hash: &HashHex, now: OffsetDateTime) -> String {
        self.rotation.advance(now);
        self.sign(hash)
    }

    /// True when `signature_b64` is a valid signature over `hash_hex` under
    /// any verification key. Malformed input is simply `false`.
    pub fn verify(&self, hash_hex: &str, signature_b64: &str) -> bool {
        self.verifying_fingerprint(hash_hex, signature_b64).is_some()
    }

    /// Like `verify`, but names the key that matched.
    pub fn verifying_fingerprint(&self, hash_hex: &str, signature_b64: &str) -> Option<HashHex> {
        let hash = HashHex::parse(hash_hex).ok()?;
        let raw = STANDARD.decode(signature_b64.trim()).ok()?;
        let bytes: [u8; 64] = raw.as_slice().try_into().ok()?;
        let sig = Signature::from_bytes(&bytes);
        let msg = hash.to_bytes();

        self.rotation
            .verification_keys()
            .into_iter()
            .find(|k| k.verify_bytes(&msg, &sig))
            .map(|k| k.fingerprint)
    }
}
