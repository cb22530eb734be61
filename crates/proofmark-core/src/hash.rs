//! Hashing utilities for proofmark.
//!
//! All content hashes are sha256 and travel as lowercase hex (`HashHex`).
//! Parsing is strict: exactly 64 characters from `[a-f0-9]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ValidationError;

/// Length of a sha256 digest in hex characters.
pub const HASH_HEX_LEN: usize = 64;

/// Hash algorithm identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgo {
    #[default]
    Sha256,
}

impl HashAlgo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "sha256" => Ok(Self::Sha256),
            other => Err(ValidationError::invalid_field(
                "hash_algo",
                format!("unsupported hash algorithm: {other}"),
            )),
        }
    }
}

/// A validated lowercase sha256 hex digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HashHex(String);

impl HashHex {
    /// Parse a strict lowercase hex digest.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if is_hash_hex(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ValidationError::InvalidHash)
        }
    }

    /// Lenient parse for user input: trims whitespace and lowercases first.
    pub fn parse_user_input(s: &str) -> Result<Self, ValidationError> {
        Self::parse(&s.trim().to_ascii_lowercase())
    }

    pub fn from_digest(bytes: [u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decoded digest bytes. Infallible because construction validated the hex.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (i, chunk) in self.0.as_bytes().chunks(2).enumerate() {
            out[i] = (nibble(chunk[0]) << 4) | nibble(chunk[1]);
        }
        out
    }
}

fn nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        _ => c - b'a' + 10,
    }
}

impl fmt::Display for HashHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HashHex {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HashHex {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if is_hash_hex(&s) {
            Ok(Self(s))
        } else {
            Err(ValidationError::InvalidHash)
        }
    }
}

impl From<HashHex> for String {
    fn from(h: HashHex) -> Self {
        h.0
    }
}

impl AsRef<str> for HashHex {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `^[a-f0-9]{64}$`
pub fn is_hash_hex(s: &str) -> bool {
    s.len() == HASH_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// sha256 of raw bytes.
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// sha256 of raw bytes as `HashHex`.
pub fn sha256_hex(bytes: &[u8]) -> HashHex {
    HashHex::from_digest(sha256(bytes))
}

/// Incremental sha256 for streamed content (file uploads).
#[derive(Default)]
pub struct StreamingHasher {
    inner: Sha256,
    bytes: u64,
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.bytes += chunk.len() as u64;
        self.inner.update(chunk);
    }

    pub fn bytes_seen(&self) -> u64 {
        self.bytes
    }

    pub fn finalize(self) -> HashHex {
        HashHex::from_digest(self.inner.finalize().into())
    }
}
