//! Verification policy over an already-resolved proof.
//!
//! Looking the proof up (registry first, database second) is I/O and lives in
//! the registry crate. This module only decides validity, so it is pure and
//! takes "now" as an argument.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::clock::{format_rfc3339, parse_rfc3339};
use crate::codec::ProofCodec;
use crate::model::ResolvedProof;
use crate::signer::Signer;

pub const SIGNATURE_FAILED: &str = "Signature verification failed";
pub const INVALID_TIMESTAMP: &str = "Invalid timestamp format";
pub const INVALID_HASH: &str = "Invalid hash format";

const SECS_PER_HOUR: i64 = 3600;

pub fn timeout_message(timeout_ms: u64) -> String {
    format!("Verification timed out after {timeout_ms}ms")
}

pub fn tolerance_message(observed_hours: i64, tolerance_hours: u32) -> String {
    format!("Timestamp outside tolerance window ({observed_hours}h > {tolerance_hours}h)")
}

/// Result of one verification call. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub valid: bool,
    /// Fingerprint of the key the proof was signed with, when known.
    pub signer: Option<String>,
    pub issued_at: Option<String>,
    pub latency_ms: u64,
    pub errors: Vec<String>,
    /// "registry" or "database"; absent when nothing was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl VerifyOutcome {
    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            valid: false,
            signer: None,
            issued_at: None,
            latency_ms: 0,
            errors,
            source: None,
        }
    }

    pub fn invalid_hash() -> Self {
        Self::invalid(vec![INVALID_HASH.to_string()])
    }

    pub fn timed_out(timeout_ms: u64) -> Self {
        Self::invalid(vec![timeout_message(timeout_ms)])
    }

    /// Neither source produced a proof. Registry error comes first.
    pub fn not_found(registry_error: impl Into<String>, database_error: impl Into<String>) -> Self {
        Self::invalid(vec![registry_error.into(), database_error.into()])
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}

/// Verification policy: signature first, then timestamp tolerance.
#[derive(Debug, Clone, Copy)]
pub struct VerifyPolicy {
    pub tolerance_hours: u32,
}

impl VerifyPolicy {
    pub fn new(tolerance_hours: u32) -> Self {
        Self { tolerance_hours }
    }

    /// Check `proof` as of `now`.
    ///
    /// A signature failure short-circuits the timestamp check, but the
    /// timestamp is still parsed so `issued_at` can be reported.
    pub fn check(&self, proof: &ResolvedProof, codec: &ProofCodec, signer: &Signer, now: OffsetDateTime) -> VerifyOutcome {
        let (signature_ok, signer_fp) = check_signature(proof, codec, signer);
        let parsed = parse_rfc3339(proof.signed_at());

        let mut out = VerifyOutcome {
            valid: false,
            signer: signer_fp,
            issued_at: parsed.as_ref().ok().map(|dt| format_rfc3339(*dt)),
            latency_ms: 0,
            errors: Vec::new(),
            source: Some(proof.source_name().to_string()),
        };

        if !signature_ok {
            out.errors.push(SIGNATURE_FAILED.to_string());
            return out;
        }

        match parsed {
            Err(_) => out.errors.push(INVALID_TIMESTAMP.to_string()),
            Ok(signed_at) => {
                if let Some(msg) = self.skew_error(signed_at, now) {
                    out.errors.push(msg);
                }
            }
        }

        out.valid = out.errors.is_empty();
        out
    }

    fn skew_error(&self, signed_at: OffsetDateTime, now: OffsetDateTime) -> Option<String> {
        let skew = (now - signed_at).whole_seconds().abs();
        let limit = i64::from(self.tolerance_hours) * SECS_PER_HOUR;
        if skew <= limit {
            return None;
        }
        let observed = (skew + SECS_PER_HOUR - 1) / SECS_PER_HOUR;
        Some(tolerance_message(observed, self.tolerance_hours))
    }
}

/// Canonical verify for registry proofs, raw verify for database rows.
fn check_signature(proof: &ResolvedProof, codec: &ProofCodec, signer: &Signer) -> (bool, Option<String>) {
    match proof {
        ResolvedProof::Registry(p) => {
            let claimed = Some(p.signer_fingerprint.to_string());
            let Ok(digest) = codec.signing_digest(p) else {
                return (false, claimed);
            };
            let ok = signer
                .verifying_fingerprint(digest.as_str(), &p.signature)
                .is_some_and(|fp| fp == p.signer_fingerprint);
            (ok, claimed)
        }
        ResolvedProof::Database(r) => match signer.verifying_fingerprint(&r.hash_full, &r.signature) {
            Some(fp) => (true, Some(fp.to_string())),
            None => (false, None),
        },
    }
}
