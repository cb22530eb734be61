//! Configuration structures for proofmark-core.
//!
//! This module defines explicit configuration objects used by higher-level
//! components (registry, API, CLI) to control codec strictness, metadata limits,
//! verification tolerance, audit sampling, and registry placement.
//!
//! The core crate itself does not read environment variables. All configuration
//! must be provided explicitly by the caller.

use crate::errors::{ProofmarkError, ProofmarkResult};
use crate::model::AuditSource;

/// Global configuration container.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub codec: CodecConfig,
    pub limits: LimitsConfig,
    pub verification: VerificationConfig,
    pub audit: AuditConfig,
    pub registry: RegistryConfig,
}

/// Codec behaviour.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Reject fields not declared by the matching schema.
    pub strict: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Metadata size and shape limits. Keeps signing input bounded.
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_metadata_keys: usize,
    pub max_key_bytes: usize,
    pub max_string_bytes: usize,
    pub max_array_len: usize,
    pub max_metadata_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_metadata_keys: 64,
            max_key_bytes: 128,
            max_string_bytes: 2048,
            max_array_len: 32,
            max_metadata_bytes: 16 * 1024,
        }
    }
}

/// Verification policy.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Maximum absolute skew between `signed_at` and now, in hours.
    pub timestamp_tolerance_hours: u32,
    /// Upper bound on one verification call.
    pub timeout_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance_hours: 24,
            timeout_ms: 10_000,
        }
    }
}

/// Recovery audit defaults. Individual runs may override these.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub sample_size: usize,
    /// Hard ceiling on `sample_size`.
    pub batch_size: usize,
    pub max_errors: usize,
    pub concurrency: usize,
    pub cross_mirror: bool,
    pub reproducible: bool,
    pub sources: Vec<AuditSource>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            batch_size: 500,
            max_errors: 10,
            concurrency: 8,
            cross_mirror: true,
            reproducible: false,
            sources: vec![AuditSource::Database, AuditSource::ObjectStore],
        }
    }
}

/// Where snapshots are published.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
}

/// A registry configuration with every required field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTarget {
    pub region: String,
    pub bucket: String,
    pub prefix: String,
}

impl RegistryConfig {
    pub fn new(region: impl Into<String>, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            region: Some(region.into()),
            bucket: Some(bucket.into()),
            prefix: Some(prefix.into()),
        }
    }

    /// Resolve all required fields or fail with `Configuration`.
    pub fn require(&self) -> ProofmarkResult<RegistryTarget> {
        fn field(v: &Option<String>, name: &str) -> ProofmarkResult<String> {
            match v.as_deref().map(str::trim) {
                Some(s) if !s.is_empty() => Ok(s.to_string()),
                _ => Err(ProofmarkError::configuration(format!(
                    "registry {name} is not configured"
                ))),
            }
        }

        Ok(RegistryTarget {
            region: field(&self.region, "region")?,
            bucket: field(&self.bucket, "bucket")?,
            prefix: field(&self.prefix, "prefix")?.trim_matches('/').to_string(),
        })
    }
}

impl RegistryTarget {
    /// Public URL of an object key in this registry.
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.bucket, self.region, key
        )
    }
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &CoreConfig) -> ProofmarkResult<()> {
    if cfg.limits.max_metadata_keys == 0 {
        return Err(ProofmarkError::invalid_argument(
            "max_metadata_keys must be greater than zero",
        ));
    }

    if cfg.limits.max_string_bytes > cfg.limits.max_metadata_bytes {
        return Err(ProofmarkError::invalid_argument(
            "max_string_bytes must not exceed max_metadata_bytes",
        ));
    }

    if cfg.verification.timestamp_tolerance_hours == 0 {
        return Err(ProofmarkError::invalid_argument(
            "timestamp_tolerance_hours must be greater than zero",
        ));
    }

    if cfg.audit.concurrency == 0 {
        return Err(ProofmarkError::invalid_argument(
            "audit concurrency must be greater than zero",
        ));
    }

    if cfg.audit.sources.is_empty() {
        return Err(ProofmarkError::invalid_argument(
            "audit needs at least one source",
        ));
    }

    Ok(())
}
