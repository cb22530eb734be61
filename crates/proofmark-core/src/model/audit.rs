//! Recovery audit artifacts. Regenerated on every run.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ValidationError;

/// Where a proof was recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditSource {
    Database,
    ObjectStore,
    Mirror,
}

impl AuditSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::ObjectStore => "object-store",
            Self::Mirror => "mirror",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s {
            "database" => Ok(Self::Database),
            "object-store" => Ok(Self::ObjectStore),
            "mirror" => Ok(Self::Mirror),
            other => Err(ValidationError::invalid_field(
                "source",
                format!("unknown audit source: {other}"),
            )),
        }
    }
}

impl fmt::Display for AuditSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of re-deriving one sampled proof from every audited source.
/// `source` names the source whose copy `recovered_hash` came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditResult {
    pub proof_id: i64,
    pub original_hash: String,
    pub recovered_hash: Option<String>,
    pub hash_match: bool,
    pub signature_valid: bool,
    pub source: AuditSource,
    pub recovery_time_ms: u64,
    /// Share of the checks run on this sample that passed, 0..=100.
    pub integrity_score: u8,
    /// `None` when cross-mirror validation was not run for this sample.
    #[serde(default)]
    pub mirror_consistent: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuditResult {
    /// hash match ∧ signature valid ∧ (mirror-consistent, if checked)
    pub fn recovered(&self) -> bool {
        self.hash_match && self.signature_valid && self.mirror_consistent != Some(false)
    }
}

/// Per-run aggregate. Counts always equal the detailed results they summarize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub run_id: Uuid,
    pub started_at: String,
    pub finished_at: String,
    pub total_audited: u64,
    pub successful_recoveries: u64,
    pub failed_recoveries: u64,
    pub mirror_inconsistencies: u64,
    /// 100 × successful / total, two decimals. 0 for an empty run.
    pub integrity_score: f64,
    pub halted_early: bool,
}

/// One mirror whose copy disagrees with consensus (or could not be read).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorDiscrepancy {
    pub mirror: String,
    /// `None` when the mirror had no readable copy.
    pub observed_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossMirrorValidation {
    pub proof_id: i64,
    pub consensus_hash: Option<String>,
    pub consistent: bool,
    pub discrepancies: Vec<MirrorDiscrepancy>,
}
