//! Version helpers.
//!
//! Proof documents carry an integer `schema_version`. Each integer maps to a
//! human label used by operators ("1.0", "1.1"). Parsing is strict and returns
//! stable errors for unknown versions.

use crate::errors::ValidationError;

/// Known proof schema versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaVersion {
    /// "1.0": no `hash_algo` field, sha256 implied.
    V1_0,
    /// "1.1": optional `hash_algo` field.
    V1_1,
}

impl SchemaVersion {
    /// The version new proofs are stamped with.
    pub const CURRENT: SchemaVersion = SchemaVersion::V1_1;

    /// All versions, oldest first.
    pub const ALL: [SchemaVersion; 2] = [SchemaVersion::V1_0, SchemaVersion::V1_1];

    /// Parse the wire integer.
    pub fn from_wire(n: u32) -> Result<Self, ValidationError> {
        match n {
            1 => Ok(Self::V1_0),
            2 => Ok(Self::V1_1),
            other => Err(ValidationError::UnsupportedSchemaVersion(other)),
        }
    }

    /// Parse an operator label (e.g. "1.1").
    pub fn parse_label(s: &str) -> Result<Self, ValidationError> {
        match s {
            "1.0" => Ok(Self::V1_0),
            "1.1" => Ok(Self::V1_1),
            other => Err(ValidationError::UnknownSchema(other.to_string())),
        }
    }

    pub fn as_wire(&self) -> u32 {
        match self {
            Self::V1_0 => 1,
            Self::V1_1 => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
        }
    }

    /// Whether the signing bytes include `hash_algo`.
    pub fn signs_hash_algo(&self) -> bool {
        *self >= Self::V1_1
    }
}
