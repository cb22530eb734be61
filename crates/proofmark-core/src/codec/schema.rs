//! Registered proof schemas.
//!
//! Every schema that was ever used to issue proofs stays registered. A newer
//! schema lists the older versions it accepts, so old proofs keep validating
//! after an upgrade.
//!
//! The registry does not validate documents itself; `ProofCodec` does.

use std::collections::BTreeMap;

use crate::errors::{ProofmarkError, ProofmarkResult, ValidationError};
use crate::version::SchemaVersion;

const FIELDS_1_0: &[&str] = &[
    "schema_version",
    "hash_full",
    "signed_at",
    "signer_fingerprint",
    "subject",
    "metadata",
    "signature",
];

/// Field layout of one schema version.
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub version: SchemaVersion,
    pub required: Vec<&'static str>,
    pub optional: Vec<&'static str>,
    /// Wire versions this schema accepts, including its own.
    pub accepts: Vec<SchemaVersion>,
}

impl SchemaDefinition {
    pub fn v1_0() -> Self {
        Self {
            version: SchemaVersion::V1_0,
            required: FIELDS_1_0.to_vec(),
            optional: vec![],
            accepts: vec![SchemaVersion::V1_0],
        }
    }

    pub fn v1_1() -> Self {
        Self {
            version: SchemaVersion::V1_1,
            required: FIELDS_1_0.to_vec(),
            optional: vec!["hash_algo"],
            accepts: vec![SchemaVersion::V1_0, SchemaVersion::V1_1],
        }
    }

    pub fn label(&self) -> &'static str {
        self.version.label()
    }

    pub fn allows_field(&self, name: &str) -> bool {
        self.required.contains(&name) || self.optional.contains(&name)
    }

    pub fn accepts_version(&self, v: SchemaVersion) -> bool {
        self.accepts.contains(&v)
    }

    fn check(&self) -> ProofmarkResult<()> {
        if !self.accepts_version(self.version) {
            return Err(ProofmarkError::invalid_argument(format!(
                "schema {} must accept its own version",
                self.label()
            )));
        }
        if self.accepts.iter().any(|v| *v > self.version) {
            return Err(ProofmarkError::invalid_argument(format!(
                "schema {} cannot accept newer versions",
                self.label()
            )));
        }
        Ok(())
    }
}

/// Registered schemas keyed by version, oldest first.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<SchemaVersion, SchemaDefinition>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in schema.
    pub fn builtin() -> ProofmarkResult<Self> {
        Self::with_definitions([SchemaDefinition::v1_0(), SchemaDefinition::v1_1()])
    }

    /// Register each definition in turn, stopping at the first rejected one.
    pub fn with_definitions(defs: impl IntoIterator<Item = SchemaDefinition>) -> ProofmarkResult<Self> {
        let mut r = Self::new();
        for def in defs {
            r.register(def)?;
        }
        Ok(r)
    }

    pub fn register(&mut self, def: SchemaDefinition) -> ProofmarkResult<()> {
        def.check()?;
        if self.schemas.contains_key(&def.version) {
            return Err(ProofmarkError::invalid_argument(format!(
                "schema already registered: {}",
                def.label()
            )));
        }
        self.schemas.insert(def.version, def);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn get(&self, v: SchemaVersion) -> Option<&SchemaDefinition> {
        self.schemas.get(&v)
    }

    pub fn by_label(&self, label: &str) -> Result<&SchemaDefinition, ValidationError> {
        let v = SchemaVersion::parse_label(label)?;
        self.get(v)
            .ok_or_else(|| ValidationError::UnknownSchema(label.to_string()))
    }

    /// Newest registered schema that accepts `v`.
    pub fn newest_accepting(&self, v: SchemaVersion) -> Option<&SchemaDefinition> {
        self.schemas.values().rev().find(|d| d.accepts_version(v))
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.schemas.values().map(SchemaDefinition::label).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_has_both_versions() {
        let r = SchemaRegistry::builtin().unwrap();
        assert_eq!(r.labels(), vec!["1.0", "1.1"]);
    }

    #[test]
    fn newest_schema_wins() {
        let r = SchemaRegistry::builtin().unwrap();
        assert_eq!(
            r.newest_accepting(SchemaVersion::V1_0).unwrap().version,
            SchemaVersion::V1_1
        );
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut r = SchemaRegistry::builtin().unwrap();
        assert!(r.register(SchemaDefinition::v1_1()).is_err());
    }

    #[test]
    fn rejected_definition_fails_the_whole_set() {
        let mut bad = SchemaDefinition::v1_1();
        bad.accepts.retain(|v| *v != SchemaVersion::V1_1);
        let err = SchemaRegistry::with_definitions([SchemaDefinition::v1_0(), bad]).unwrap_err();
        assert!(err.to_string().contains("must accept its own version"));

        let dup = SchemaRegistry::with_definitions([SchemaDefinition::v1_0(), SchemaDefinition::v1_0()]);
        assert!(dup.unwrap_err().to_string().contains("already registered: 1.0"));
    }

    #[test]
    fn forward_acceptance_rejected() {
        let mut bad = SchemaDefinition::v1_0();
        bad.accepts.push(SchemaVersion::V1_1);
        assert!(SchemaRegistry::new().register(bad).is_err());
    }
}
