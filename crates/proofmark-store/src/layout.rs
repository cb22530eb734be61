//! Deterministic object keys inside a registry prefix.
//!
//! ```text
//! <prefix>/snapshots/<batch_id>.manifest.json
//! <prefix>/snapshots/<batch_id>.jsonl.gz
//! <prefix>/proofs/<hash_full>.json
//! ```

use proofmark_core::hash::HashHex;
use proofmark_core::layout::{EXPORT_SUFFIX, MANIFEST_SUFFIX, PROOFS_DIR, SNAPSHOTS_DIR};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLayout {
    prefix: String,
}

impl RegistryLayout {
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: prefix.as_ref().trim_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn manifest_key(&self, batch_id: u64) -> String {
        self.join(&format!("{SNAPSHOTS_DIR}/{batch_id}{MANIFEST_SUFFIX}"))
    }

    pub fn export_key(&self, batch_id: u64) -> String {
        self.join(&format!("{SNAPSHOTS_DIR}/{batch_id}{EXPORT_SUFFIX}"))
    }

    pub fn proof_key(&self, hash: &HashHex) -> String {
        self.join(&format!("{PROOFS_DIR}/{hash}.json"))
    }

    pub fn snapshots_prefix(&self) -> String {
        self.join(&format!("{SNAPSHOTS_DIR}/"))
    }

    /// Batch id encoded in a manifest key, if `key` is one.
    pub fn batch_id_of_manifest(&self, key: &str) -> Option<u64> {
        key.strip_prefix(&self.snapshots_prefix())?
            .strip_suffix(MANIFEST_SUFFIX)?
            .parse()
            .ok()
    }

    fn join(&self, rest: &str) -> String {
        if self.prefix.is_empty() {
            rest.to_string()
        } else {
            format!("{}/{rest}", self.prefix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofmark_core::hash::sha256_hex;

    #[test]
    fn keys_are_deterministic() {
        let l = RegistryLayout::new("/prod/");
        assert_eq!(l.manifest_key(12), "prod/snapshots/12.manifest.json");
        assert_eq!(l.export_key(12), "prod/snapshots/12.jsonl.gz");
        let h = sha256_hex(b"a");
        assert_eq!(l.proof_key(&h), format!("prod/proofs/{h}.json"));
    }

    #[test]
    fn manifest_key_parses_back() {
        let l = RegistryLayout::new("prod");
        assert_eq!(l.batch_id_of_manifest(&l.manifest_key(7)), Some(7));
        assert_eq!(l.batch_id_of_manifest(&l.export_key(7)), None);
        assert_eq!(l.batch_id_of_manifest("other/snapshots/7.manifest.json"), None);
    }
}
