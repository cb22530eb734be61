use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use proofmark_core::config::LimitsConfig;
use proofmark_core::hash::{HashHex, StreamingHasher};
use proofmark_core::model::Metadata;
use tokio::io::AsyncReadExt;

pub fn read_json_file<P: AsRef<Path>>(path: P) -> Result<serde_json::Value> {
    let raw = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read {}", path.as_ref().display()))?;
    let v: serde_json::Value = serde_json::from_str(&raw).map_err(|e| anyhow!("invalid json: {e}"))?;
    Ok(v)
}

/// Stream a file through sha256 without loading it whole.
pub async fn hash_file<P: AsRef<Path>>(path: P) -> Result<HashHex> {
    let path = path.as_ref();
    let mut f = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("open {}", path.display()))?;
    let mut hasher = StreamingHasher::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = f.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Build metadata from an optional JSON object file plus `key=value` pairs.
/// Pairs win over file entries with the same key.
pub fn build_metadata(file: Option<&str>, pairs: &[String], limits: &LimitsConfig) -> Result<Metadata> {
    let mut meta = match file {
        Some(path) => Metadata::from_json(&read_json_file(path)?, limits)?,
        None => Metadata::new(),
    };
    for pair in pairs {
        let (k, v) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("metadata must be key=value, got {pair:?}"))?;
        if k.trim().is_empty() {
            return Err(anyhow!("metadata key is empty in {pair:?}"));
        }
        meta.insert(k.trim(), v);
    }
    meta.check_limits(limits)?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_override_file_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(&path, r#"{"owner":"legal","pages":12}"#).unwrap();

        let meta = build_metadata(
            path.to_str(),
            &["owner=finance".to_string(), "tag=q3".to_string()],
            &LimitsConfig::default(),
        )
        .unwrap();
        assert_eq!(meta.len(), 3);
        assert_eq!(meta.get("owner"), Some(&"finance".into()));
    }

    #[test]
    fn malformed_pair_is_rejected() {
        assert!(build_metadata(None, &["novalue".to_string()], &LimitsConfig::default()).is_err());
        assert!(build_metadata(None, &["=x".to_string()], &LimitsConfig::default()).is_err());
    }

    #[tokio::test]
    async fn file_hash_matches_in_memory_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        fs::write(&path, b"hello proofmark").unwrap();
        assert_eq!(
            hash_file(&path).await.unwrap(),
            proofmark_core::hash::sha256_hex(b"hello proofmark")
        );
    }
}
