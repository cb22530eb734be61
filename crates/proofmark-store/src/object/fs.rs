use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use super::{check_key, ObjectStore};
use crate::errors::{StoreError, StoreResult};

/// Objects as files under a root directory; keys map to relative paths.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never sees a partial object.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    name: String,
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            name: format!("fs:{}", root.display()),
            root,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> StoreResult<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn head_object(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_of(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(m) => Ok(m.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::transport("head_object", key, e)),
        }
    }

    async fn get_object(&self, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.path_of(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(StoreError::transport("get_object", key, e)),
        }
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> StoreResult<()> {
        let path = self.path_of(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::transport("put_object", key, e))?;
        }

        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::transport("put_object", key, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::transport("put_object", key, e))
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let root = self.root.clone();
        let prefix_owned = prefix.to_string();
        let walked = tokio::task::spawn_blocking(move || -> Result<Vec<String>, walkdir::Error> {
            if !root.exists() {
                return Ok(Vec::new());
            }
            let mut keys = Vec::new();
            for entry in WalkDir::new(&root).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(rel) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                let key = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(&prefix_owned) && !key.contains(".tmp-") {
                    keys.push(key);
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(|e| StoreError::transport("list_objects", prefix, e))?;

        walked.map_err(|e| StoreError::transport("list_objects", prefix, e))
    }
}
