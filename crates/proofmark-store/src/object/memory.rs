use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{check_key, ObjectStore};
use crate::errors::{StoreError, StoreResult};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Call counts, read with `MemoryObjectStore::calls`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub heads: u64,
    pub gets: u64,
    pub puts: u64,
    pub lists: u64,
}

impl StoreCalls {
    pub fn total(&self) -> u64 {
        self.heads + self.gets + self.puts + self.lists
    }
}

/// In-process object store.
///
/// Every call is counted, including calls that fail by injection. Faults are
/// reported as `TransportError`s wrapping an `io::Error`, which is how a real
/// client failure reaches callers.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    heads: AtomicU64,
    gets: AtomicU64,
    puts: AtomicU64,
    lists: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            heads: self.heads.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            lists: self.lists.load(Ordering::Relaxed),
        }
    }

    /// Make `head_object`, `get_object` and `list_keys` fail.
    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::Relaxed);
    }

    /// Make `put_object` fail.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.read().get(key).map(|o| o.content_type.clone())
    }

    /// Overwrite an object without counting a call. Test setup only.
    pub fn insert_raw(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.objects.write().insert(
            key.into(),
            StoredObject {
                bytes,
                content_type: "application/octet-stream".into(),
            },
        );
    }

    pub fn remove_raw(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.write().remove(key).map(|o| o.bytes)
    }

    fn injected(&self, flag: &AtomicBool, op: &'static str, key: &str) -> StoreResult<()> {
        if flag.load(Ordering::Relaxed) {
            let cause = io::Error::new(io::ErrorKind::ConnectionRefused, format!("{} unavailable", self.name));
            return Err(StoreError::transport(op, key, cause));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn head_object(&self, key: &str) -> StoreResult<bool> {
        self.heads.fetch_add(1, Ordering::Relaxed);
        self.injected(&self.fail_reads, "head_object", key)?;
        Ok(self.objects.read().contains_key(key))
    }

    async fn get_object(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.injected(&self.fail_reads, "get_object", key)?;
        self.objects
            .read()
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<()> {
        self.puts.fetch_add(1, Ordering::Relaxed);
        self.injected(&self.fail_writes, "put_object", key)?;
        check_key(key)?;
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.lists.fetch_add(1, Ordering::Relaxed);
        self.injected(&self.fail_reads, "list_objects", prefix)?;
        Ok(self
            .objects
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn put_get_head_list() {
        let s = MemoryObjectStore::new();
        assert!(!s.head_object("p/a.json").await.unwrap());
        s.put_object("p/a.json", b"{}".to_vec(), "application/json").await.unwrap();
        s.put_object("p/b.json", b"[]".to_vec(), "application/json").await.unwrap();
        s.put_object("q/c.json", b"1".to_vec(), "application/json").await.unwrap();

        assert!(s.head_object("p/a.json").await.unwrap());
        assert_eq!(s.get_object("p/b.json").await.unwrap(), b"[]");
        assert_eq!(s.list_keys("p/").await.unwrap(), vec!["p/a.json", "p/b.json"]);
        assert_eq!(s.content_type("p/a.json").as_deref(), Some("application/json"));
        assert_eq!(
            s.calls(),
            StoreCalls {
                heads: 2,
                gets: 1,
                puts: 3,
                lists: 1
            }
        );
    }

    #[tokio::test]
    async fn missing_is_not_found() {
        let s = MemoryObjectStore::new();
        assert_matches!(s.get_object("nope").await, Err(StoreError::NotFound(k)) if k == "nope");
    }

    #[tokio::test]
    async fn injected_faults_are_transport_errors() {
        let s = MemoryObjectStore::named("eu-mirror");
        s.fail_writes(true);
        let err = s.put_object("k", vec![1], "x").await.unwrap_err();
        assert_matches!(&err, StoreError::Transport(t) if t.operation == "put_object");
        assert!(err.to_string().contains("eu-mirror unavailable"));

        s.fail_reads(true);
        assert_matches!(s.head_object("k").await, Err(StoreError::Transport(_)));
        assert_eq!(s.calls().total(), 2);
    }
}
