// In-process backend used by tests and one-shot CLI runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::ObjectBackend;
use crate::types::{BondError, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Object backend held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type recorded for an object
    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        let objects = self.objects.lock().ok()?;
        objects
            .get(&composite(bucket, key))
            .map(|o| o.content_type.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>>> {
        self.objects
            .lock()
            .map_err(|_| BondError::Storage("Memory backend lock poisoned".to_string()))
    }
}

fn composite(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, key)
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    async fn probe(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(&composite(bucket, key)))
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.lock()?
            .get(&composite(bucket, key))
            .map(|o| o.bytes.clone())
            .ok_or_else(|| BondError::NotFound(key.to_string()))
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.lock()?.insert(
            composite(bucket, key),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let scoped = composite(bucket, prefix);
        let strip = bucket.len() + 1;
        Ok(self
            .lock()?
            .range(scoped.clone()..)
            .take_while(|(k, _)| k.starts_with(&scoped))
            .map(|(k, _)| k[strip..].to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_prefix_scoped_and_sorted() {
        let backend = MemoryBackend::new();
        for key in ["transcripts/job/b.json", "transcripts/job/a.json", "transcripts/other.txt"] {
            backend.put("bucket", key, vec![], "application/json").await.unwrap();
        }
        backend.put("bucket2", "transcripts/job/c.json", vec![], "application/json").await.unwrap();

        let keys = backend.list("bucket", "transcripts/job/").await.unwrap();
        assert_eq!(keys, vec!["transcripts/job/a.json", "transcripts/job/b.json"]);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let backend = MemoryBackend::new();
        backend.put("b", "k", b"one".to_vec(), "text/plain").await.unwrap();
        backend.put("b", "k", b"two".to_vec(), "application/json").await.unwrap();
        assert_eq!(backend.get("b", "k").await.unwrap(), b"two");
        assert_eq!(backend.content_type("b", "k").as_deref(), Some("application/json"));
    }
}
