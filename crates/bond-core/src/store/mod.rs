//! ============================================================================
//! Artifact Store - Typed access to blob storage
//! ============================================================================
//! Every component reads and writes through `Artifacts`, a bucket-scoped
//! adapter over an `ObjectBackend`. Writes are unconditional overwrites, so
//! retried ingestion runs are safe.
//!
//! ## Layout
//! ```text
//! profiles/<id>/profile.json      structured profile
//! profiles/<id>/vector.json       flat numeric array
//! transcripts/<base>.txt          cached plain-text transcript
//! transcripts/<base>.json         transcript JSON (either schema)
//! transcripts/<job>/<file>.json   engine output for one job
//! ```
//! ============================================================================

pub mod keys;
mod memory;
mod redb_backend;

pub use memory::MemoryBackend;
pub use redb_backend::RedbBackend;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::poll::PollConfig;
use crate::types::{BondError, Result};

/// Raw blob operations against a key-value store
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Check for a key. Backend failures are errors, not `false`.
    async fn probe(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Read an object, `NotFound` if absent
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Write an object, replacing any previous value
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;

    /// Keys under a prefix, sorted
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}

/// Bucket-scoped artifact store
#[derive(Clone)]
pub struct Artifacts {
    backend: Arc<dyn ObjectBackend>,
    bucket: String,
}

impl Artifacts {
    pub fn new(backend: Arc<dyn ObjectBackend>, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
        }
    }

    /// Same backend, different container
    pub fn with_bucket(&self, bucket: &str) -> Self {
        Self {
            backend: self.backend.clone(),
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Existence check that never fails.
    ///
    /// Backend errors are reported as "not found". That keeps read paths
    /// simple but means an outage looks like missing data; use [`probe`]
    /// where the difference matters.
    ///
    /// [`probe`]: Artifacts::probe
    pub async fn exists(&self, key: &str) -> bool {
        match self.backend.probe(&self.bucket, key).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Existence check failed for {}: {} - treating as missing", self.uri(key), e);
                false
            }
        }
    }

    /// Existence check that surfaces backend errors
    pub async fn probe(&self, key: &str) -> Result<bool> {
        self.backend.probe(&self.bucket, key).await
    }

    pub async fn read_bytes(&self, key: &str) -> Result<Vec<u8>> {
        self.backend.get(&self.bucket, key).await
    }

    pub async fn read_text(&self, key: &str) -> Result<String> {
        let bytes = self.read_bytes(key).await?;
        String::from_utf8(bytes)
            .map_err(|e| BondError::Storage(format!("{} is not valid UTF-8: {}", self.uri(key), e)))
    }

    /// Read and parse a JSON artifact, `NotFound` when the key is absent
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        if !self.exists(key).await {
            return Err(BondError::NotFound(key.to_string()));
        }
        let bytes = self.read_bytes(key).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| BondError::Storage(format!("Failed to parse {}: {}", self.uri(key), e)))
    }

    /// Write pretty-printed JSON
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value)
            .map_err(|e| BondError::Storage(format!("Failed to serialize {}: {}", key, e)))?;
        self.write_bytes(key, body, "application/json").await
    }

    /// Write single-line JSON (used for vectors)
    pub async fn write_json_compact<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value)
            .map_err(|e| BondError::Storage(format!("Failed to serialize {}: {}", key, e)))?;
        self.write_bytes(key, body, "application/json").await
    }

    pub async fn write_text(&self, key: &str, text: &str) -> Result<()> {
        self.write_bytes(key, text.as_bytes().to_vec(), "text/plain").await
    }

    pub async fn write_bytes(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        debug!("Writing {} ({} bytes, {})", self.uri(key), bytes.len(), content_type);
        self.backend.put(&self.bucket, key, bytes, content_type).await
    }

    pub async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.backend.list(&self.bucket, prefix).await
    }

    /// Poll for a key to appear. Transient probe errors are retried inside
    /// the same budget instead of being read as absence.
    pub async fn wait_for_key(&self, key: &str, poll: PollConfig) -> bool {
        let deadline = poll.start();
        loop {
            match self.probe(key).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!("Probe of {} failed, retrying: {}", self.uri(key), e),
            }
            if !deadline.tick().await {
                debug!("Gave up waiting for {} after {:?}", self.uri(key), poll.timeout);
                return false;
            }
        }
    }

    fn uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}
