// ============================================================================
// RedbBackend - Embedded artifact database (redb)
// ============================================================================
// Local blob storage for recordings, transcripts, profiles and vectors.
// Default path: ~/.bond/artifacts.redb (override via BOND_STORE_PATH env var)
// ============================================================================

use async_trait::async_trait;
use redb::{Database, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::ObjectBackend;
use crate::types::{BondError, Result};

// Table definitions, keyed by "<bucket>/<key>"
const OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");
const CONTENT_TYPES: TableDefinition<&str, &str> = TableDefinition::new("content_types");

/// Object backend stored in a single redb file
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
}

impl RedbBackend {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses BOND_STORE_PATH env var or ~/.bond/artifacts.redb
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var("BOND_STORE_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir()
                .ok_or_else(|| BondError::Config("Cannot determine home directory".to_string()))?;
            let bond_dir = home.join(".bond");
            std::fs::create_dir_all(&bond_dir)
                .map_err(|e| BondError::Storage(format!("Failed to create .bond directory: {}", e)))?;
            bond_dir.join("artifacts.redb")
        };

        info!("Opening artifact store at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| BondError::Storage(format!("Failed to open database: {}", e)))?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| BondError::Storage(format!("Failed to begin write: {}", e)))?;
        {
            write_txn
                .open_table(OBJECTS)
                .map_err(|e| BondError::Storage(format!("Failed to create objects table: {}", e)))?;
            write_txn
                .open_table(CONTENT_TYPES)
                .map_err(|e| BondError::Storage(format!("Failed to create content_types table: {}", e)))?;
        }
        write_txn
            .commit()
            .map_err(|e| BondError::Storage(format!("Failed to commit init: {}", e)))?;

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Content type recorded for an object
    pub fn content_type(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        let id = composite(bucket, key);
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| BondError::Storage(format!("Failed to begin read: {}", e)))?;
        let table = read_txn
            .open_table(CONTENT_TYPES)
            .map_err(|e| BondError::Storage(format!("Failed to open content_types table: {}", e)))?;
        let value = table
            .get(id.as_str())
            .map_err(|e| BondError::Storage(format!("Failed to get content type: {}", e)))?;
        Ok(value.map(|v| v.value().to_string()))
    }

    fn read_object(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| BondError::Storage(format!("Failed to begin read: {}", e)))?;
        let table = read_txn
            .open_table(OBJECTS)
            .map_err(|e| BondError::Storage(format!("Failed to open objects table: {}", e)))?;

        let value = table
            .get(id)
            .map_err(|e| BondError::Storage(format!("Failed to get object: {}", e)))?;
        Ok(value.map(|v| v.value().to_vec()))
    }
}

fn composite(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, key)
}

#[async_trait]
impl ObjectBackend for RedbBackend {
    async fn probe(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self.read_object(&composite(bucket, key))?.is_some())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.read_object(&composite(bucket, key))?
            .ok_or_else(|| BondError::NotFound(key.to_string()))
    }

    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let id = composite(bucket, key);

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| BondError::Storage(format!("Failed to begin write: {}", e)))?;
        {
            let mut objects = write_txn
                .open_table(OBJECTS)
                .map_err(|e| BondError::Storage(format!("Failed to open objects table: {}", e)))?;
            objects
                .insert(id.as_str(), bytes.as_slice())
                .map_err(|e| BondError::Storage(format!("Failed to insert object: {}", e)))?;

            let mut types = write_txn
                .open_table(CONTENT_TYPES)
                .map_err(|e| BondError::Storage(format!("Failed to open content_types table: {}", e)))?;
            types
                .insert(id.as_str(), content_type)
                .map_err(|e| BondError::Storage(format!("Failed to insert content type: {}", e)))?;
        }
        write_txn
            .commit()
            .map_err(|e| BondError::Storage(format!("Failed to commit: {}", e)))?;

        debug!("Stored object: {} ({} bytes)", id, bytes.len());
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let scoped = composite(bucket, prefix);
        let strip = bucket.len() + 1;

        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| BondError::Storage(format!("Failed to begin read: {}", e)))?;
        let table = read_txn
            .open_table(OBJECTS)
            .map_err(|e| BondError::Storage(format!("Failed to open objects table: {}", e)))?;

        let mut keys = Vec::new();
        let iter = table
            .range::<&str>(scoped.as_str()..)
            .map_err(|e| BondError::Storage(format!("Failed to iterate objects: {}", e)))?;
        for entry in iter {
            let (key, _value) = entry.map_err(|e| BondError::Storage(format!("Failed to read entry: {}", e)))?;
            let key = key.value();
            if !key.starts_with(scoped.as_str()) {
                break;
            }
            keys.push(key[strip..].to_string());
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RedbBackend) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts.redb");
        let backend = RedbBackend::open(path.to_str()).unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn test_put_get_probe() {
        let (_dir, backend) = open_temp();
        assert!(!backend.probe("bucket", "profiles/alice/vector.json").await.unwrap());

        backend
            .put("bucket", "profiles/alice/vector.json", b"[1.0,0.0]".to_vec(), "application/json")
            .await
            .unwrap();

        assert!(backend.probe("bucket", "profiles/alice/vector.json").await.unwrap());
        assert_eq!(
            backend.get("bucket", "profiles/alice/vector.json").await.unwrap(),
            b"[1.0,0.0]"
        );
        assert_eq!(
            backend.content_type("bucket", "profiles/alice/vector.json").unwrap().as_deref(),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let (_dir, backend) = open_temp();
        let err = backend.get("bucket", "nope").await.unwrap_err();
        assert_eq!(err, BondError::NotFound("nope".into()));
    }

    #[tokio::test]
    async fn test_list_prefix() {
        let (_dir, backend) = open_temp();
        for key in ["transcripts/j/2.json", "transcripts/j/1.json", "transcripts/k/1.json"] {
            backend.put("bucket", key, vec![], "application/json").await.unwrap();
        }
        let keys = backend.list("bucket", "transcripts/j/").await.unwrap();
        assert_eq!(keys, vec!["transcripts/j/1.json", "transcripts/j/2.json"]);
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts.redb");
        {
            let backend = RedbBackend::open(path.to_str()).unwrap();
            backend.put("b", "k", b"kept".to_vec(), "text/plain").await.unwrap();
        }
        let backend = RedbBackend::open(path.to_str()).unwrap();
        assert_eq!(backend.get("b", "k").await.unwrap(), b"kept");
    }
}
