//! ============================================================================
//! Ingestion Pipeline - Recording to stored profile and vector
//! ============================================================================
//! transcribe → extract → embed → write `profile.json` → write `vector.json`
//!
//! Runs are not transactional: a failure after the profile write leaves the
//! profile without a vector until the event is redelivered. Overwrites make
//! redelivery safe.
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::embeddings::EmbeddingGenerator;
use crate::profile::ProfileExtractor;
use crate::store::{keys, Artifacts};
use crate::transcribe::Transcriber;
use crate::types::{BondError, RecordingRef, Result};

/// Keys written by one ingestion run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedArtifacts {
    pub profile_key: String,
    pub vector_key: String,
}

/// Summary returned to the event invoker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub ok: bool,
    pub bucket: String,
    pub profile_name: String,
    pub saved: SavedArtifacts,
}

pub struct IngestionPipeline {
    artifacts: Artifacts,
    transcriber: Arc<Transcriber>,
    extractor: ProfileExtractor,
    embedder: EmbeddingGenerator,
}

impl IngestionPipeline {
    pub fn new(
        artifacts: Artifacts,
        transcriber: Arc<Transcriber>,
        extractor: ProfileExtractor,
        embedder: EmbeddingGenerator,
    ) -> Self {
        Self {
            artifacts,
            transcriber,
            extractor,
            embedder,
        }
    }

    pub async fn ingest(&self, recording: &RecordingRef) -> Result<IngestionReport> {
        let profile_name = recording.profile_name();
        if profile_name.is_empty() {
            return Err(BondError::InvalidInput(format!(
                "Recording {} has no usable profile name",
                recording.uri()
            )));
        }
        info!("Ingesting {} as profile {}", recording.uri(), profile_name);

        let transcript = self.transcriber.transcribe(recording).await?;
        info!("Transcript length: {} chars", transcript.len());

        let profile = self.extractor.extract(&transcript).await?;

        let vector = self.embedder.embed_profile(&profile).await?;
        info!("Vector length: {}", vector.len());

        let store = self.artifacts.with_bucket(&recording.bucket);
        let saved = SavedArtifacts {
            profile_key: keys::profile(&profile_name),
            vector_key: keys::vector(&profile_name),
        };
        store.write_json(&saved.profile_key, &profile).await?;
        store.write_json_compact(&saved.vector_key, &vector).await?;
        info!(
            "Saved s3://{}/{} and s3://{}/{}",
            recording.bucket, saved.profile_key, recording.bucket, saved.vector_key
        );

        Ok(IngestionReport {
            ok: true,
            bucket: recording.bucket.clone(),
            profile_name,
            saved,
        })
    }
}
