//! ============================================================================
//! Whisper API Engine - Speech-to-text over an OpenAI-compatible API
//! ============================================================================
//! The HTTP API is synchronous; this engine wraps it in the job model the
//! transcriber expects. `start_job` registers the job as RUNNING and spawns a
//! task that:
//! 1. downloads the recording from the artifact store,
//! 2. posts it to `/audio/transcriptions`,
//! 3. writes `<prefix><job>.json` in the nested result schema,
//! then flips the job to COMPLETED (or FAILED with the reason).
//! ============================================================================

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

use super::{JobRequest, JobSnapshot, TranscriptionEngine};
use crate::config::BondConfig;
use crate::store::Artifacts;
use crate::types::{BondError, Result};

type JobTable = Arc<Mutex<HashMap<String, JobSnapshot>>>;

/// Transcription engine backed by a Whisper-style HTTP endpoint
pub struct WhisperApiEngine {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    artifacts: Artifacts,
    jobs: JobTable,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl WhisperApiEngine {
    pub fn new(base_url: String, api_key: Option<String>, model: String, artifacts: Artifacts) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            artifacts,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &BondConfig, artifacts: Artifacts) -> Self {
        Self::new(
            config.stt_base_url.clone(),
            config.stt_api_key.clone(),
            config.stt_model.clone(),
            artifacts,
        )
    }

    fn set_status(jobs: &JobTable, job_name: &str, snapshot: JobSnapshot) {
        if let Ok(mut table) = jobs.lock() {
            table.insert(job_name.to_string(), snapshot);
        }
    }
}

/// Whisper takes ISO-639-1 codes ("en"), recordings are tagged "en-US"
fn whisper_language(language_code: &str) -> String {
    language_code
        .split(['-', '_'])
        .next()
        .unwrap_or(language_code)
        .to_lowercase()
}

/// Everything the background task needs, detached from `&self`
struct JobRunner {
    client: Client,
    api_key: Option<String>,
    url: String,
    model: String,
    artifacts: Artifacts,
    request: JobRequest,
}

impl JobRunner {
    async fn run(self) -> Result<()> {
        let media = self.artifacts.with_bucket(&self.request.media.bucket);
        let audio = media.read_bytes(&self.request.media.key).await?;
        debug!(
            "Job {}: uploading {} bytes of {}",
            self.request.job_name,
            audio.len(),
            self.request.media_format
        );

        let file_name = self
            .request
            .media
            .key
            .rsplit('/')
            .next()
            .unwrap_or("audio")
            .to_string();
        let part = Part::bytes(audio)
            .file_name(file_name)
            .mime_str(&format!("audio/{}", mime_subtype(&self.request.media_format)))
            .map_err(|e| BondError::Service(format!("Invalid media type: {}", e)))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", whisper_language(&self.request.language_code))
            .text("response_format", "json");

        let mut request = self.client.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| BondError::Service(format!("Failed to send transcription request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BondError::Service(format!("Failed to read transcription response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&body) {
                return Err(BondError::Service(format!(
                    "Transcription API error ({}): {}",
                    status, error.error.message
                )));
            }
            return Err(BondError::Service(format!("Transcription API error ({}): {}", status, body)));
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body).map_err(|e| {
            BondError::Service(format!("Failed to parse transcription response: {} - body: {}", e, body))
        })?;

        let output = json!({
            "jobName": self.request.job_name,
            "status": "COMPLETED",
            "results": {"transcripts": [{"transcript": parsed.text}]}
        });
        let key = format!("{}{}.json", self.request.output_prefix, self.request.job_name);
        self.artifacts
            .with_bucket(&self.request.output_bucket)
            .write_json(&key, &output)
            .await
    }
}

fn mime_subtype(media_format: &str) -> &str {
    match media_format {
        "mp3" => "mpeg",
        other => other,
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperApiEngine {
    async fn start_job(&self, request: &JobRequest) -> Result<()> {
        {
            let mut table = self
                .jobs
                .lock()
                .map_err(|_| BondError::Service("Job table lock poisoned".to_string()))?;
            if table.contains_key(&request.job_name) {
                return Err(BondError::InvalidInput(format!(
                    "Job {} already exists",
                    request.job_name
                )));
            }
            table.insert(request.job_name.clone(), JobSnapshot::running());
        }

        let runner = JobRunner {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            url: format!("{}/audio/transcriptions", self.base_url),
            model: self.model.clone(),
            artifacts: self.artifacts.clone(),
            request: request.clone(),
        };
        let jobs = self.jobs.clone();
        let job_name = request.job_name.clone();

        tokio::spawn(async move {
            match runner.run().await {
                Ok(()) => {
                    info!("Transcription job {} completed", job_name);
                    WhisperApiEngine::set_status(&jobs, &job_name, JobSnapshot::completed());
                }
                Err(e) => {
                    error!("Transcription job {} failed: {}", job_name, e);
                    WhisperApiEngine::set_status(&jobs, &job_name, JobSnapshot::failed(e.to_string()));
                }
            }
        });

        Ok(())
    }

    async fn job_status(&self, job_name: &str) -> Result<JobSnapshot> {
        let mut table = self
            .jobs
            .lock()
            .map_err(|_| BondError::Service("Job table lock poisoned".to_string()))?;
        let snapshot = table
            .get(job_name)
            .cloned()
            .ok_or_else(|| BondError::NotFound(format!("transcription job {}", job_name)))?;

        // A terminal state is reported once, then the job is forgotten
        if snapshot.status.is_terminal() {
            table.remove(job_name);
            debug!("Job {} finished {}, released", job_name, snapshot.status);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollConfig;
    use crate::store::MemoryBackend;
    use crate::transcribe::{JobStatus, Transcriber};
    use crate::types::RecordingRef;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn artifacts() -> Artifacts {
        Artifacts::new(Arc::new(MemoryBackend::new()), "bucket")
    }

    #[test]
    fn test_whisper_language() {
        assert_eq!(whisper_language("en-US"), "en");
        assert_eq!(whisper_language("pt_BR"), "pt");
        assert_eq!(whisper_language("fr"), "fr");
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let engine = WhisperApiEngine::new("http://localhost".into(), None, "whisper-1".into(), artifacts());
        assert!(matches!(
            engine.job_status("mp3-missing").await,
            Err(BondError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_job_writes_nested_output() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/audio/transcriptions")
                    .header("Authorization", "Bearer stt-key");
                then.status(200).json_body(serde_json::json!({"text": "I like hiking"}));
            })
            .await;

        let store = artifacts();
        store
            .write_bytes("uploads/alice.mp3", vec![1, 2, 3], "audio/mpeg")
            .await
            .unwrap();
        let engine = Arc::new(WhisperApiEngine::new(
            server.base_url(),
            Some("stt-key".into()),
            "whisper-1".into(),
            store.clone(),
        ));
        let transcriber = Transcriber::new(engine.clone(), store.clone(), "en-US".into());

        let recording = RecordingRef::new("bucket", "uploads/alice.mp3");
        let job = transcriber.submit(&recording).await.unwrap();
        let status = transcriber
            .await_completion(&job, PollConfig::new(Duration::from_secs(5), Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Completed);
        mock.assert_async().await;
        assert!(matches!(engine.job_status(&job).await, Err(BondError::NotFound(_))));

        let outcome = transcriber.collect_output(&recording, &job).await.unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.transcript.as_deref(), Some("I like hiking"));
        assert_eq!(store.read_text("transcripts/alice.txt").await.unwrap(), "I like hiking");
    }

    #[tokio::test]
    async fn test_missing_media_fails_job() {
        let engine = Arc::new(WhisperApiEngine::new(
            "http://127.0.0.1:9".into(),
            None,
            "whisper-1".into(),
            artifacts(),
        ));
        let transcriber = Transcriber::new(engine, artifacts(), "en-US".into());

        let job = transcriber
            .submit(&RecordingRef::new("bucket", "uploads/ghost.mp3"))
            .await
            .unwrap();
        let status = transcriber
            .await_completion(&job, PollConfig::new(Duration::from_secs(5), Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(status, JobStatus::Failed);
    }
}
