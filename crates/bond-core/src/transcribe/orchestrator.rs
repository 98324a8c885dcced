//! ============================================================================
//! Transcriber - Job orchestration and transcript resolution
//! ============================================================================
//! Constructed once per worker and shared across invocations; holds no
//! per-run state.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::payload::parse_transcript_payload;
use super::{JobOutcome, JobRequest, JobSnapshot, JobStatus, TranscriptionEngine};
use crate::poll::PollConfig;
use crate::store::{keys, Artifacts};
use crate::types::{BondError, RecordingRef, Result};

/// Characters of transcript kept in `JobOutcome::text_sample`
const SAMPLE_CHARS: usize = 200;

/// Wait budgets for each stage of transcription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptionTimings {
    /// Job status polling
    pub job: PollConfig,
    /// Waiting for a transcript key named by the job result
    pub transcript_key: PollConfig,
    /// Waiting for `transcripts/<base>.txt`
    pub text_fallback: PollConfig,
    /// Waiting for `transcripts/<base>.json`; the engine may still be writing
    pub json_fallback: PollConfig,
}

impl Default for TranscriptionTimings {
    fn default() -> Self {
        Self {
            job: PollConfig::secs(60, 2),
            transcript_key: PollConfig::secs(60, 2),
            text_fallback: PollConfig::secs(5, 1),
            json_fallback: PollConfig::secs(120, 3),
        }
    }
}

/// Turns recordings into transcript text through a `TranscriptionEngine`
pub struct Transcriber {
    engine: Arc<dyn TranscriptionEngine>,
    artifacts: Artifacts,
    language_code: String,
    timings: TranscriptionTimings,
}

impl Transcriber {
    pub fn new(engine: Arc<dyn TranscriptionEngine>, artifacts: Artifacts, language_code: String) -> Self {
        Self {
            engine,
            artifacts,
            language_code,
            timings: TranscriptionTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: TranscriptionTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Start a job for the recording; the name is unique per call so a
    /// redelivered event never collides with an earlier job
    pub async fn submit(&self, recording: &RecordingRef) -> Result<String> {
        let suffix = Uuid::new_v4().simple().to_string();
        let job_name = format!("mp3-{}", &suffix[..12]);

        let request = JobRequest {
            job_name: job_name.clone(),
            media: recording.clone(),
            media_format: "mp3".to_string(),
            language_code: self.language_code.clone(),
            output_bucket: recording.bucket.clone(),
            output_prefix: keys::job_prefix(&job_name),
        };

        info!("Starting transcription job {} for {}", job_name, recording.uri());
        self.engine.start_job(&request).await?;
        Ok(job_name)
    }

    /// Poll until the job is COMPLETED/FAILED or the timeout elapses
    pub async fn await_completion(&self, job_name: &str, poll: PollConfig) -> Result<JobStatus> {
        Ok(self.poll_job(job_name, poll).await?.status)
    }

    async fn poll_job(&self, job_name: &str, poll: PollConfig) -> Result<JobSnapshot> {
        let deadline = poll.start();
        loop {
            let snapshot = self.engine.job_status(job_name).await?;
            debug!("Job {} status: {}", job_name, snapshot.status);
            if snapshot.status.is_terminal() {
                return Ok(snapshot);
            }
            if !deadline.tick().await {
                warn!("Job {} still {} after {:?}", job_name, snapshot.status, poll.timeout);
                return Ok(JobSnapshot {
                    status: JobStatus::TimedOut,
                    failure_reason: None,
                });
            }
        }
    }

    /// Read the JSON a completed job wrote and cache it as plain text
    pub async fn collect_output(&self, recording: &RecordingRef, job_name: &str) -> Result<JobOutcome> {
        let store = self.artifacts.with_bucket(&recording.bucket);
        let listed = store.list(&keys::job_prefix(job_name)).await?;

        let Some(json_key) = listed.iter().filter(|k| k.ends_with(".json")).last() else {
            return Ok(JobOutcome {
                ok: false,
                job: job_name.to_string(),
                status: Some(JobStatus::Completed),
                error: Some("Transcript JSON not found".to_string()),
                ..Default::default()
            });
        };

        let raw = store.read_bytes(json_key).await?;
        let text = match parse_transcript_payload(&raw) {
            Ok(text) => text,
            Err(e) => {
                return Ok(JobOutcome {
                    ok: false,
                    job: job_name.to_string(),
                    status: Some(JobStatus::Completed),
                    error: Some(e.to_string()),
                    ..Default::default()
                })
            }
        };

        // Plain copy for later reads, independent of the engine's layout
        let txt_key = keys::transcript_text(&recording.base_name());
        let cached = match store.write_text(&txt_key, &text).await {
            Ok(()) => {
                info!("Cached transcript for {} at {}", job_name, txt_key);
                Some(txt_key)
            }
            Err(e) => {
                warn!("Failed to cache transcript for {} at {}: {}", job_name, txt_key, e);
                None
            }
        };

        Ok(JobOutcome {
            ok: true,
            job: job_name.to_string(),
            status: Some(JobStatus::Completed),
            text_sample: Some(text.chars().take(SAMPLE_CHARS).collect()),
            transcript: Some(text),
            transcript_key: cached,
            error: None,
        })
    }

    /// Submit, wait and collect. A job that does not complete is reported
    /// in the outcome rather than as an error, so fallbacks can still run.
    pub async fn run(&self, recording: &RecordingRef) -> Result<JobOutcome> {
        let job_name = self.submit(recording).await?;
        let snapshot = self.poll_job(&job_name, self.timings.job).await?;

        if snapshot.status != JobStatus::Completed {
            let error = match snapshot.failure_reason {
                Some(reason) => format!("Transcription failed: {}", reason),
                None => "Transcription not completed in time".to_string(),
            };
            warn!("Job {} ended {}: {}", job_name, snapshot.status, error);
            return Ok(JobOutcome {
                ok: false,
                job: job_name,
                status: Some(snapshot.status),
                error: Some(error),
                ..Default::default()
            });
        }

        self.collect_output(recording, &job_name).await
    }

    /// Resolve transcript text; the first source that yields text wins
    pub async fn resolve_transcript(&self, recording: &RecordingRef, outcome: &JobOutcome) -> Result<String> {
        let store = self.artifacts.with_bucket(&recording.bucket);
        let base = recording.base_name();

        if let Some(text) = outcome.transcript.as_deref().filter(|t| !t.trim().is_empty()) {
            debug!("Using inline transcript from job {}", outcome.job);
            return Ok(text.to_string());
        }

        if let Some(key) = outcome.transcript_key.as_deref() {
            if store.wait_for_key(key, self.timings.transcript_key).await {
                match read_payload(&store, key).await {
                    Ok(text) => return Ok(text),
                    Err(e) => warn!("Transcript key {} unusable: {}", key, e),
                }
            }
        }

        let txt_key = keys::transcript_text(&base);
        let json_key = keys::transcript_json(&base);

        if store.wait_for_key(&txt_key, self.timings.text_fallback).await {
            match store.read_text(&txt_key).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
                Ok(_) => warn!("{} is empty", txt_key),
                Err(e) => warn!("Failed to read {}: {}", txt_key, e),
            }
        }

        if store.wait_for_key(&json_key, self.timings.json_fallback).await {
            return read_payload(&store, &json_key).await;
        }

        Err(BondError::TranscriptUnavailable(format!(
            "Transcript not found in time: s3://{}/{} or {}",
            recording.bucket, txt_key, json_key
        )))
    }

    /// Full transcription of one recording
    pub async fn transcribe(&self, recording: &RecordingRef) -> Result<String> {
        let outcome = self.run(recording).await?;
        debug!("Job outcome for {}: ok={} error={:?}", recording.uri(), outcome.ok, outcome.error);
        self.resolve_transcript(recording, &outcome).await
    }
}

async fn read_payload(store: &Artifacts, key: &str) -> Result<String> {
    let raw = store.read_bytes(key).await?;
    parse_transcript_payload(&raw)
}
