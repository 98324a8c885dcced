//! ============================================================================
//! Transcription Module - Recording in, transcript text out
//! ============================================================================
//! Hides the asynchrony of the speech-to-text engine:
//! - Start a uniquely named job for an uploaded recording
//! - Poll it to a terminal state with a bounded wait
//! - Resolve the transcript through an ordered fallback chain
//!
//! ## Resolution order
//! ```text
//! inline text → job transcript key → transcripts/<base>.txt → transcripts/<base>.json
//! ```
//! ============================================================================

mod orchestrator;
mod payload;
mod whisper;

pub use orchestrator::{TranscriptionTimings, Transcriber};
pub use payload::{parse_transcript_payload, TranscriptSchema};
pub use whisper::WhisperApiEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{RecordingRef, Result};

/// State of an external transcription job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    /// Neither terminal state was observed before the wait gave up
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::TimedOut => "TIMED_OUT",
        };
        write!(f, "{}", s)
    }
}

/// Parameters for starting a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub job_name: String,
    pub media: RecordingRef,
    pub media_format: String,
    pub language_code: String,
    /// Bucket the engine writes its JSON output to
    pub output_bucket: String,
    /// Key prefix for the output, ending in '/'
    pub output_prefix: String,
}

/// Engine-reported job state
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub failure_reason: Option<String>,
}

impl JobSnapshot {
    pub fn running() -> Self {
        Self {
            status: JobStatus::Running,
            failure_reason: None,
        }
    }

    pub fn completed() -> Self {
        Self {
            status: JobStatus::Completed,
            failure_reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            failure_reason: Some(reason.into()),
        }
    }
}

/// Speech-to-text engine that runs jobs asynchronously and writes JSON
/// output under the requested prefix
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn start_job(&self, request: &JobRequest) -> Result<()>;

    async fn job_status(&self, job_name: &str) -> Result<JobSnapshot>;
}

/// What one engine run produced
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub ok: bool,
    pub job: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    /// Full transcript text, when the run read it back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    /// Key of a stored transcript for this run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_sample: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
