//! ============================================================================
//! BOND-CORE: Voice profile matching
//! ============================================================================
//! This crate holds all backend logic for Bond:
//! - Transcription job orchestration with transcript fallbacks
//! - Profile extraction and embedding via Bedrock
//! - Cosine similarity with best-effort summaries and icebreakers
//! - Artifact storage over redb or memory
//! ============================================================================

pub mod api;
pub mod config;
pub mod embeddings;
pub mod enrichment;
pub mod llm;
pub mod pipeline;
pub mod poll;
pub mod profile;
pub mod similarity;
pub mod store;
pub mod transcribe;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use api::{handle_similarity_request, handle_upload_event, ApiRequest, ApiResponse, UploadEvent};
pub use config::BondConfig;
pub use embeddings::{flatten_profile, EmbeddingGenerator};
pub use enrichment::{AbsenceReason, Enricher, Enrichment};
pub use llm::{BedrockClient, ModelInvoker, TextGenerator};
pub use pipeline::{IngestionPipeline, IngestionReport};
pub use poll::PollConfig;
pub use profile::ProfileExtractor;
pub use similarity::{cosine_similarity, SimilarityReport, SimilarityService};
pub use store::{Artifacts, MemoryBackend, ObjectBackend, RedbBackend};
pub use transcribe::{Transcriber, TranscriptionEngine, WhisperApiEngine};
