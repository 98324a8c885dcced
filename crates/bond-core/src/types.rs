//! ============================================================================
//! Core Types for Bond
//! ============================================================================
//! Recordings, profiles, vectors and the error taxonomy shared by every
//! component. Profiles and vectors are serialized to JSON in the artifact
//! store; the similarity report is serialized into API responses.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Numeric embedding of a profile
pub type Vector = Vec<f32>;

/// Result alias used across the core crate
pub type Result<T> = std::result::Result<T, BondError>;

/// Reference to an uploaded audio object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingRef {
    pub bucket: String,
    pub key: String,
}

impl RecordingRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// File name without directory or extension ("uploads/Alice.mp3" -> "Alice")
    pub fn base_name(&self) -> String {
        base_name(&self.key)
    }

    /// Identifier the profile and vector are stored under
    pub fn profile_name(&self) -> String {
        sanitize_id(&self.base_name())
    }

    /// `s3://bucket/key` style URI for logs and engine requests
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Extract the base file name (no extension) from an object key
pub fn base_name(key: &str) -> String {
    let file = key.rsplit('/').next().unwrap_or(key);
    match file.rfind('.') {
        // A leading dot is part of the name, not an extension
        Some(idx) if idx > 0 => file[..idx].to_string(),
        _ => file.to_string(),
    }
}

/// Trim and lower-case a user-supplied name so storage keys match consistently
pub fn sanitize_id(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Structured personality profile extracted from one transcript.
///
/// All three lists must be present when parsing, but may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub hobbies: Vec<String>,
    #[serde(rename = "personality traits")]
    pub personality_traits: Vec<String>,
    /// Older profiles were written with a trailing space in this key
    #[serde(rename = "traits looking for", alias = "traits looking for ")]
    pub traits_looking_for: Vec<String>,
}

impl Profile {
    pub fn is_empty(&self) -> bool {
        self.hobbies.is_empty()
            && self.personality_traits.is_empty()
            && self.traits_looking_for.is_empty()
    }
}

/// Error types for the matcher
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BondError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transcript unavailable: {0}")]
    TranscriptUnavailable(String),

    #[error("Profile extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BondError {
    /// HTTP-style status code for request boundaries
    pub fn status_code(&self) -> u16 {
        match self {
            BondError::InvalidInput(_) => 400,
            BondError::NotFound(_) => 404,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("uploads/Alice.mp3"), "Alice");
        assert_eq!(base_name("bob.final.mp3"), "bob.final");
        assert_eq!(base_name("carol"), "carol");
        assert_eq!(base_name("dir/.hidden"), ".hidden");
    }

    #[test]
    fn test_profile_name_is_sanitized() {
        let rec = RecordingRef::new("bucket", "uploads/ Alice .mp3");
        assert_eq!(rec.profile_name(), "alice");
        assert_eq!(rec.uri(), "s3://bucket/uploads/ Alice .mp3");
    }

    #[test]
    fn test_profile_accepts_legacy_key() {
        let raw = r#"{"hobbies":["chess"],"personality traits":[],"traits looking for ":["kind"]}"#;
        let profile: Profile = serde_json::from_str(raw).unwrap();
        assert_eq!(profile.traits_looking_for, vec!["kind"]);

        let written = serde_json::to_string(&profile).unwrap();
        assert!(written.contains("\"traits looking for\""));
    }

    #[test]
    fn test_profile_requires_all_keys() {
        let raw = r#"{"hobbies":["chess"],"personality traits":[]}"#;
        assert!(serde_json::from_str::<Profile>(raw).is_err());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BondError::InvalidInput("x".into()).status_code(), 400);
        assert_eq!(BondError::NotFound("x".into()).status_code(), 404);
        assert_eq!(BondError::Service("x".into()).status_code(), 500);
        assert_eq!(
            BondError::DimensionMismatch { left: 2, right: 3 }.status_code(),
            500
        );
    }
}
