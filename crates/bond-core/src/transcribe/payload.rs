// Transcript payload parsing shared by every resolution step.
//
// Stored transcripts come in three shapes: plain text, a simple
// {"transcript": "..."} object, or the engine's nested result schema
// {"results": {"transcripts": [{"transcript": "..."}]}}.

use serde_json::Value;

use crate::types::{BondError, Result};

/// JSON layouts a transcript can be extracted from, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSchema {
    /// `{"transcript": "..."}`
    InlineField,
    /// `{"results": {"transcripts": [{"transcript": "..."}]}}`
    NestedResultField,
}

impl TranscriptSchema {
    pub const ORDER: [TranscriptSchema; 2] =
        [TranscriptSchema::InlineField, TranscriptSchema::NestedResultField];

    pub fn extract<'a>(&self, payload: &'a Value) -> Option<&'a str> {
        match self {
            TranscriptSchema::InlineField => payload.get("transcript")?.as_str(),
            TranscriptSchema::NestedResultField => payload
                .get("results")?
                .get("transcripts")?
                .get(0)?
                .get("transcript")?
                .as_str(),
        }
    }
}

/// Turn raw transcript bytes into text.
///
/// Content that does not open with a JSON delimiter is taken as plain text.
pub fn parse_transcript_payload(raw: &[u8]) -> Result<String> {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return Err(BondError::TranscriptUnavailable("empty transcript payload".to_string()));
    }
    if !trimmed.starts_with(['{', '[']) {
        return Ok(trimmed.to_string());
    }

    let payload: Value = serde_json::from_str(trimmed).map_err(|e| {
        BondError::TranscriptUnavailable(format!("invalid transcript JSON: {}", e))
    })?;

    TranscriptSchema::ORDER
        .iter()
        .find_map(|schema| schema.extract(&payload))
        .map(|t| t.to_string())
        .ok_or_else(|| {
            BondError::TranscriptUnavailable("no transcript field in JSON payload".to_string())
        })
}
