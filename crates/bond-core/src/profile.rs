//! ============================================================================
//! Profile Extractor - Transcript to structured profile
//! ============================================================================
//! Sends the transcript to the text model with a strict extraction contract
//! and parses the profile out of a response that may carry formatting noise.
//! A response that cannot be parsed is an error, never an empty profile.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::{Prompt, TextGenerator};
use crate::types::{BondError, Profile, Result};

/// Token budget for one extraction
const EXTRACTION_MAX_TOKENS: u32 = 800;

/// Low temperature keeps extraction close to deterministic
const EXTRACTION_TEMPERATURE: f32 = 0.2;

const EXTRACTION_PROMPT: &str = r#"You are an intelligent and detail-oriented AI assistant. Your job is to extract structured information from a user's transcript to build their personality profile.

You will receive a transcript of a user responding to three questions:
- What are your hobbies?
- What are your personality traits?
- What are the traits you are looking for?

Your task:
- Analyze the transcript carefully and extract only clear, factual information that directly answers the three questions.
- Return STRICT JSON (no extra text, no comments, no explanations) matching the schema shown below.
- Each list should contain simple, lowercase, single-word or short-phrase descriptors.
- Do NOT fabricate or assume traits not explicitly supported by the transcript.
- If a category is not mentioned, leave its list empty ([]).
- The output must be valid JSON and must strictly match the field names in the schema.

Profile schema:
{
  "hobbies": ["", "", ""],
  "personality traits": ["", "", ""],
  "traits looking for": ["", "", ""]
}

Example output:
{
  "hobbies": ["chess", "music", "guitar"],
  "personality traits": ["funny", "extroverted"],
  "traits looking for": ["talkative", "kind", "healthy", "gymer"]
}

Formatting rules:
- No explanations or natural language outside JSON.
- No trailing commas or invalid JSON syntax.
- Do not include any quotes around keys other than standard JSON format.
- Ensure the output parses successfully as valid JSON."#;

/// Builds profiles from transcripts via a `TextGenerator`
pub struct ProfileExtractor {
    generator: Arc<dyn TextGenerator>,
}

impl ProfileExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Prompt sent for a transcript
    pub fn prompt(transcript: &str) -> Prompt {
        Prompt {
            system: EXTRACTION_PROMPT.to_string(),
            user: format!("Transcript:\n{}", transcript),
            max_tokens: EXTRACTION_MAX_TOKENS,
            temperature: EXTRACTION_TEMPERATURE,
        }
    }

    pub async fn extract(&self, transcript: &str) -> Result<Profile> {
        debug!("Extracting profile from {} chars of transcript", transcript.len());

        let completion = self.generator.generate(&Self::prompt(transcript)).await?;
        let text = completion.first_text().ok_or_else(|| {
            BondError::ExtractionFailed("Text model response missing text content".to_string())
        })?;

        let profile = parse_profile(text)?;
        info!(
            "Extracted profile: {} hobbies, {} traits, {} sought",
            profile.hobbies.len(),
            profile.personality_traits.len(),
            profile.traits_looking_for.len()
        );
        Ok(profile)
    }
}

/// Parse a profile from model output: strict first, then the outermost
/// `{...}` slice
pub fn parse_profile(text: &str) -> Result<Profile> {
    let text = text.trim();

    let strict_err = match serde_json::from_str::<Profile>(text) {
        Ok(profile) => return Ok(profile),
        Err(e) => e,
    };

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            debug!("Strict profile parse failed ({}), trying braced slice", strict_err);
            return serde_json::from_str::<Profile>(&text[start..=end]).map_err(|e| {
                warn!("Profile slice did not parse: {}", e);
                BondError::ExtractionFailed(format!("Invalid profile JSON: {}", e))
            });
        }
    }

    Err(BondError::ExtractionFailed(format!(
        "No profile JSON in response: {}",
        strict_err
    )))
}
