//! ============================================================================
//! Enrichment - Short summaries and icebreaker questions
//! ============================================================================
//! Best-effort text generation layered on top of a similarity score. Every
//! failure is captured as `Enrichment::Absent` with a reason; nothing here
//! returns an error to the caller.
//! ============================================================================

use serde::{Serialize, Serializer};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::llm::{Prompt, TextGenerator};
use crate::types::Profile;

/// Longest summary returned for a profile
pub const SUMMARY_MAX_CHARS: usize = 30;

/// Longest icebreaker question returned
pub const ICEBREAKER_MAX_CHARS: usize = 70;

/// Number of icebreakers requested per pair
pub const ICEBREAKER_COUNT: usize = 2;

const SUMMARY_PROMPT: &str = r#"You are an AI assistant that summarizes user personality profiles.

You will be given a JSON object describing a single user's profile, containing fields such as:
- hobbies
- personality traits
- traits they are looking for

Your task:
- Create a short descriptive summary of the user in under 30 characters.
- The summary should reflect the user's general vibe or personality, not a full sentence.
- Only use the provided information. Do NOT invent new facts or assumptions.
- The summary must be concise, natural, and human-like (like a quick label, not a phrase).
- Output ONLY the summary text, with no quotes, punctuation, or extra explanation.
- Do NOT include JSON, full sentences, or additional formatting.

Example input:
{
  "hobbies": ["basketball", "traveling"],
  "personality traits": ["outgoing", "curious"],
  "traits looking for": ["funny", "kind"]
}

Example output:
Adventurous & outgoing"#;

const ICEBREAKER_PROMPT: &str = r#"You are a friendly and emotionally intelligent AI designed to help people connect.

You will receive two user profiles, each containing structured information such as:
- hobbies
- personality traits
- traits they are looking for

Your task:
- Create 2 short, natural ice breaker questions that would help these two users start a conversation.
- Each question must be at most 70 characters.
- Each question should be relevant to BOTH users' interests, hobbies, or compatible personality traits.
- The tone should be friendly, warm, and curious, something you'd naturally ask on a first meeting.
- Do not mention that you know their profiles.
- Do NOT output any explanation or JSON. Only return the 2 questions as plain text, numbered 1 and 2.

Example output:
1. Pickup games or exploring new places on a free weekend?
2. Would a weekend trip together be sporty or musical?"#;

/// Why an enrichment value is missing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbsenceReason {
    /// No stored profile for the id
    ProfileMissing,
    /// A stored profile exists but could not be read or parsed
    ProfileUnreadable(String),
    /// Icebreakers need both profiles
    ProfilesIncomplete,
    GenerationFailed(String),
    /// The model answered with nothing usable
    EmptyOutput,
}

impl std::fmt::Display for AbsenceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbsenceReason::ProfileMissing => write!(f, "profile missing"),
            AbsenceReason::ProfileUnreadable(e) => write!(f, "profile unreadable: {}", e),
            AbsenceReason::ProfilesIncomplete => write!(f, "both profiles required"),
            AbsenceReason::GenerationFailed(e) => write!(f, "generation failed: {}", e),
            AbsenceReason::EmptyOutput => write!(f, "empty model output"),
        }
    }
}

/// Optional enrichment value. Serializes as the value itself or `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment<T> {
    Present(T),
    Absent(AbsenceReason),
}

impl<T> Enrichment<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Enrichment::Present(_))
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Enrichment::Present(value) => Some(value),
            Enrichment::Absent(_) => None,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Enrichment::Present(value) => Some(value),
            Enrichment::Absent(_) => None,
        }
    }

    pub fn absence(&self) -> Option<&AbsenceReason> {
        match self {
            Enrichment::Present(_) => None,
            Enrichment::Absent(reason) => Some(reason),
        }
    }
}

impl<T: Serialize> Serialize for Enrichment<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Enrichment::Present(value) => value.serialize(serializer),
            Enrichment::Absent(_) => serializer.serialize_none(),
        }
    }
}

/// Normalize a model summary to a single short label
pub fn clean_summary(raw: &str) -> String {
    const OPENERS: [&str; 4] = ["```", "\u{201c}", "\"", "'"];
    const CLOSERS: [&str; 4] = ["```", "\u{201d}", "\"", "'"];

    let mut text = raw.trim();
    if OPENERS.iter().any(|p| text.starts_with(p)) && CLOSERS.iter().any(|p| text.ends_with(p)) {
        text = text.trim_matches(|c: char| matches!(c, '`' | '\u{201c}' | '\u{201d}' | '\'' | '"'));
    }

    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > SUMMARY_MAX_CHARS {
        let truncated: String = collapsed.chars().take(SUMMARY_MAX_CHARS).collect();
        truncated.trim_end().to_string()
    } else {
        collapsed
    }
}

/// Pull up to two questions out of free-form model output
pub fn parse_icebreakers(raw: &str) -> Vec<String> {
    let lines: Vec<&str> = raw
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut questions: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| l.starts_with(|c: char| c.is_ascii_digit()) || l.starts_with('-') || l.contains('?'))
        .collect();
    if questions.len() < ICEBREAKER_COUNT {
        questions = lines.into_iter().take(ICEBREAKER_COUNT).collect();
    }

    questions
        .into_iter()
        .take(ICEBREAKER_COUNT)
        .map(|q| q.chars().take(ICEBREAKER_MAX_CHARS).collect())
        .collect()
}

/// Summary and icebreaker generation over a `TextGenerator`
#[derive(Clone)]
pub struct Enricher {
    generator: Arc<dyn TextGenerator>,
}

impl Enricher {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn pretty(profile: &Profile) -> Result<String, AbsenceReason> {
        serde_json::to_string_pretty(profile)
            .map_err(|e| AbsenceReason::GenerationFailed(format!("Failed to render profile: {}", e)))
    }

    async fn complete(&self, prompt: Prompt) -> Result<String, AbsenceReason> {
        match self.generator.generate(&prompt).await {
            Ok(completion) => Ok(completion.joined()),
            Err(e) => {
                warn!("Enrichment generation failed: {}", e);
                Err(AbsenceReason::GenerationFailed(e.to_string()))
            }
        }
    }

    pub fn summary_prompt(profile_json: &str) -> Prompt {
        Prompt {
            system: SUMMARY_PROMPT.to_string(),
            user: format!(
                "Profile JSON:\n{}\n\nReturn \u{2264}{} characters.",
                profile_json, SUMMARY_MAX_CHARS
            ),
            max_tokens: 60,
            temperature: 0.2,
        }
    }

    pub fn icebreaker_prompt(profile_a_json: &str, profile_b_json: &str) -> Prompt {
        Prompt {
            system: ICEBREAKER_PROMPT.to_string(),
            user: format!("Profile A:\n{}\n\nProfile B:\n{}", profile_a_json, profile_b_json),
            max_tokens: 150,
            temperature: 0.7,
        }
    }

    /// Label of at most 30 characters for one profile
    pub async fn summarize(&self, profile: &Profile) -> Enrichment<String> {
        let text = match Self::pretty(profile) {
            Ok(json) => self.complete(Self::summary_prompt(&json)).await,
            Err(reason) => Err(reason),
        };

        match text.map(|t| clean_summary(&t)) {
            Ok(summary) if !summary.is_empty() => {
                debug!("Generated summary: {}", summary);
                Enrichment::Present(summary)
            }
            Ok(_) => Enrichment::Absent(AbsenceReason::EmptyOutput),
            Err(reason) => Enrichment::Absent(reason),
        }
    }

    /// Two conversation openers relevant to both profiles
    pub async fn icebreakers(&self, a: &Profile, b: &Profile) -> Enrichment<Vec<String>> {
        let text = match (Self::pretty(a), Self::pretty(b)) {
            (Ok(a_json), Ok(b_json)) => self.complete(Self::icebreaker_prompt(&a_json, &b_json)).await,
            (Err(reason), _) | (_, Err(reason)) => Err(reason),
        };

        match text.map(|t| parse_icebreakers(&t)) {
            Ok(questions) if !questions.is_empty() => {
                debug!("Generated {} icebreakers", questions.len());
                Enrichment::Present(questions)
            }
            Ok(_) => Enrichment::Absent(AbsenceReason::EmptyOutput),
            Err(reason) => Enrichment::Absent(reason),
        }
    }
}
