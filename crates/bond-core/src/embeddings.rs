//! ============================================================================
//! Embedding Generator - Profile vectors via Titan text embeddings
//! ============================================================================
//! Profiles are flattened to one deterministic line of text and embedded
//! through the `ModelInvoker`. Identical profiles always produce identical
//! request payloads.
//! ============================================================================

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{BondConfig, SUPPORTED_EMBED_DIMS};
use crate::llm::ModelInvoker;
use crate::types::{BondError, Profile, Result, Vector};

/// Text embedded for a profile with no entries at all
pub const EMPTY_PROFILE_TEXT: &str = "hobbies: | personality: | looking_for: ";

/// Flatten a profile to `hobbies: a, b | personality: c | looking_for: d`.
///
/// Entries are trimmed and blanks dropped; categories without entries are
/// left out.
pub fn flatten_profile(profile: &Profile) -> String {
    let categories = [
        ("hobbies", &profile.hobbies),
        ("personality", &profile.personality_traits),
        ("looking_for", &profile.traits_looking_for),
    ];

    let parts: Vec<String> = categories
        .iter()
        .filter_map(|(label, entries)| {
            let cleaned: Vec<&str> = entries
                .iter()
                .map(|e| e.trim())
                .filter(|e| !e.is_empty())
                .collect();
            if cleaned.is_empty() {
                None
            } else {
                Some(format!("{}: {}", label, cleaned.join(", ")))
            }
        })
        .collect();

    if parts.is_empty() {
        EMPTY_PROFILE_TEXT.to_string()
    } else {
        parts.join(" | ")
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingPayload {
    #[serde(default)]
    embedding: Option<Vector>,
    #[serde(default)]
    embeddings: Option<Vec<Vector>>,
}

/// Embedding generator for profile text
pub struct EmbeddingGenerator {
    invoker: Arc<dyn ModelInvoker>,
    model_id: String,
    dimensions: Option<u32>,
    normalize: bool,
}

impl EmbeddingGenerator {
    pub fn new(invoker: Arc<dyn ModelInvoker>, model_id: String) -> Self {
        Self {
            invoker,
            model_id,
            dimensions: None,
            normalize: true,
        }
    }

    pub fn from_config(invoker: Arc<dyn ModelInvoker>, config: &BondConfig) -> Self {
        Self::new(invoker, config.embed_model_id.clone())
            .with_dimensions(config.embed_dimensions)
            .with_normalize(config.embed_normalize)
    }

    /// Request a specific vector size. Unsupported sizes fall back to the
    /// model default.
    pub fn with_dimensions(mut self, dimensions: Option<u32>) -> Self {
        self.dimensions = match dimensions {
            Some(d) if SUPPORTED_EMBED_DIMS.contains(&d) => Some(d),
            Some(d) => {
                warn!(
                    "Ignoring unsupported embedding dimension {} (expected one of {:?})",
                    d, SUPPORTED_EMBED_DIMS
                );
                None
            }
            None => None,
        };
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn dimensions(&self) -> Option<u32> {
        self.dimensions
    }

    fn request_body(&self, input: Value) -> Value {
        let mut body = json!({
            "inputText": input,
            "normalize": self.normalize,
        });
        if let Some(dimensions) = self.dimensions {
            body["dimensions"] = json!(dimensions);
        }
        body
    }

    async fn invoke(&self, input: Value) -> Result<EmbeddingPayload> {
        let body = self.request_body(input);
        let response = self.invoker.invoke_model(&self.model_id, &body).await?;

        serde_json::from_value::<EmbeddingPayload>(response.clone()).map_err(|e| {
            BondError::Service(format!("Unexpected embedding payload: {} - {}", e, response))
        })
    }

    /// Embed one text
    pub async fn embed_text(&self, text: &str) -> Result<Vector> {
        debug!("Embedding {} chars with {}", text.len(), self.model_id);

        match self.invoke(json!(text)).await? {
            EmbeddingPayload {
                embedding: Some(vector),
                ..
            } => Ok(vector),
            EmbeddingPayload {
                embeddings: Some(vectors),
                ..
            } => vectors.into_iter().next().ok_or_else(|| {
                BondError::Service("Unexpected embedding payload: empty embeddings list".to_string())
            }),
            _ => Err(BondError::Service(
                "Unexpected embedding payload: no embedding field".to_string(),
            )),
        }
    }

    /// Embed several texts in one call
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!("Embedding batch of {} texts with {}", texts.len(), self.model_id);

        let vectors = match self.invoke(json!(texts)).await? {
            EmbeddingPayload {
                embeddings: Some(vectors),
                ..
            } => vectors,
            EmbeddingPayload {
                embedding: Some(vector),
                ..
            } => vec![vector],
            _ => {
                return Err(BondError::Service(
                    "Unexpected embedding payload: no embeddings field".to_string(),
                ))
            }
        };

        if vectors.len() != texts.len() {
            warn!(
                "Embedding batch returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
        }
        Ok(vectors)
    }

    /// Flatten and embed a profile
    pub async fn embed_profile(&self, profile: &Profile) -> Result<Vector> {
        self.embed_text(&flatten_profile(profile)).await
    }
}
