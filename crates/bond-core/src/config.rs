//! ============================================================================
//! Configuration - Environment-driven settings
//! ============================================================================
//! All settings come from environment variables (a `.env` file is loaded by
//! the binary before this runs). Unset values fall back to defaults; an
//! invalid embedding dimension is ignored in favor of the model default.
//! ============================================================================

use tracing::warn;

/// Embedding sizes Titan text embeddings v2 accepts
pub const SUPPORTED_EMBED_DIMS: [u32; 3] = [256, 512, 1024];

pub const DEFAULT_BUCKET: &str = "bond-audio-uploads";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_TEXT_MODEL: &str = "amazon.nova-micro-v1:0";
pub const DEFAULT_EMBED_MODEL: &str = "amazon.titan-embed-text-v2:0";
pub const DEFAULT_LANGUAGE: &str = "en-US";
pub const DEFAULT_STT_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_STT_MODEL: &str = "whisper-1";

/// Runtime configuration for one worker
#[derive(Debug, Clone, PartialEq)]
pub struct BondConfig {
    /// Container holding recordings, transcripts and profiles
    pub bucket: String,
    pub bedrock_region: String,
    /// Full endpoint override (tests, VPC endpoints)
    pub bedrock_endpoint: Option<String>,
    pub bedrock_api_key: Option<String>,
    pub text_model_id: String,
    pub embed_model_id: String,
    /// Validated embedding size; None means the model default
    pub embed_dimensions: Option<u32>,
    pub embed_normalize: bool,
    pub language_code: String,
    pub stt_base_url: String,
    pub stt_api_key: Option<String>,
    pub stt_model: String,
    pub store_path: Option<String>,
}

impl Default for BondConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            bedrock_region: DEFAULT_REGION.to_string(),
            bedrock_endpoint: None,
            bedrock_api_key: None,
            text_model_id: DEFAULT_TEXT_MODEL.to_string(),
            embed_model_id: DEFAULT_EMBED_MODEL.to_string(),
            embed_dimensions: None,
            embed_normalize: true,
            language_code: DEFAULT_LANGUAGE.to_string(),
            stt_base_url: DEFAULT_STT_URL.to_string(),
            stt_api_key: None,
            stt_model: DEFAULT_STT_MODEL.to_string(),
            store_path: None,
        }
    }
}

impl BondConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            bucket: var("PROFILE_BUCKET").unwrap_or(defaults.bucket),
            bedrock_region: var("BEDROCK_REGION").unwrap_or(defaults.bedrock_region),
            bedrock_endpoint: var("BEDROCK_ENDPOINT"),
            bedrock_api_key: var("AWS_BEARER_TOKEN_BEDROCK"),
            text_model_id: var("BEDROCK_MODEL_ID").unwrap_or(defaults.text_model_id),
            embed_model_id: var("BEDROCK_EMBED_MODEL_ID").unwrap_or(defaults.embed_model_id),
            embed_dimensions: var("TITAN_EMBED_DIM").and_then(|raw| parse_dimensions(&raw)),
            embed_normalize: var("TITAN_EMBED_NORMALIZE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.embed_normalize),
            language_code: var("VPM_LANG").unwrap_or(defaults.language_code),
            stt_base_url: var("STT_API_URL").unwrap_or(defaults.stt_base_url),
            stt_api_key: var("STT_API_KEY").or_else(|| var("OPENAI_API_KEY")),
            stt_model: var("STT_MODEL").unwrap_or(defaults.stt_model),
            store_path: var("BOND_STORE_PATH"),
        }
    }

    /// Bedrock runtime endpoint for the configured region
    pub fn bedrock_endpoint(&self) -> String {
        self.bedrock_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://bedrock-runtime.{}.amazonaws.com", self.bedrock_region))
    }
}

/// Parse an embedding size; anything outside the supported set yields None
pub fn parse_dimensions(raw: &str) -> Option<u32> {
    match raw.trim().parse::<u32>() {
        Ok(dim) if SUPPORTED_EMBED_DIMS.contains(&dim) => Some(dim),
        Ok(dim) => {
            warn!(
                "Ignoring unsupported embedding dimension {} (supported: {:?})",
                dim, SUPPORTED_EMBED_DIMS
            );
            None
        }
        Err(_) => {
            warn!("Ignoring invalid embedding dimension '{}'", raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> BondConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BondConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config, BondConfig::default());
        assert_eq!(
            config.bedrock_endpoint(),
            "https://bedrock-runtime.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PROFILE_BUCKET", "uploads"),
            ("BEDROCK_REGION", "eu-west-1"),
            ("TITAN_EMBED_DIM", "512"),
            ("TITAN_EMBED_NORMALIZE", "FALSE"),
            ("VPM_LANG", "es-ES"),
        ]);
        assert_eq!(config.bucket, "uploads");
        assert_eq!(config.embed_dimensions, Some(512));
        assert!(!config.embed_normalize);
        assert_eq!(config.language_code, "es-ES");
        assert!(config.bedrock_endpoint().contains("eu-west-1"));
    }

    #[test]
    fn test_invalid_dimensions_fall_back_to_default() {
        assert_eq!(config_from(&[("TITAN_EMBED_DIM", "300")]).embed_dimensions, None);
        assert_eq!(config_from(&[("TITAN_EMBED_DIM", "big")]).embed_dimensions, None);
        assert_eq!(config_from(&[("TITAN_EMBED_DIM", " 1024 ")]).embed_dimensions, Some(1024));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config_from(&[("PROFILE_BUCKET", "   "), ("BEDROCK_ENDPOINT", "")]);
        assert_eq!(config.bucket, DEFAULT_BUCKET);
        assert_eq!(config.bedrock_endpoint, None);
    }
}
