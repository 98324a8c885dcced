//! ============================================================================
//! LLM Module - Text generation and model invocation seams
//! ============================================================================
//! The extractor and enricher talk to a `TextGenerator`; the embedding
//! generator talks to a `ModelInvoker`. `BedrockClient` implements both.
//! ============================================================================

mod bedrock;

pub use bedrock::BedrockClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::Result;

/// One generation call: system instruction, user message, sampling limits
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Text blocks returned by a generation call, in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub blocks: Vec<String>,
}

impl Completion {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            blocks: vec![text.into()],
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.blocks.first().map(|s| s.as_str())
    }

    /// All blocks concatenated
    pub fn joined(&self) -> String {
        self.blocks.concat()
    }
}

/// Chat-style text generation
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<Completion>;
}

/// Raw JSON-in / JSON-out model invocation
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke_model(&self, model_id: &str, body: &Value) -> Result<Value>;
}
