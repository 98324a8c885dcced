//! ============================================================================
//! Bedrock Client - Converse and InvokeModel over HTTPS
//! ============================================================================
//! Uses Bedrock API-key (bearer token) authentication, so plain `reqwest`
//! calls are enough:
//! - POST /model/{id}/converse  chat completion with system + user text
//! - POST /model/{id}/invoke    raw JSON body (Titan embeddings)
//! ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{Completion, ModelInvoker, Prompt, TextGenerator};
use crate::config::BondConfig;
use crate::types::{BondError, Result};

/// Bedrock runtime client bound to one text model
pub struct BedrockClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    text_model: String,
}

impl BedrockClient {
    /// Create a client for an explicit endpoint
    pub fn new(endpoint: String, api_key: Option<String>, text_model: String) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            text_model,
        }
    }

    /// Create from configuration (region-derived endpoint unless overridden)
    pub fn from_config(config: &BondConfig) -> Self {
        Self::new(
            config.bedrock_endpoint(),
            config.bedrock_api_key.clone(),
            config.text_model_id.clone(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    fn model_url(&self, model_id: &str, action: &str) -> String {
        format!(
            "{}/model/{}/{}",
            self.endpoint,
            urlencoding::encode(model_id),
            action
        )
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<String> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| BondError::Service(format!("Failed to call Bedrock: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BondError::Service(format!("Failed to read Bedrock response: {}", e)))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ErrorResponse>(&text) {
                return Err(BondError::Service(format!(
                    "Bedrock API error ({}): {}",
                    status, error.message
                )));
            }
            return Err(BondError::Service(format!("Bedrock API error ({}): {}", status, text)));
        }

        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for BedrockClient {
    async fn generate(&self, prompt: &Prompt) -> Result<Completion> {
        debug!(
            "Calling Bedrock converse ({}) with {} chars",
            self.text_model,
            prompt.user.len()
        );

        let request = ConverseRequest {
            system: vec![TextBlock {
                text: prompt.system.clone(),
            }],
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![TextBlock {
                    text: prompt.user.clone(),
                }],
            }],
            inference_config: InferenceConfig {
                max_tokens: prompt.max_tokens,
                temperature: prompt.temperature,
            },
        };

        let url = self.model_url(&self.text_model, "converse");
        let body = self.post_json(&url, &request).await?;

        let response: ConverseResponse = serde_json::from_str(&body).map_err(|e| {
            BondError::Service(format!("Failed to parse converse response: {} - body: {}", e, body))
        })?;

        let blocks = response
            .output
            .and_then(|o| o.message)
            .map(|m| m.content)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|block| block.text)
            .collect();

        Ok(Completion { blocks })
    }
}

#[async_trait]
impl ModelInvoker for BedrockClient {
    async fn invoke_model(&self, model_id: &str, body: &Value) -> Result<Value> {
        debug!("Invoking Bedrock model {}", model_id);

        let url = self.model_url(model_id, "invoke");
        let text = self.post_json(&url, body).await?;

        serde_json::from_str(&text).map_err(|e| {
            BondError::Service(format!("Failed to parse invoke response: {} - body: {}", e, text))
        })
    }
}

// ============================================================================
// Bedrock API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ConverseRequest {
    system: Vec<TextBlock>,
    messages: Vec<Message>,
    #[serde(rename = "inferenceConfig")]
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize)]
struct TextBlock {
    text: String,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<TextBlock>,
}

#[derive(Debug, Serialize)]
struct InferenceConfig {
    #[serde(rename = "maxTokens")]
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    #[serde(default)]
    output: Option<ConverseOutput>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    #[serde(default)]
    message: Option<OutputMessage>,
}

#[derive(Debug, Deserialize)]
struct OutputMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

/// Content blocks may be text, tool use, reasoning, ...; only text is kept
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(alias = "Message")]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn prompt() -> Prompt {
        Prompt {
            system: "be brief".to_string(),
            user: "hello".to_string(),
            max_tokens: 60,
            temperature: 0.2,
        }
    }

    #[test]
    fn test_from_config_uses_region() {
        let client = BedrockClient::from_config(&BondConfig::default());
        assert_eq!(client.endpoint(), "https://bedrock-runtime.us-east-1.amazonaws.com");
        assert_eq!(client.text_model(), "amazon.nova-micro-v1:0");
    }

    #[test]
    fn test_model_id_is_escaped() {
        let client = BedrockClient::new("http://localhost/".into(), None, "m".into());
        assert_eq!(
            client.model_url("amazon.titan-embed-text-v2:0", "invoke"),
            "http://localhost/model/amazon.titan-embed-text-v2%3A0/invoke"
        );
    }

    #[tokio::test]
    async fn test_converse_collects_text_blocks() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/model/test-model/converse")
                    .header("Authorization", "Bearer secret")
                    .json_body_partial(r#"{"inferenceConfig":{"maxTokens":60}}"#);
                then.status(200).json_body(json!({
                    "output": {"message": {"role": "assistant", "content": [
                        {"text": "Chess "},
                        {"toolUse": {}},
                        {"text": "lover"}
                    ]}}
                }));
            })
            .await;

        let client = BedrockClient::new(server.base_url(), Some("secret".into()), "test-model".into());
        let completion = client.generate(&prompt()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(completion.first_text(), Some("Chess "));
        assert_eq!(completion.joined(), "Chess lover");
    }

    #[tokio::test]
    async fn test_api_error_is_service_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/model/test-model/converse");
                then.status(403).json_body(json!({"message": "bad token"}));
            })
            .await;

        let client = BedrockClient::new(server.base_url(), None, "test-model".into());
        let err = client.generate(&prompt()).await.unwrap_err();
        assert!(matches!(err, BondError::Service(ref m) if m.contains("bad token")));
    }

    #[tokio::test]
    async fn test_invoke_returns_json() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/model/embedder/invoke")
                    .json_body(json!({"inputText": "hi"}));
                then.status(200).json_body(json!({"embedding": [0.5, 0.5]}));
            })
            .await;

        let client = BedrockClient::new(server.base_url(), None, "test-model".into());
        let value = client.invoke_model("embedder", &json!({"inputText": "hi"})).await.unwrap();
        assert_eq!(value, json!({"embedding": [0.5, 0.5]}));
    }
}
