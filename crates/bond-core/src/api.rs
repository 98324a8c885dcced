//! ============================================================================
//! API Boundary - Event and request envelopes
//! ============================================================================
//! Translates the two invocation shapes into service calls:
//! - upload events (`Records[0].s3.bucket.name` / `.object.key`) → ingestion
//! - HTTP-style similarity requests → `SimilarityService::compare`
//!
//! Similarity responses always carry a status code and JSON body; errors are
//! never propagated past `handle_similarity_request`.
//! ============================================================================

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

use crate::pipeline::IngestionPipeline;
use crate::similarity::SimilarityService;
use crate::types::{BondError, RecordingRef, Result};

const INVALID_JSON_BODY: &str = "Invalid JSON body";

/// HTTP-style request envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(rename = "isBase64Encoded", default)]
    pub is_base64_encoded: bool,
}

impl ApiRequest {
    /// Plain JSON body
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            is_base64_encoded: false,
        }
    }
}

/// HTTP-style response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn json(status_code: u16, body: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        Self {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    pub fn error(status_code: u16, message: &str) -> Self {
        Self::json(status_code, &json!({ "error": message }))
    }

    /// Parsed body, `Value::Null` if it is not JSON
    pub fn body_json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Deserialize)]
struct SimilarityBody {
    #[serde(rename = "profileA", default)]
    profile_a: Option<Value>,
    #[serde(rename = "profileB", default)]
    profile_b: Option<Value>,
}

/// Non-string ids are treated like missing ones
fn id_field(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}

fn decode_body(request: &ApiRequest) -> std::result::Result<String, String> {
    let body = request.body.clone().unwrap_or_default();
    if !request.is_base64_encoded {
        return Ok(body);
    }
    let bytes = STANDARD
        .decode(body.trim())
        .map_err(|e| format!("bad base64: {}", e))?;
    String::from_utf8(bytes).map_err(|e| format!("bad UTF-8: {}", e))
}

/// Handle one similarity request end to end
pub async fn handle_similarity_request(service: &SimilarityService, request: &ApiRequest) -> ApiResponse {
    let parsed = decode_body(request).and_then(|body| {
        serde_json::from_str::<SimilarityBody>(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            format!("{}; body={:?}", e, preview)
        })
    });

    let payload = match parsed {
        Ok(payload) => payload,
        Err(reason) => {
            warn!("Bad JSON body: {}", reason);
            return ApiResponse::error(400, INVALID_JSON_BODY);
        }
    };

    let a = id_field(payload.profile_a);
    let b = id_field(payload.profile_b);

    match service.compare(&a, &b).await {
        Ok(report) => ApiResponse::json(
            200,
            &json!({
                "ok": true,
                "similarity": report.similarity,
                "summaries": report.summaries,
                "icebreakers": report.icebreakers,
            }),
        ),
        Err(BondError::NotFound(key)) => {
            ApiResponse::error(404, &format!("Vector file not found: {}", key))
        }
        Err(e) => {
            let status = e.status_code();
            if status >= 500 {
                error!("Similarity request failed: {}", e);
            }
            ApiResponse::error(status, &e.to_string())
        }
    }
}

// ============================================================================
// Upload events
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct UploadEvent {
    #[serde(rename = "Records")]
    pub records: Vec<UploadRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectEntity {
    pub key: String,
}

impl UploadEvent {
    /// Recording named by the first record, with its key URL-decoded
    pub fn recording(&self) -> Result<RecordingRef> {
        let record = self
            .records
            .first()
            .ok_or_else(|| BondError::InvalidInput("Upload event has no records".to_string()))?;
        let key = decode_object_key(&record.s3.object.key)?;
        Ok(RecordingRef::new(record.s3.bucket.name.clone(), key))
    }
}

/// Object keys in events are form-encoded: `+` is a space
pub fn decode_object_key(raw: &str) -> Result<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|k| k.into_owned())
        .map_err(|e| BondError::InvalidInput(format!("Invalid object key {}: {}", raw, e)))
}

/// Run ingestion for an upload event. Failures propagate so the event
/// source can redeliver.
pub async fn handle_upload_event(pipeline: &IngestionPipeline, event: &UploadEvent) -> Result<ApiResponse> {
    let recording = event.recording()?;
    info!("Upload trigger: bucket={} key={}", recording.bucket, recording.key);

    let report = pipeline.ingest(&recording).await?;
    let body = serde_json::to_value(&report)
        .map_err(|e| BondError::Service(format!("Failed to serialize report: {}", e)))?;
    Ok(ApiResponse::json(200, &body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::Enricher;
    use crate::llm::{Completion, Prompt, TextGenerator};
    use crate::store::{keys, Artifacts, MemoryBackend};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct QuietGenerator;

    #[async_trait]
    impl TextGenerator for QuietGenerator {
        async fn generate(&self, _prompt: &Prompt) -> Result<Completion> {
            Ok(Completion::from_text("Quiet reader"))
        }
    }

    async fn service_with(vectors: &[(&str, Vec<f32>)]) -> SimilarityService {
        let store = Artifacts::new(Arc::new(MemoryBackend::new()), "bucket");
        for (id, v) in vectors {
            store.write_json_compact(&keys::vector(id), v).await.unwrap();
        }
        SimilarityService::new(store, Enricher::new(Arc::new(QuietGenerator)))
    }

    #[test]
    fn test_decode_object_key() {
        assert_eq!(decode_object_key("uploads/Alice+Smith.mp3").unwrap(), "uploads/Alice Smith.mp3");
        assert_eq!(decode_object_key("a%2Bb%20c.mp3").unwrap(), "a+b c.mp3");
    }

    #[test]
    fn test_upload_event_parsing() {
        let event: UploadEvent = serde_json::from_value(json!({
            "Records": [{"s3": {"bucket": {"name": "bond"}, "object": {"key": "Bob+Jones.mp3", "size": 10}}}]
        }))
        .unwrap();
        let recording = event.recording().unwrap();
        assert_eq!(recording.bucket, "bond");
        assert_eq!(recording.key, "Bob Jones.mp3");
        assert_eq!(recording.profile_name(), "bob jones");

        let empty = UploadEvent { records: vec![] };
        assert!(matches!(empty.recording(), Err(BondError::InvalidInput(_))));
    }

    #[test]
    fn test_response_headers() {
        let response = ApiResponse::error(400, "nope");
        assert_eq!(response.headers["Content-Type"], "application/json");
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(response.body_json(), json!({"error": "nope"}));

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["statusCode"], 400);
    }

    #[tokio::test]
    async fn test_bad_bodies_are_400() {
        let service = service_with(&[]).await;
        for request in [
            ApiRequest::json("{not json"),
            ApiRequest::default(),
            ApiRequest {
                body: Some("%%%".into()),
                is_base64_encoded: true,
            },
            ApiRequest {
                body: Some(STANDARD.encode([0xffu8, 0xfe])),
                is_base64_encoded: true,
            },
        ] {
            let response = handle_similarity_request(&service, &request).await;
            assert_eq!(response.status_code, 400);
            assert_eq!(response.body_json(), json!({"error": "Invalid JSON body"}));
        }
    }

    #[tokio::test]
    async fn test_missing_ids_are_400() {
        let service = service_with(&[]).await;
        for body in [r#"{"profileA":"alice"}"#, r#"{"profileA":" ","profileB":"bob"}"#, r#"{"profileA":1,"profileB":"bob"}"#] {
            let response = handle_similarity_request(&service, &ApiRequest::json(body)).await;
            assert_eq!(response.status_code, 400);
            assert_eq!(
                response.body_json(),
                json!({"error": "profileA and profileB are required"})
            );
        }
    }

    #[tokio::test]
    async fn test_base64_request_succeeds() {
        let service = service_with(&[("alice", vec![1.0, 0.0]), ("bob", vec![0.0, 1.0])]).await;
        let request = ApiRequest {
            body: Some(STANDARD.encode(r#"{"profileA":"Alice","profileB":"bob"}"#)),
            is_base64_encoded: true,
        };

        let response = handle_similarity_request(&service, &request).await;
        assert_eq!(response.status_code, 200);
        let body = response.body_json();
        assert_eq!(body["ok"], true);
        assert_eq!(body["similarity"], 0.0);
        assert_eq!(body["summaries"], json!({"alice": null, "bob": null}));
        assert_eq!(body["icebreakers"], Value::Null);
    }

    #[tokio::test]
    async fn test_unknown_vector_is_404() {
        let service = service_with(&[("alice", vec![1.0])]).await;
        let response =
            handle_similarity_request(&service, &ApiRequest::json(r#"{"profileA":"alice","profileB":"zed"}"#)).await;
        assert_eq!(response.status_code, 404);
        assert_eq!(
            response.body_json(),
            json!({"error": "Vector file not found: profiles/zed/vector.json"})
        );
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_500() {
        let service = service_with(&[("alice", vec![1.0]), ("bob", vec![1.0, 2.0])]).await;
        let response =
            handle_similarity_request(&service, &ApiRequest::json(r#"{"profileA":"alice","profileB":"bob"}"#)).await;
        assert_eq!(response.status_code, 500);
        assert!(response.body_json()["error"].as_str().unwrap().contains("1 vs 2"));
    }
}
