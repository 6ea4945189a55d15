//! Backend for the Google Gemini `generateContent` API.
//!
//! System messages are folded into `systemInstruction`; the remaining turns
//! become `contents` with roles `user` and `model`.

use super::openai::mask_key;
use super::{normalize_base_url, send_json, Backend, LlmRequest, LlmResponse, Role};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Public Gemini endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Model used when none is configured.
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<Value>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Backend for Google Gemini.
///
/// ```
/// use llm_runnables::backend::GeminiBackend;
///
/// let gemini = GeminiBackend::new("AIza...");
/// ```
#[derive(Clone)]
pub struct GeminiBackend {
    base_url: String,
    default_model: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("api_key", &mask_key(&self.api_key))
            .finish()
    }
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: GEMINI_BASE_URL.to_string(),
            default_model: GEMINI_DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Point at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Self {
        self.base_url = normalize_base_url(base_url.as_ref());
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn build_body(request: &LlmRequest) -> GenerateRequest {
        let system: Vec<Part> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| Part {
                text: m.content.clone(),
            })
            .collect();

        let contents = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(if m.role == Role::Assistant { "model" } else { "user" }.to_string()),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GenerateRequest {
            system_instruction: (!system.is_empty()).then_some(Content {
                role: None,
                parts: system,
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: request.config.temperature,
                max_output_tokens: request.config.max_tokens,
                response_mime_type: request.config.json_mode.then_some("application/json"),
            },
        }
    }

    fn decode_response(&self, json_resp: Value) -> Result<GenerateResponse> {
        serde_json::from_value(json_resp).map_err(|e| PipelineError::Provider {
            provider: self.name(),
            message: format!("malformed generateContent response: {}", e),
        })
    }

    fn extract_text(&self, resp: &GenerateResponse) -> Result<String> {
        let candidate = resp.candidates.first().ok_or_else(|| PipelineError::Provider {
            provider: self.name(),
            message: "response has no candidates".to_string(),
        })?;

        let text: String = candidate
            .content
            .as_ref()
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(PipelineError::Provider {
                provider: self.name(),
                message: format!(
                    "empty candidate (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                ),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl Backend for GeminiBackend {
    async fn complete(&self, client: &Client, request: &LlmRequest) -> Result<LlmResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, request.model
        );
        let http = client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_body(request));

        let (json_resp, status) = send_json(http).await?;
        let parsed = self.decode_response(json_resp)?;
        let text = self.extract_text(&parsed)?;

        let mut meta = serde_json::Map::new();
        if let Some(usage) = parsed.usage_metadata {
            meta.insert("usage".into(), usage);
        }
        if let Some(version) = parsed.model_version {
            meta.insert("model".into(), Value::String(version));
        }

        Ok(LlmResponse {
            text,
            status,
            metadata: (!meta.is_empty()).then_some(Value::Object(meta)),
        })
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ChatMessage, LlmConfig};
    use serde_json::json;

    #[test]
    fn test_body_folds_system_and_maps_roles() {
        let request = LlmRequest {
            model: GEMINI_DEFAULT_MODEL.into(),
            messages: vec![
                ChatMessage::system("You write blogs."),
                ChatMessage::human("AI in health"),
                ChatMessage::assistant("Draft..."),
                ChatMessage::human("shorter"),
            ],
            config: LlmConfig::default().with_temperature(0.2).with_json_mode(true),
        };
        let body = serde_json::to_value(GeminiBackend::build_body(&request)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "You write blogs.");
        assert!(body["systemInstruction"].get("role").is_none());
        let roles: Vec<&str> = body["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(body["generationConfig"]["temperature"], 0.2);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_body_without_system() {
        let body =
            serde_json::to_value(GeminiBackend::build_body(&LlmRequest::prompt("m", "hi"))).unwrap();
        assert!(body.get("systemInstruction").is_none());
        assert!(body["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let backend = GeminiBackend::new("key");
        let resp: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "Dhaka"}]}}],
            "usageMetadata": {"totalTokenCount": 12}
        }))
        .unwrap();
        assert_eq!(backend.extract_text(&resp).unwrap(), "Hello Dhaka");
    }

    #[test]
    fn test_malformed_response_is_provider_error() {
        let backend = GeminiBackend::new("key");
        let err = backend
            .decode_response(json!({"candidates": "not a list"}))
            .unwrap_err();
        assert!(err.is_provider_error());
        assert!(matches!(err, PipelineError::Provider { provider: "gemini", .. }));
    }

    #[test]
    fn test_extract_text_blocked_candidate() {
        let backend = GeminiBackend::new("key");
        let resp: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        let err = backend.extract_text(&resp).unwrap_err();
        assert!(err.is_provider_error());
        assert!(err.to_string().contains("SAFETY"));

        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(backend.extract_text(&empty).is_err());
    }
}
