//! Backend for OpenAI-compatible chat APIs.
//!
//! [`OpenAiBackend`] covers Groq (the default preset), OpenAI, vLLM,
//! llama.cpp server, LM Studio, Together AI and any other server exposing
//! `/v1/chat/completions`.

use super::{normalize_base_url, send_json, Backend, LlmRequest, LlmResponse, Role};
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

/// Groq's OpenAI-compatible base URL.
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai";
/// Model used for Groq when none is configured.
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Backend for any OpenAI-compatible API.
///
/// # Example
///
/// ```
/// use llm_runnables::backend::OpenAiBackend;
///
/// let groq = OpenAiBackend::groq("gsk_...");
/// let local = OpenAiBackend::new("http://localhost:8080/v1", "qwen2.5");
/// ```
#[derive(Clone)]
pub struct OpenAiBackend {
    base_url: String,
    default_model: String,
    api_key: Option<String>,
    organization: Option<String>,
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("api_key", &self.api_key.as_deref().map(mask_key))
            .field("organization", &self.organization)
            .finish()
    }
}

pub(crate) fn mask_key(key: &str) -> String {
    match key.get(..6) {
        Some(prefix) if key.len() > 6 => format!("{}***", prefix),
        _ => "***".to_string(),
    }
}

impl OpenAiBackend {
    /// Create a backend for `base_url` without authentication.
    pub fn new(base_url: impl AsRef<str>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(base_url.as_ref()),
            default_model: default_model.into(),
            api_key: None,
            organization: None,
        }
    }

    /// Groq preset: Groq's endpoint, bearer key, `llama-3.1-8b-instant`.
    pub fn groq(api_key: impl Into<String>) -> Self {
        Self::new(GROQ_BASE_URL, GROQ_DEFAULT_MODEL).with_api_key(api_key)
    }

    /// Set the API key, sent as `Authorization: Bearer {key}`.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Model used when a [`ChatModel`](crate::ChatModel) does not name one.
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the `OpenAI-Organization` header.
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_body(request: &LlmRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::Human => "user",
                    Role::Assistant => "assistant",
                };
                json!({"role": role, "content": msg.content})
            })
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.config.temperature,
            "max_tokens": request.config.max_tokens,
            "stream": false,
        });

        if request.config.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    fn extract_metadata(json_resp: &Value) -> Option<Value> {
        let mut meta = serde_json::Map::new();
        for key in ["usage", "model", "id"] {
            if let Some(v) = json_resp.get(key) {
                meta.insert(key.into(), v.clone());
            }
        }
        (!meta.is_empty()).then_some(Value::Object(meta))
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    async fn complete(&self, client: &Client, request: &LlmRequest) -> Result<LlmResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut http = client.post(&url).json(&Self::build_body(request));
        if let Some(ref key) = self.api_key {
            http = http.bearer_auth(key);
        }
        if let Some(ref org) = self.organization {
            http = http.header("OpenAI-Organization", org.as_str());
        }

        let (json_resp, status) = send_json(http).await?;

        let text = json_resp
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| PipelineError::Provider {
                provider: self.name(),
                message: "response has no choices[0].message.content".to_string(),
            })?
            .to_string();

        Ok(LlmResponse {
            text,
            status,
            metadata: Self::extract_metadata(&json_resp),
        })
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
