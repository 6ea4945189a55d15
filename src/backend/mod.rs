//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over model providers, translating between
//! normalized [`LlmRequest`]/[`LlmResponse`] types and provider-specific
//! HTTP APIs.
//!
//! ```text
//! ChatModel ──► LlmRequest ──► Backend::complete() ──► LlmResponse
//!                                     │
//!                  ┌──────────────────┼──────────────────┐
//!            OpenAiBackend       GeminiBackend       MockBackend
//!        /v1/chat/completions  :generateContent     canned / echo
//!          (Groq, OpenAI)
//! ```

pub mod backoff;
pub mod gemini;
pub mod mock;
pub mod openai;

pub use backoff::{with_backoff, BackoffConfig};
pub use gemini::GeminiBackend;
pub use mock::MockBackend;
pub use openai::OpenAiBackend;

use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Sampling and output-format knobs sent with every request.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Ask the provider for a JSON-only response.
    pub json_mode: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            json_mode: false,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }
}

/// The role of a chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// End-user input.
    #[serde(alias = "user")]
    Human,
    /// Model response.
    #[serde(alias = "ai", alias = "model")]
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A normalized, provider-agnostic model request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"llama-3.1-8b-instant"`, `"gemini-2.5-flash"`).
    pub model: String,
    /// The conversation, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Sampling configuration.
    pub config: LlmConfig,
}

impl LlmRequest {
    /// A single-turn request carrying one human message.
    pub fn prompt(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::human(text)],
            config: LlmConfig::default(),
        }
    }

    /// Content of the most recent human message.
    pub fn last_human(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Human)
            .map(|m| m.content.as_str())
    }
}

/// A normalized model response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,
    /// HTTP status code (for diagnostics/logging).
    pub status: u16,
    /// Provider-specific metadata (token counts, model info), as raw JSON.
    pub metadata: Option<Value>,
}

/// Abstraction over model providers.
///
/// Implementors own their endpoint and credentials, so different steps of a
/// pipeline can talk to different providers through the same interface.
/// Object-safe; used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a completion call.
    async fn complete(&self, client: &Client, request: &LlmRequest) -> Result<LlmResponse>;

    /// Model used when a [`ChatModel`](crate::ChatModel) does not name one.
    fn default_model(&self) -> &str;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Strip known provider path suffixes from a base URL.
///
/// e.g. `"https://api.groq.com/openai/v1"` -> `"https://api.groq.com/openai"`.
pub(crate) fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    for suffix in &["/v1/chat/completions", "/v1beta/models", "/v1beta", "/v1"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

/// Parse a `Retry-After` header value as seconds.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Send a JSON request and return the decoded body with its status.
///
/// Non-success statuses become [`PipelineError::HttpError`] carrying the body
/// and any `Retry-After` hint.
pub(crate) async fn send_json(request: RequestBuilder) -> Result<(Value, u16)> {
    let resp = check_status(request.send().await?).await?;
    let status = resp.status().as_u16();
    let json_resp: Value = resp.json().await?;
    Ok((json_resp, status))
}

/// Send a request and return the body as text, mapping non-success statuses
/// to [`PipelineError::HttpError`].
pub(crate) async fn send_text(request: RequestBuilder) -> Result<String> {
    let resp = check_status(request.send().await?).await?;
    Ok(resp.text().await?)
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = resp.text().await.unwrap_or_default();
    Err(PipelineError::HttpError {
        status,
        body,
        retry_after,
    })
}
