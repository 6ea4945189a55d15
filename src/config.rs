//! Process configuration: API keys, model names and timeouts.
//!
//! [`Settings::from_env`] loads a `.env` file (if present) and reads:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `GROQ_API_KEY` | Groq bearer key | none |
//! | `GOOGLE_API_KEY` / `GEMINI_API_KEY` | Gemini key (first one set wins) | none |
//! | `GROQ_MODEL` | Groq model id | `llama-3.1-8b-instant` |
//! | `GEMINI_MODEL` | Gemini model id | `gemini-2.5-flash` |
//! | `LLM_TIMEOUT_SECS` | HTTP request timeout | `60` |
//! | `RUST_LOG` | log filter for [`init_logging`](crate::logging::init_logging) | none |

use crate::backend::gemini::GEMINI_DEFAULT_MODEL;
use crate::backend::openai::GROQ_DEFAULT_MODEL;
use crate::backend::{GeminiBackend, OpenAiBackend};
use crate::error::Result;
use crate::exec_ctx::{ExecCtx, DEFAULT_TIMEOUT};
use crate::PipelineError;
use std::time::Duration;

/// Configuration read once at process start.
#[derive(Clone)]
pub struct Settings {
    pub groq_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub groq_model: String,
    pub gemini_model: String,
    pub timeout: Duration,
    pub log_level: Option<String>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |k: &Option<String>| if k.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Settings")
            .field("groq_api_key", &set(&self.groq_api_key))
            .field("gemini_api_key", &set(&self.gemini_api_key))
            .field("groq_model", &self.groq_model)
            .field("gemini_model", &self.gemini_model)
            .field("timeout", &self.timeout)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Settings {
    /// Load `.env` and read the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout = match get("LLM_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    PipelineError::InvalidConfig(format!(
                        "LLM_TIMEOUT_SECS must be a positive integer, got '{}'",
                        raw
                    ))
                })?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            groq_api_key: get("GROQ_API_KEY"),
            gemini_api_key: get("GOOGLE_API_KEY").or_else(|| get("GEMINI_API_KEY")),
            groq_model: get("GROQ_MODEL").unwrap_or_else(|| GROQ_DEFAULT_MODEL.to_string()),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            timeout,
            log_level: get("RUST_LOG"),
        })
    }

    /// A Groq backend using the configured key and model.
    pub fn groq_backend(&self) -> Result<OpenAiBackend> {
        let key = self.groq_api_key.as_ref().ok_or_else(|| {
            PipelineError::InvalidConfig("GROQ_API_KEY is not set".to_string())
        })?;
        Ok(OpenAiBackend::groq(key.clone()).with_default_model(self.groq_model.clone()))
    }

    /// A Gemini backend using the configured key and model.
    pub fn gemini_backend(&self) -> Result<GeminiBackend> {
        let key = self.gemini_api_key.as_ref().ok_or_else(|| {
            PipelineError::InvalidConfig(
                "GOOGLE_API_KEY (or GEMINI_API_KEY) is not set".to_string(),
            )
        })?;
        Ok(GeminiBackend::new(key.clone()).with_default_model(self.gemini_model.clone()))
    }

    /// An execution context with the configured request timeout.
    pub fn exec_ctx(&self) -> ExecCtx {
        ExecCtx::builder().timeout(self.timeout).build()
    }
}
