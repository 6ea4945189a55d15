use crate::output_parser::ParseError;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by steps, composers and backends.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A template referenced a variable that was not bound.
    #[error("Missing template variable '{name}'")]
    MissingVariable { name: String },

    /// A strict template was given a variable it does not use.
    #[error("Unused template variable '{name}'")]
    UnusedVariable { name: String },

    /// A step received a payload shape it does not accept.
    #[error("Step '{step}' expected {expected}, got {found}")]
    InvalidInput {
        step: String,
        expected: &'static str,
        found: String,
    },

    /// Raw model text could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A parsed value violates its schema.
    #[error("Schema '{schema}' validation failed: {reason}")]
    SchemaValidation { schema: String, reason: String },

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider answers with a non-success status.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 401, 429, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// Low-level HTTP transport failure (connection refused, DNS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// The request exceeded the configured client timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The provider answered but the payload was unusable.
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// Reading a local document failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed at the serde level.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Execution was cancelled via the cancellation flag.
    #[error("Pipeline was cancelled")]
    Cancelled,

    /// Invalid configuration detected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Whether the error came from the model-serving backend.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            PipelineError::HttpError { .. }
                | PipelineError::Request(_)
                | PipelineError::Timeout(_)
                | PipelineError::Provider { .. }
        )
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PipelineError::Timeout(err.to_string())
        } else {
            PipelineError::Request(err)
        }
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<PipelineError>() {
            Ok(inner) => inner,
            Err(other) => PipelineError::Other(format!("{:#}", other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_grouped() {
        let http = PipelineError::HttpError {
            status: 429,
            body: "slow down".into(),
            retry_after: None,
        };
        assert!(http.is_provider_error());
        assert!(PipelineError::Timeout("60s".into()).is_provider_error());
        assert!(!PipelineError::Cancelled.is_provider_error());
        assert!(!PipelineError::MissingVariable { name: "x".into() }.is_provider_error());
    }

    #[test]
    fn test_anyhow_roundtrip_keeps_variant() {
        let err: anyhow::Error = PipelineError::UnusedVariable { name: "extra".into() }.into();
        let back = PipelineError::from(err);
        assert!(matches!(back, PipelineError::UnusedVariable { name } if name == "extra"));
    }

    #[test]
    fn test_anyhow_other() {
        let back = PipelineError::from(anyhow::anyhow!("boom"));
        assert_eq!(back.to_string(), "boom");
    }
}
