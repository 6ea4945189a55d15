//! Mock backend for testing without a live model.
//!
//! [`MockBackend`] answers deterministically: canned responses in rotation,
//! an echo of the last human message, or a fixed HTTP failure. Every request
//! is recorded so tests can assert which prompts were sent.
//!
//! # Example
//!
//! ```
//! use llm_runnables::backend::MockBackend;
//!
//! let mock = MockBackend::new(vec!["positive".to_string(), "Thanks!".to_string()]);
//! let echo = MockBackend::echo();
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;

#[derive(Debug)]
enum Mode {
    Canned(Vec<String>),
    Echo,
    Fail(u16),
}

/// A test backend with deterministic answers.
#[derive(Debug)]
pub struct MockBackend {
    mode: Mode,
    index: AtomicUsize,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockBackend {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            index: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Canned responses, returned in order and cycled when exhausted.
    /// An empty list behaves like [`MockBackend::echo`].
    pub fn new(responses: Vec<String>) -> Self {
        if responses.is_empty() {
            return Self::echo();
        }
        Self::with_mode(Mode::Canned(responses))
    }

    /// Always return the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Return the content of the last human message unchanged.
    pub fn echo() -> Self {
        Self::with_mode(Mode::Echo)
    }

    /// Fail every call with the given HTTP status.
    pub fn failing(status: u16) -> Self {
        Self::with_mode(Mode::Fail(status))
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Copies of every request received, oldest first.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// The last human message of every request, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r.last_human().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(&self, _client: &Client, request: &LlmRequest) -> Result<LlmResponse> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }

        let text = match &self.mode {
            Mode::Canned(responses) => {
                let idx = self.index.fetch_add(1, Ordering::Relaxed) % responses.len();
                responses[idx].clone()
            }
            Mode::Echo => request.last_human().unwrap_or_default().to_string(),
            Mode::Fail(status) => {
                return Err(PipelineError::HttpError {
                    status: *status,
                    body: "mock failure".to_string(),
                    retry_after: None,
                })
            }
        };

        Ok(LlmResponse {
            text,
            status: 200,
            metadata: None,
        })
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
