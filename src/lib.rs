//! # LLM Runnables
//!
//! Composable steps for LLM applications: prompt templates, chat models
//! backed by Groq or Gemini, output parsers, and combinators that wire them
//! into sequential, parallel and branching pipelines.
//!
//! ## Core Concepts
//!
//! - **[`Step`]**: object-safe trait implemented by everything below. Takes a
//!   `serde_json::Value` input, returns a [`StepOutput`]. A composed pipeline
//!   is itself a step, so composers nest freely.
//! - **[`ExecCtx`]**: shared execution context (HTTP client, transport
//!   backoff, fallback template variables, cancellation, event handler).
//! - **[`PromptTemplate`]** / **[`ChatPromptTemplate`]**: render a mapping
//!   into prompt text or a message list.
//! - **[`ChatModel`]**: sends text or messages to a [`backend::Backend`]
//!   ([`OpenAiBackend`] for Groq, [`GeminiBackend`], [`MockBackend`]).
//! - **Parsers**: [`StrOutputParser`], [`JsonOutputParser`],
//!   [`SchemaOutputParser`] with a [`Schema`].
//! - **Composers**: [`Chain`] (sequential), [`Parallel`] (fan-out into a
//!   keyed mapping), [`Branch`] (first matching predicate wins).
//!
//! Values flowing between steps follow one convention: text is a JSON
//! string, a mapping is a JSON object, and a message list is an array of
//! `{"role", "content"}` objects.
//!
//! ## Quick Start
//!
//! ```
//! use llm_runnables::backend::MockBackend;
//! use llm_runnables::{Chain, ChatModel, ExecCtx, PromptTemplate, StrOutputParser};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! // An echoing mock stands in for Groq or Gemini here.
//! let model = ChatModel::new("model", Arc::new(MockBackend::echo()));
//!
//! let chain = Chain::new("report")
//!     .then(PromptTemplate::new("Summarize the following {topic} topic"))
//!     .then(model.clone())
//!     .then(StrOutputParser::new())
//!     .then(PromptTemplate::new("Write down 5 lines summary on the following {text} text"))
//!     .then(model)
//!     .then(StrOutputParser::new());
//!
//! let ctx = ExecCtx::default();
//! let out = chain.execute(&ctx, json!({"topic": "Black Holes"})).await.unwrap();
//! assert_eq!(
//!     out.value,
//!     "Write down 5 lines summary on the following Summarize the following Black Holes topic text"
//! );
//! # });
//! ```
//!
//! Against a real provider, build the backend from the environment:
//!
//! ```no_run
//! use llm_runnables::{ChatModel, Settings};
//! use std::sync::Arc;
//!
//! # fn main() -> llm_runnables::Result<()> {
//! let settings = Settings::from_env()?;
//! let groq = ChatModel::new("groq", Arc::new(settings.groq_backend()?));
//! let gemini = ChatModel::new("gemini", Arc::new(settings.gemini_backend()?));
//! let ctx = settings.exec_ctx();
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod branch;
pub mod chain;
pub mod chat_model;
pub mod chat_prompt;
pub mod config;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod loader;
pub mod logging;
pub mod output_parser;
pub mod parallel;
pub mod passthrough;
pub mod prompt;
pub mod schema;
pub mod step;

pub use backend::{
    BackoffConfig, ChatMessage, GeminiBackend, LlmConfig, MockBackend, OpenAiBackend, Role,
};
pub use branch::Branch;
pub use chain::Chain;
pub use chat_model::ChatModel;
pub use chat_prompt::ChatPromptTemplate;
pub use config::Settings;
pub use error::{PipelineError, Result};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use loader::{Document, Loader, TextLoader, WebLoader};
pub use output_parser::{
    JsonOutputParser, OutputParser, ParseError, SchemaOutputParser, StrOutputParser,
};
pub use parallel::Parallel;
pub use passthrough::{Lambda, Passthrough};
pub use prompt::PromptTemplate;
pub use schema::{Field, FieldType, Schema};
pub use step::{invoke_blocking, BoxFut, Step, StepOutput};
