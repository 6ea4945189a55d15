//! # Output Parsers
//!
//! Steps that turn raw model text into the value handed downstream.
//!
//! | Parser | Output |
//! |--------|--------|
//! | [`StrOutputParser`] | the text unchanged |
//! | [`JsonOutputParser`] | a JSON object, parsed strictly |
//! | [`SchemaOutputParser`] | a JSON object validated against a [`Schema`](crate::Schema) |
//!
//! Every parser accepts either text or a chat-model-style object carrying a
//! string `content` field, so it can sit directly after a model step or
//! after a step that forwards the model's message.
//!
//! ## Shared Utilities
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`strip_think_tags`] | Remove `<think>` blocks from text |
//! | [`preprocess`] | Strip reasoning blocks and a wrapping markdown fence |

pub mod error;
pub mod extract;
pub mod json;
pub mod structured;
pub mod text;

pub use error::ParseError;
pub use extract::{preprocess, strip_think_tags};
pub use json::JsonOutputParser;
pub use structured::SchemaOutputParser;
pub use text::StrOutputParser;

use crate::error::Result;
use crate::events::{emit, Event};
use crate::exec_ctx::ExecCtx;
use crate::step::{describe, StepOutput};
use crate::PipelineError;
use serde_json::Value;

/// Converts raw model text into a structured value.
pub trait OutputParser: Send + Sync {
    /// Parse one raw response.
    fn parse(&self, raw: &str) -> Result<Value>;

    /// Text to append to a prompt so the model answers in a parsable shape.
    /// Empty when the parser accepts anything.
    fn format_instructions(&self) -> String {
        String::new()
    }
}

/// Pull the raw text out of a parser step's input.
fn raw_text(step: &str, input: &Value) -> Result<String> {
    match input {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => match map.get("content") {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(PipelineError::InvalidInput {
                step: step.to_string(),
                expected: "text or an object with a string `content`",
                found: describe(input),
            }),
        },
        other => Err(PipelineError::InvalidInput {
            step: step.to_string(),
            expected: "text or an object with a string `content`",
            found: describe(other),
        }),
    }
}

/// Shared body of every parser's [`Step::invoke`](crate::Step::invoke).
pub(crate) fn invoke_parser(
    parser: &dyn OutputParser,
    name: &str,
    kind: &'static str,
    ctx: &ExecCtx,
    input: Value,
) -> Result<StepOutput> {
    emit(
        &ctx.event_handler,
        Event::StepStart {
            name: name.to_string(),
            kind,
        },
    );

    let result = raw_text(name, &input).and_then(|raw| {
        let value = parser.parse(&raw)?;
        Ok(StepOutput {
            value,
            raw_response: raw,
            model: None,
            metadata: None,
        })
    });

    if let Err(ref e) = result {
        tracing::warn!(step = name, error = %e, "output parsing failed");
    }
    emit(
        &ctx.event_handler,
        Event::StepEnd {
            name: name.to_string(),
            ok: result.is_ok(),
        },
    );
    result
}
