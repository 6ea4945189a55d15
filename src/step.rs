//! Core step trait and output type.
//!
//! Every runnable in this crate (templates, chat models, parsers, and the
//! composers built from them) implements [`Step`]. A step takes a
//! `serde_json::Value` input and returns a [`StepOutput`]. The `Value` wire
//! type lets text, mappings and message lists flow through one interface:
//!
//! | Payload | Representation |
//! |---------|----------------|
//! | text | `Value::String` |
//! | mapping | `Value::Object` |
//! | message list | `Value::Array` of `{"role", "content"}` objects |
//! | structured value | the validated `Value::Object` |

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::PipelineError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// A boxed, pinned, Send future -- the return type of [`Step::invoke`].
pub type BoxFut<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe trait for a single-input, single-output transformation.
///
/// The trait is object-safe so steps can be stored as `Box<dyn Step>` and
/// nested freely: a composed pipeline is itself a step.
pub trait Step: Send + Sync {
    /// Stable identifier for the step type (e.g. `"prompt"`, `"chain"`).
    fn kind(&self) -> &'static str;

    /// Instance name (for logging/debugging/events).
    fn name(&self) -> &str;

    /// Execute the step.
    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<StepOutput>>;
}

impl<S: Step + ?Sized> Step for Box<S> {
    fn kind(&self) -> &'static str {
        (**self).kind()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<StepOutput>> {
        (**self).invoke(ctx, input)
    }
}

/// Output from a step invocation.
#[derive(Debug, Clone)]
pub struct StepOutput {
    /// The value handed to the next step.
    pub value: Value,
    /// Raw response text from the model, or the serialized value for
    /// steps that never talk to a model.
    pub raw_response: String,
    /// Model that produced this output (if applicable).
    pub model: Option<String>,
    /// Provider-specific metadata (token usage, response id).
    pub metadata: Option<Value>,
}

impl StepOutput {
    /// Create an output wrapping a pre-existing `Value`.
    pub fn from_value(value: Value) -> Self {
        let raw_response = match &value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            value,
            raw_response,
            model: None,
            metadata: None,
        }
    }

    /// The value as text, if it is a string.
    pub fn text(&self) -> Option<&str> {
        self.value.as_str()
    }

    /// Parse the output value into a typed `T`.
    ///
    /// ```ignore
    /// let output = chain.invoke(&ctx, input).await?;
    /// let person: Person = output.parse_as()?;
    /// ```
    pub fn parse_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone()).map_err(|e| {
            let snippet = crate::output_parser::error::truncate(&self.value.to_string(), 200);
            PipelineError::Other(format!(
                "Failed to parse StepOutput into target type: {}. Value (truncated): {}",
                e, snippet
            ))
        })
    }
}

/// Run a step to completion from synchronous code.
///
/// Builds a current-thread runtime for the call. Called from inside a tokio
/// runtime it fails with [`PipelineError::InvalidConfig`]; await
/// [`Step::invoke`] there instead.
pub fn invoke_blocking(step: &dyn Step, ctx: &ExecCtx, input: Value) -> Result<StepOutput> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(PipelineError::InvalidConfig(format!(
            "invoke_blocking('{}') called from inside an async runtime",
            step.name()
        )));
    }
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(step.invoke(ctx, input))
}

/// Describe a value's shape for error messages.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "text".to_string(),
        Value::Array(items) => format!("array of {}", items.len()),
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("mapping with keys {:?}", keys)
        }
    }
}
