//! Passthrough parser: the model's text, untouched.

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::output_parser::{invoke_parser, OutputParser};
use crate::step::{BoxFut, Step, StepOutput};
use serde_json::Value;

/// Returns the raw text unchanged. No trimming, no think-tag stripping.
///
/// # Examples
///
/// ```
/// use llm_runnables::output_parser::{OutputParser, StrOutputParser};
///
/// let parsed = StrOutputParser::new().parse("  Paris is the capital.\n").unwrap();
/// assert_eq!(parsed, "  Paris is the capital.\n");
/// ```
#[derive(Debug, Clone)]
pub struct StrOutputParser {
    name: String,
}

impl Default for StrOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StrOutputParser {
    pub fn new() -> Self {
        Self {
            name: "str-parser".to_string(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl OutputParser for StrOutputParser {
    fn parse(&self, raw: &str) -> Result<Value> {
        Ok(Value::String(raw.to_string()))
    }
}

impl Step for StrOutputParser {
    fn kind(&self) -> &'static str {
        "str-parser"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<StepOutput>> {
        Box::pin(async move { invoke_parser(self, &self.name, self.kind(), ctx, input) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity() {
        let p = StrOutputParser::new();
        for raw in ["", "plain", "<think>x</think>kept", "```json\n{}\n```"] {
            assert_eq!(p.parse(raw).unwrap(), json!(raw));
        }
        assert!(p.format_instructions().is_empty());
    }

    #[tokio::test]
    async fn test_step_accepts_message_object() {
        let ctx = ExecCtx::default();
        let out = StrOutputParser::new()
            .invoke(&ctx, json!({"role": "assistant", "content": "Hello"}))
            .await
            .unwrap();
        assert_eq!(out.value, json!("Hello"));
        assert_eq!(out.raw_response, "Hello");
    }

    #[tokio::test]
    async fn test_step_rejects_number() {
        let ctx = ExecCtx::default();
        assert!(StrOutputParser::new().invoke(&ctx, json!(5)).await.is_err());
    }
}
