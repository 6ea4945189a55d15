//! Strict JSON parsing of model responses.
//!
//! Reasoning blocks and a markdown fence wrapping the whole reply are
//! removed first; after that the text must be a single valid JSON document.
//! Malformed JSON is reported, never repaired.

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::output_parser::error::{truncate, ParseError};
use crate::output_parser::extract::preprocess;
use crate::output_parser::{invoke_parser, OutputParser};
use crate::step::{BoxFut, Step, StepOutput};
use serde_json::Value;

/// Parse the preprocessed text as JSON.
pub(crate) fn parse_strict(raw: &str) -> std::result::Result<Value, ParseError> {
    let cleaned = preprocess(raw);
    if cleaned.is_empty() {
        return Err(ParseError::EmptyResponse);
    }
    serde_json::from_str(&cleaned).map_err(|e| ParseError::InvalidJson {
        reason: e.to_string(),
        text: truncate(&cleaned, 200),
    })
}

/// Parses text into a JSON object (a keyed mapping).
///
/// Valid JSON with a scalar or array at the top level is rejected with
/// [`ParseError::NotAnObject`].
///
/// # Examples
///
/// ```
/// use llm_runnables::output_parser::{JsonOutputParser, OutputParser};
///
/// let parser = JsonOutputParser::new();
/// let value = parser
///     .parse("<think>hmm</think>```json\n{\"sentiment\": \"positive\"}\n```")
///     .unwrap();
/// assert_eq!(value["sentiment"], "positive");
/// assert!(parser.parse("not json").is_err());
/// assert!(parser.parse("[1, 2]").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct JsonOutputParser {
    name: String,
}

impl Default for JsonOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonOutputParser {
    pub fn new() -> Self {
        Self {
            name: "json-parser".to_string(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl OutputParser for JsonOutputParser {
    fn parse(&self, raw: &str) -> Result<Value> {
        let value = parse_strict(raw)?;
        let found = match value {
            Value::Object(_) => return Ok(value),
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
        };
        Err(ParseError::NotAnObject { found }.into())
    }

    fn format_instructions(&self) -> String {
        "Return only a valid JSON object, with no commentary before or after it.".to_string()
    }
}

impl Step for JsonOutputParser {
    fn kind(&self) -> &'static str {
        "json-parser"
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
    use crate::PipelineError;
    use serde_json::json;

    #[test]
    fn test_scalar_and_array_rejected() {
        let p = JsonOutputParser::new();
        assert!(matches!(
            p.parse("42"),
            Err(PipelineError::Parse(ParseError::NotAnObject { found: "number" }))
        ));
        assert!(matches!(
            p.parse(" [1, \"a\"] "),
            Err(PipelineError::Parse(ParseError::NotAnObject { found: "array" }))
        ));
        assert_eq!(p.parse(" {\"a\": [1]} ").unwrap(), json!({"a": [1]}));
    }

    #[test]
    fn test_object_with_think_block() {
        let p = JsonOutputParser::new();
        let v = p
            .parse("<thinking>plan</thinking>\n{\"pros\": [\"fast\"], \"cons\": []}")
            .unwrap();
        assert_eq!(v, json!({"pros": ["fast"], "cons": []}));
    }

    #[test]
    fn test_empty_response() {
        let err = JsonOutputParser::new().parse("<think>only</think>  ").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Parse(ParseError::EmptyResponse)
        ));
    }

    #[test]
    fn test_no_repair() {
        let p = JsonOutputParser::new();
        assert!(matches!(
            p.parse("{\"a\": 1,}"),
            Err(PipelineError::Parse(ParseError::InvalidJson { .. }))
        ));
        // JSON surrounded by prose is not dug out.
        assert!(p.parse("Here you go: {\"a\": 1}").is_err());
    }

    #[tokio::test]
    async fn test_step_keeps_raw_response() {
        let ctx = ExecCtx::default();
        let out = JsonOutputParser::new()
            .invoke(&ctx, json!("```json\n{\"ok\": true}\n```"))
            .await
            .unwrap();
        assert_eq!(out.value, json!({"ok": true}));
        assert!(out.raw_response.starts_with("```json"));
    }
}
