//! Schema-validated parsing.

use crate::error::Result;
use crate::exec_ctx::ExecCtx;
use crate::output_parser::json::parse_strict;
use crate::output_parser::{invoke_parser, OutputParser};
use crate::schema::Schema;
use crate::step::{BoxFut, Step, StepOutput};
use serde_json::Value;

/// Parses JSON and validates it against a [`Schema`].
///
/// Syntax errors surface as [`PipelineError::Parse`](crate::PipelineError::Parse);
/// shape errors as [`PipelineError::SchemaValidation`](crate::PipelineError::SchemaValidation).
///
/// ```
/// use llm_runnables::output_parser::{OutputParser, SchemaOutputParser};
/// use llm_runnables::schema::{Field, FieldType, Schema};
///
/// let schema = Schema::new("Review")
///     .field(Field::new("pros", FieldType::StringList, "good points"))
///     .field(Field::new("cons", FieldType::StringList, "bad points"));
/// let parser = SchemaOutputParser::new(schema);
///
/// let review = parser.parse(r#"{"pros": ["battery"], "cons": []}"#).unwrap();
/// assert_eq!(review["pros"][0], "battery");
/// assert!(parser.parse(r#"{"pros": ["battery"]}"#).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SchemaOutputParser {
    name: String,
    schema: Schema,
}

impl SchemaOutputParser {
    pub fn new(schema: Schema) -> Self {
        Self {
            name: format!("{}-parser", schema.name()),
            schema,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl OutputParser for SchemaOutputParser {
    fn parse(&self, raw: &str) -> Result<Value> {
        let value = parse_strict(raw)?;
        self.schema.validate(&value)
    }

    fn format_instructions(&self) -> String {
        self.schema.format_instructions()
    }
}

impl Step for SchemaOutputParser {
    fn kind(&self) -> &'static str {
        "schema-parser"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<StepOutput>> {
        Box::pin(async move { invoke_parser(self, &self.name, self.kind(), ctx, input) })
    }
}
