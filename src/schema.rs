//! Declared output schemas for structured model responses.
//!
//! A [`Schema`] is a named, ordered set of typed fields. It validates (and
//! lightly coerces) parsed JSON, and renders the format instructions that
//! are embedded into prompts so the model answers in that shape.

use crate::error::{PipelineError, Result};
use serde_json::{json, Map, Number, Value};

/// The type of a single schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    /// A JSON string.
    String,
    /// A whole number. Integral floats and numeric strings are coerced.
    Integer,
    /// Any JSON number. Numeric strings are coerced.
    Number,
    /// `true` / `false`. The strings `"true"` and `"false"` are coerced.
    Boolean,
    /// A string restricted to one of the given literals.
    Enum(Vec<String>),
    /// An array of strings.
    StringList,
}

impl FieldType {
    /// Build an enum type from string literals.
    pub fn one_of<I, S>(literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldType::Enum(literals.into_iter().map(Into::into).collect())
    }

    fn json_type(&self) -> &'static str {
        match self {
            FieldType::String | FieldType::Enum(_) => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::StringList => "array",
        }
    }
}

/// A named, described, typed field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub description: String,
    pub required: bool,
}

impl Field {
    /// A required field.
    pub fn new(name: impl Into<String>, ty: FieldType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            required: true,
        }
    }

    /// Mark the field optional: it may be absent or `null`.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A named set of fields that a structured response must satisfy.
///
/// # Example
///
/// ```
/// use llm_runnables::schema::{Field, FieldType, Schema};
/// use serde_json::json;
///
/// let schema = Schema::new("Person")
///     .field(Field::new("name", FieldType::String, "The name of the person"))
///     .field(Field::new("age", FieldType::Integer, "The age of the person"));
///
/// let person = schema.validate(&json!({"name": "Asha", "age": "31"})).unwrap();
/// assert_eq!(person, json!({"name": "Asha", "age": 31}));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    description: Option<String>,
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a field. A field with the same name replaces the earlier one.
    pub fn field(mut self, field: Field) -> Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Validate a parsed value, returning the coerced object.
    ///
    /// Unknown keys are dropped. Optional fields that are absent stay absent;
    /// an explicit `null` is kept.
    pub fn validate(&self, value: &Value) -> Result<Value> {
        let obj = value
            .as_object()
            .ok_or_else(|| self.invalid(format!("expected a JSON object, got {}", kind_of(value))))?;

        let mut out = Map::new();
        for field in &self.fields {
            match obj.get(&field.name) {
                None | Some(Value::Null) if field.required => {
                    return Err(self.invalid(format!("missing required field '{}'", field.name)));
                }
                None => {}
                Some(Value::Null) => {
                    out.insert(field.name.clone(), Value::Null);
                }
                Some(v) => {
                    let coerced = coerce(&field.ty, v).map_err(|reason| {
                        self.invalid(format!("field '{}' {}", field.name, reason))
                    })?;
                    out.insert(field.name.clone(), coerced);
                }
            }
        }
        Ok(Value::Object(out))
    }

    /// The JSON-schema rendering of this schema.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut prop = json!({
                "type": field.ty.json_type(),
                "description": field.description,
            });
            match &field.ty {
                FieldType::Enum(literals) => prop["enum"] = json!(literals),
                FieldType::StringList => prop["items"] = json!({"type": "string"}),
                _ => {}
            }
            properties.insert(field.name.clone(), prop);
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        let mut schema = json!({
            "title": self.name,
            "type": "object",
            "properties": properties,
            "required": required,
        });
        if let Some(ref description) = self.description {
            schema["description"] = json!(description);
        }
        schema
    }

    /// Instructions that steer a model into answering with this schema.
    pub fn format_instructions(&self) -> String {
        format!(
            "Respond with a single JSON object that conforms to the JSON schema below. \
             Fields listed under \"required\" must be present; optional fields may be omitted. \
             Do not add commentary or markdown around the JSON.\n\n\
             For example, for the schema {{\"properties\": {{\"tags\": {{\"type\": \"array\", \"items\": {{\"type\": \"string\"}}}}}}, \"required\": [\"tags\"]}} \
             the object {{\"tags\": [\"a\", \"b\"]}} is valid, while {{\"properties\": {{\"tags\": [\"a\", \"b\"]}}}} is not.\n\n\
             Output schema:\n```\n{}\n```",
            self.json_schema()
        )
    }

    fn invalid(&self, reason: String) -> PipelineError {
        PipelineError::SchemaValidation {
            schema: self.name.clone(),
            reason,
        }
    }
}

fn coerce(ty: &FieldType, value: &Value) -> std::result::Result<Value, String> {
    let mismatch = || format!("expected {}, got {}", ty.json_type(), kind_of(value));
    match (ty, value) {
        (FieldType::String, Value::String(_)) => Ok(value.clone()),

        (FieldType::Integer, Value::Number(n)) => {
            if n.is_i64() || n.is_u64() {
                return Ok(value.clone());
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Value::from(f as i64)),
                _ => Err(mismatch()),
            }
        }
        (FieldType::Integer, Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| mismatch()),

        (FieldType::Number, Value::Number(_)) => Ok(value.clone()),
        (FieldType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(mismatch),

        (FieldType::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (FieldType::Boolean, Value::String(s)) => match s.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(mismatch()),
        },

        (FieldType::Enum(literals), Value::String(s)) => {
            if literals.iter().any(|l| l == s) {
                Ok(value.clone())
            } else {
                Err(format!("must be one of {:?}, got {:?}", literals, s))
            }
        }

        (FieldType::StringList, Value::Array(items)) => {
            if items.iter().all(Value::is_string) {
                Ok(value.clone())
            } else {
                Err("expected array of strings".to_string())
            }
        }

        _ => Err(mismatch()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_schema() -> Schema {
        Schema::new("Review")
            .field(Field::new(
                "key_themes",
                FieldType::StringList,
                "Key themes discussed in the text",
            ))
            .field(Field::new("summary", FieldType::String, "A concise summary"))
            .field(Field::new(
                "sentiment",
                FieldType::one_of(["positive", "negative", "neutral"]),
                "Overall sentiment",
            ))
            .field(Field::new("pros", FieldType::StringList, "Positive aspects").optional())
            .field(Field::new("name", FieldType::String, "Product name").optional())
    }

    #[test]
    fn valid_value_passes_unchanged() {
        let v = json!({
            "key_themes": ["build quality"],
            "summary": "Great widget",
            "sentiment": "positive",
            "pros": ["fast"],
        });
        assert_eq!(review_schema().validate(&v).unwrap(), v);
    }

    #[test]
    fn missing_required_field() {
        let v = json!({"key_themes": [], "summary": "x"});
        let err = review_schema().validate(&v).unwrap_err();
        match err {
            PipelineError::SchemaValidation { schema, reason } => {
                assert_eq!(schema, "Review");
                assert!(reason.contains("sentiment"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn required_null_is_missing() {
        let v = json!({"key_themes": [], "summary": null, "sentiment": "neutral"});
        assert!(review_schema().validate(&v).is_err());
    }

    #[test]
    fn enum_literal_outside_set() {
        let v = json!({"key_themes": [], "summary": "x", "sentiment": "angry"});
        let err = review_schema().validate(&v).unwrap_err().to_string();
        assert!(err.contains("must be one of"));
    }

    #[test]
    fn optional_null_kept_and_unknown_dropped() {
        let v = json!({
            "key_themes": [],
            "summary": "x",
            "sentiment": "neutral",
            "name": null,
            "extra": 1,
        });
        let out = review_schema().validate(&v).unwrap();
        assert_eq!(out["name"], Value::Null);
        assert!(out.get("extra").is_none());
        assert!(out.get("pros").is_none());
    }

    #[test]
    fn integer_coercion() {
        let schema = Schema::new("P").field(Field::new("age", FieldType::Integer, "Age"));
        assert_eq!(schema.validate(&json!({"age": 30.0})).unwrap()["age"], 30);
        assert_eq!(schema.validate(&json!({"age": " 41 "})).unwrap()["age"], 41);
        assert!(schema.validate(&json!({"age": 30.5})).is_err());
        assert!(schema.validate(&json!({"age": "thirty"})).is_err());
    }

    #[test]
    fn integer_extremes_round_trip() {
        let schema = Schema::new("P").field(Field::new("n", FieldType::Integer, "N"));
        for v in [json!({"n": u64::MAX}), json!({"n": i64::MIN}), json!({"n": i64::MAX})] {
            let text = v.to_string();
            let parsed: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(schema.validate(&parsed).unwrap(), v, "{text}");
        }
    }

    #[test]
    fn list_of_non_strings_rejected() {
        let schema = Schema::new("T").field(Field::new("tags", FieldType::StringList, "Tags"));
        assert!(schema.validate(&json!({"tags": [1, 2]})).is_err());
    }

    #[test]
    fn non_object_rejected() {
        assert!(review_schema().validate(&json!(["a"])).is_err());
    }

    #[test]
    fn json_schema_lists_required_and_enum() {
        let s = review_schema().json_schema();
        assert_eq!(s["required"], json!(["key_themes", "summary", "sentiment"]));
        assert_eq!(
            s["properties"]["sentiment"]["enum"],
            json!(["positive", "negative", "neutral"])
        );
        assert_eq!(s["properties"]["pros"]["items"]["type"], "string");
    }

    #[test]
    fn format_instructions_deterministic_and_descriptive() {
        let a = review_schema().format_instructions();
        let b = review_schema().format_instructions();
        assert_eq!(a, b);
        assert!(a.contains("Overall sentiment"));
        assert!(a.contains("\"key_themes\""));
    }

    #[test]
    fn duplicate_field_replaces() {
        let s = Schema::new("S")
            .field(Field::new("a", FieldType::String, "first"))
            .field(Field::new("a", FieldType::Integer, "second"));
        assert_eq!(s.fields().len(), 1);
        assert_eq!(s.fields()[0].ty, FieldType::Integer);
    }
}
