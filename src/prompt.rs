//! Prompt templates with named `{placeholder}` variables.
//!
//! A template is parsed once into literal and placeholder segments. Use `{{`
//! to insert a literal `{` and `}}` to insert a literal `}`. A brace that does
//! not open a well-formed `{identifier}` is kept as literal text.
//!
//! Variables are looked up in the invocation bindings first, then in the
//! template's partial variables, then in [`ExecCtx::vars`](crate::ExecCtx).
//! Extra bindings are ignored unless the template is [`strict`](PromptTemplate::strict).

use crate::{
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    step::{describe, BoxFut, Step, StepOutput},
    PipelineError,
};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Var(String),
}

/// A parameterized text pattern.
///
/// # Example
///
/// ```
/// use llm_runnables::PromptTemplate;
/// use serde_json::json;
///
/// let prompt = PromptTemplate::new("Write a topic on {topic} in a {style} style.");
/// assert_eq!(prompt.input_variables(), ["topic", "style"]);
///
/// let text = prompt
///     .render(json!({"topic": "AI in health", "style": "normal"}).as_object().unwrap())
///     .unwrap();
/// assert_eq!(text, "Write a topic on AI in health in a normal style.");
/// ```
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    template: String,
    segments: Vec<Segment>,
    variables: Vec<String>,
    partials: BTreeMap<String, String>,
    strict: bool,
}

impl PromptTemplate {
    /// Parse a template, inferring its variables from the placeholders.
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let segments = parse_segments(&template);
        let mut variables: Vec<String> = Vec::new();
        for segment in &segments {
            if let Segment::Var(name) = segment {
                if !variables.contains(name) {
                    variables.push(name.clone());
                }
            }
        }
        Self {
            name: "prompt".to_string(),
            template,
            segments,
            variables,
            partials: BTreeMap::new(),
            strict: false,
        }
    }

    /// Parse a template and check it against a declared variable list.
    ///
    /// Fails with `InvalidConfig` unless the declared names and the
    /// placeholders are the same set.
    pub fn with_variables<I, S>(template: impl Into<String>, declared: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prompt = Self::new(template);
        let declared: Vec<String> = declared.into_iter().map(Into::into).collect();

        if let Some(missing) = prompt.variables.iter().find(|v| !declared.contains(v)) {
            return Err(PipelineError::InvalidConfig(format!(
                "placeholder '{{{}}}' is not a declared variable",
                missing
            )));
        }
        if let Some(unused) = declared.iter().find(|d| !prompt.variables.contains(d)) {
            return Err(PipelineError::InvalidConfig(format!(
                "declared variable '{}' does not appear in the template",
                unused
            )));
        }
        Ok(prompt)
    }

    /// Set the instance name used in logs and events.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Pre-bind a variable, e.g. a parser's format instructions.
    pub fn partial(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.partials.insert(key.into(), value.into());
        self
    }

    /// Fail with `UnusedVariable` when bindings contain names the template
    /// does not reference.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Every placeholder name, in order of first appearance.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Placeholder names that are not covered by partial variables; these
    /// must come from the caller.
    pub fn input_variables(&self) -> Vec<&str> {
        self.variables
            .iter()
            .filter(|v| !self.partials.contains_key(*v))
            .map(String::as_str)
            .collect()
    }

    /// Render with the given bindings only.
    pub fn render(&self, bindings: &Map<String, Value>) -> Result<String> {
        self.render_with(bindings, &HashMap::new())
    }

    /// Render with bindings, falling back to `fallback` for unbound names.
    pub fn render_with(
        &self,
        bindings: &Map<String, Value>,
        fallback: &HashMap<String, String>,
    ) -> Result<String> {
        if self.strict {
            if let Some(extra) = bindings.keys().find(|k| !self.variables.contains(*k)) {
                return Err(PipelineError::UnusedVariable {
                    name: extra.clone(),
                });
            }
        }

        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Var(name) => {
                    if let Some(value) = bindings.get(name) {
                        out.push_str(&value_to_text(value));
                    } else if let Some(value) = self.partials.get(name) {
                        out.push_str(value);
                    } else if let Some(value) = fallback.get(name) {
                        out.push_str(value);
                    } else {
                        return Err(PipelineError::MissingVariable { name: name.clone() });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Turn a step input into a binding map.
    ///
    /// Objects bind directly. Text binds to the single caller-supplied
    /// variable when there is exactly one; `null` binds nothing.
    pub(crate) fn bindings_from(&self, input: Value) -> Result<Map<String, Value>> {
        match input {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => match self.input_variables().as_slice() {
                [only] => {
                    let mut map = Map::new();
                    map.insert(only.to_string(), other);
                    Ok(map)
                }
                _ => Err(PipelineError::InvalidInput {
                    step: self.name.clone(),
                    expected: "a mapping of template variables",
                    found: describe(&other),
                }),
            },
        }
    }
}

/// Text rendering of a bound value: strings verbatim, everything else as
/// compact JSON.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_segments(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(ch) = rest.chars().next() {
        if rest.starts_with("{{") {
            literal.push('{');
            rest = &rest[2..];
        } else if rest.starts_with("}}") {
            literal.push('}');
            rest = &rest[2..];
        } else if ch == '{' {
            match placeholder_len(&rest[1..]) {
                Some(len) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Var(rest[1..1 + len].to_string()));
                    rest = &rest[len + 2..];
                }
                None => {
                    literal.push('{');
                    rest = &rest[1..];
                }
            }
        } else {
            literal.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// Length of the identifier in `text` if it is immediately followed by `}`.
fn placeholder_len(text: &str) -> Option<usize> {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return None,
    }
    for (idx, c) in chars {
        if c == '}' {
            return Some(idx);
        }
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
    }
    None
}

impl Step for PromptTemplate {
    fn kind(&self) -> &'static str {
        "prompt"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<StepOutput>> {
        Box::pin(async move {
            emit(
                &ctx.event_handler,
                Event::StepStart {
                    name: self.name.clone(),
                    kind: self.kind(),
                },
            );
            let result = self
                .bindings_from(input)
                .and_then(|bindings| self.render_with(&bindings, &ctx.vars));
            emit(
                &ctx.event_handler,
                Event::StepEnd {
                    name: self.name.clone(),
                    ok: result.is_ok(),
                },
            );
            result.map(|text| StepOutput::from_value(Value::String(text)))
        })
    }
}
