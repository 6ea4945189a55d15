//! Conversation templates: role-tagged message templates plus history slots.

use crate::{
    backend::{ChatMessage, Role},
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    prompt::PromptTemplate,
    step::{describe, BoxFut, Step, StepOutput},
    PipelineError,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum MessageTemplate {
    Message { role: Role, template: PromptTemplate },
    Placeholder { variable: String, optional: bool },
}

/// An ordered list of message templates rendered into a conversation.
///
/// # Example
///
/// ```
/// use llm_runnables::ChatPromptTemplate;
/// use serde_json::json;
///
/// let prompt = ChatPromptTemplate::new()
///     .system("You are a helpful assistant knowledgeable about {technology}.")
///     .human("Explain the impact of {technology} in the {sector} sector.");
///
/// let bindings = json!({"technology": "AI", "sector": "healthcare"});
/// let messages = prompt.format_messages(bindings.as_object().unwrap()).unwrap();
/// assert_eq!(messages[1].content, "Explain the impact of AI in the healthcare sector.");
/// ```
#[derive(Debug, Clone)]
pub struct ChatPromptTemplate {
    name: String,
    messages: Vec<MessageTemplate>,
}

impl Default for ChatPromptTemplate {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatPromptTemplate {
    pub fn new() -> Self {
        Self {
            name: "chat-prompt".to_string(),
            messages: Vec::new(),
        }
    }

    /// Set the instance name used in logs and events.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a message template with an explicit role.
    pub fn message(mut self, role: Role, template: impl Into<String>) -> Self {
        self.messages.push(MessageTemplate::Message {
            role,
            template: PromptTemplate::new(template),
        });
        self
    }

    pub fn system(self, template: impl Into<String>) -> Self {
        self.message(Role::System, template)
    }

    pub fn human(self, template: impl Into<String>) -> Self {
        self.message(Role::Human, template)
    }

    pub fn assistant(self, template: impl Into<String>) -> Self {
        self.message(Role::Assistant, template)
    }

    /// Insert the message list bound to `variable` at this position.
    pub fn placeholder(mut self, variable: impl Into<String>) -> Self {
        self.messages.push(MessageTemplate::Placeholder {
            variable: variable.into(),
            optional: false,
        });
        self
    }

    /// Like [`placeholder`](Self::placeholder), but expands to nothing when
    /// the variable is unbound.
    pub fn optional_placeholder(mut self, variable: impl Into<String>) -> Self {
        self.messages.push(MessageTemplate::Placeholder {
            variable: variable.into(),
            optional: true,
        });
        self
    }

    /// All variable names across message templates and placeholders.
    pub fn input_variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for message in &self.messages {
            let found: Vec<&str> = match message {
                MessageTemplate::Message { template, .. } => template.input_variables(),
                MessageTemplate::Placeholder { variable, .. } => vec![variable.as_str()],
            };
            for name in found {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Render every message with the given bindings.
    pub fn format_messages(&self, bindings: &Map<String, Value>) -> Result<Vec<ChatMessage>> {
        self.format_with(bindings, &HashMap::new())
    }

    fn format_with(
        &self,
        bindings: &Map<String, Value>,
        fallback: &HashMap<String, String>,
    ) -> Result<Vec<ChatMessage>> {
        let mut out = Vec::with_capacity(self.messages.len());
        for message in &self.messages {
            match message {
                MessageTemplate::Message { role, template } => out.push(ChatMessage {
                    role: *role,
                    content: template.render_with(bindings, fallback)?,
                }),
                MessageTemplate::Placeholder { variable, optional } => {
                    match bindings.get(variable) {
                        Some(Value::Null) | None if *optional => {}
                        None => {
                            return Err(PipelineError::MissingVariable {
                                name: variable.clone(),
                            })
                        }
                        Some(value) => {
                            let history: Vec<ChatMessage> = serde_json::from_value(value.clone())
                                .map_err(|_| PipelineError::InvalidInput {
                                    step: self.name.clone(),
                                    expected: "a message list",
                                    found: describe(value),
                                })?;
                            out.extend(history);
                        }
                    }
                }
            }
        }
        Ok(out)
    }
}

impl Step for ChatPromptTemplate {
    fn kind(&self) -> &'static str {
        "chat-prompt"
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
            let bindings = match input {
                Value::Object(map) => Ok(map),
                Value::Null => Ok(Map::new()),
                other => Err(PipelineError::InvalidInput {
                    step: self.name.clone(),
                    expected: "a mapping of template variables",
                    found: describe(&other),
                }),
            };
            let result = bindings
                .and_then(|b| self.format_with(&b, &ctx.vars))
                .and_then(|messages| Ok(serde_json::to_value(messages)?));
            emit(
                &ctx.event_handler,
                Event::StepEnd {
                    name: self.name.clone(),
                    ok: result.is_ok(),
                },
            );
            result.map(StepOutput::from_value)
        })
    }
}
