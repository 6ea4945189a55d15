//! Chat model step: one provider round trip per invocation.
//!
//! [`ChatModel`] turns its input (text or a message list) into an
//! [`LlmRequest`], sends it through its [`Backend`] under the context's
//! transport retry policy, and returns the reply text. With
//! [`with_structured_output`](ChatModel::with_structured_output) it instead
//! returns an object validated against a [`Schema`].

use crate::{
    backend::{with_backoff, Backend, ChatMessage, LlmConfig, LlmRequest, Role},
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    output_parser::json::parse_strict,
    schema::Schema,
    step::{describe, BoxFut, Step, StepOutput},
    PipelineError,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// A model invocation step bound to one provider backend.
///
/// # Example
///
/// ```no_run
/// use llm_runnables::backend::OpenAiBackend;
/// use llm_runnables::{ChatModel, ExecCtx, Step};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn run() -> llm_runnables::Result<()> {
/// let model = ChatModel::new("groq", Arc::new(OpenAiBackend::groq("gsk_...")))
///     .with_model("llama-3.1-8b-instant");
///
/// let ctx = ExecCtx::default();
/// let reply = model.invoke(&ctx, json!("Who is the founder of Bangladesh?")).await?;
/// println!("{}", reply.value);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChatModel {
    name: String,
    backend: Arc<dyn Backend>,
    model: Option<String>,
    system: Option<String>,
    config: LlmConfig,
    structured: Option<Schema>,
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("name", &self.name)
            .field("backend", &self.backend.name())
            .field("model", &self.model())
            .field("config", &self.config)
            .field("structured", &self.structured.as_ref().map(Schema::name))
            .finish()
    }
}

impl ChatModel {
    pub fn new(name: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        Self {
            name: name.into(),
            backend,
            model: None,
            system: None,
            config: LlmConfig::default(),
            structured: None,
        }
    }

    /// Override the backend's default model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Prepend a fixed system message to every request.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    /// Return an object validated against `schema` instead of text.
    ///
    /// The schema's format instructions are appended as a system message and
    /// the provider's JSON mode is switched on. A reply that is not valid
    /// JSON, or does not fit the schema, fails with
    /// [`PipelineError::SchemaValidation`].
    pub fn with_structured_output(mut self, schema: Schema) -> Self {
        self.structured = Some(schema);
        self
    }

    /// The model identifier requests are sent with.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.backend.default_model())
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn messages_from_input(&self, input: Value) -> Result<Vec<ChatMessage>> {
        match input {
            Value::String(text) => Ok(vec![ChatMessage::human(text)]),
            Value::Array(_) => serde_json::from_value(input.clone()).map_err(|_| {
                PipelineError::InvalidInput {
                    step: self.name.clone(),
                    expected: "text or a message list",
                    found: describe(&input),
                }
            }),
            other => Err(PipelineError::InvalidInput {
                step: self.name.clone(),
                expected: "text or a message list",
                found: describe(&other),
            }),
        }
    }

    fn build_request(&self, conversation: Vec<ChatMessage>) -> LlmRequest {
        let mut messages = Vec::with_capacity(conversation.len() + 2);
        if let Some(ref system) = self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(conversation);

        let mut config = self.config.clone();
        if let Some(ref schema) = self.structured {
            messages.push(ChatMessage {
                role: Role::System,
                content: schema.format_instructions(),
            });
            config.json_mode = true;
        }

        LlmRequest {
            model: self.model().to_string(),
            messages,
            config,
        }
    }

    fn build_value(&self, text: &str) -> Result<Value> {
        match self.structured {
            None => Ok(Value::String(text.to_string())),
            Some(ref schema) => {
                let parsed = parse_strict(text).map_err(|e| PipelineError::SchemaValidation {
                    schema: schema.name().to_string(),
                    reason: e.to_string(),
                })?;
                schema.validate(&parsed)
            }
        }
    }

    async fn run(&self, ctx: &ExecCtx, input: Value) -> Result<StepOutput> {
        let request = self.build_request(self.messages_from_input(input)?);

        let name = self.name.clone();
        let event_handler = ctx.event_handler.clone();
        let on_retry = move |attempt: u32, delay: std::time::Duration, reason: &str| {
            emit(
                &event_handler,
                Event::TransportRetry {
                    name: name.clone(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    reason: reason.to_string(),
                },
            );
        };

        let started = Instant::now();
        let response = with_backoff(
            self.backend.as_ref(),
            &ctx.client,
            &request,
            &ctx.backoff,
            ctx.cancellation.as_deref(),
            on_retry,
        )
        .await?;

        tracing::debug!(
            step = %self.name,
            backend = self.backend.name(),
            model = %request.model,
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model call complete"
        );

        let value = self.build_value(&response.text)?;
        Ok(StepOutput {
            value,
            raw_response: response.text,
            model: Some(request.model),
            metadata: response.metadata,
        })
    }
}

impl Step for ChatModel {
    fn kind(&self) -> &'static str {
        "chat-model"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(&'a self, ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<StepOutput>> {
        Box::pin(async move {
            ctx.check_cancelled()?;
            emit(
                &ctx.event_handler,
                Event::StepStart {
                    name: self.name.clone(),
                    kind: self.kind(),
                },
            );

            let result = self.run(ctx, input).await;
            if let Err(ref e) = result {
                tracing::warn!(
                    step = %self.name,
                    backend = self.backend.name(),
                    error = %e,
                    "model call failed"
                );
            }

            emit(
                &ctx.event_handler,
                Event::StepEnd {
                    name: self.name.clone(),
                    ok: result.is_ok(),
                },
            );
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackoffConfig, MockBackend};
    use crate::events::testing::Recorder;
    use crate::schema::{Field, FieldType};
    use serde_json::json;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn review_schema() -> Schema {
        Schema::new("Review")
            .field(Field::new("pros", FieldType::StringList, "good points"))
            .field(Field::new("cons", FieldType::StringList, "bad points"))
    }

    #[tokio::test]
    async fn test_text_input_becomes_human_message() {
        let mock = Arc::new(MockBackend::fixed("Sheikh Mujibur Rahman"));
        let model = ChatModel::new("m", mock.clone()).with_system("Answer briefly.");
        let ctx = ExecCtx::default();

        let out = model.invoke(&ctx, json!("Who?")).await.unwrap();
        assert_eq!(out.value, json!("Sheikh Mujibur Rahman"));
        assert_eq!(out.model.as_deref(), Some("mock-model"));

        let requests = mock.requests();
        let sent = &requests[0];
        assert_eq!(sent.messages[0], ChatMessage::system("Answer briefly."));
        assert_eq!(sent.messages[1], ChatMessage::human("Who?"));
        assert!(!sent.config.json_mode);
    }

    #[tokio::test]
    async fn test_message_list_input() {
        let mock = Arc::new(MockBackend::echo());
        let model = ChatModel::new("m", mock.clone()).with_model("custom");
        let ctx = ExecCtx::default();
        let input = json!([
            {"role": "system", "content": "You know AI."},
            {"role": "human", "content": "Impact on health?"}
        ]);

        let out = model.invoke(&ctx, input).await.unwrap();
        assert_eq!(out.value, json!("Impact on health?"));
        assert_eq!(mock.requests()[0].model, "custom");
        assert_eq!(mock.requests()[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_mapping_input() {
        let model = ChatModel::new("m", Arc::new(MockBackend::echo()));
        let err = model
            .invoke(&ExecCtx::default(), json!({"topic": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_structured_output_validated() {
        let mock = Arc::new(MockBackend::fixed(
            "```json\n{\"pros\": [\"battery\"], \"cons\": [\"price\"], \"x\": 1}\n```",
        ));
        let model = ChatModel::new("m", mock.clone()).with_structured_output(review_schema());

        let out = model
            .invoke(&ExecCtx::default(), json!("Review this phone"))
            .await
            .unwrap();
        assert_eq!(out.value, json!({"pros": ["battery"], "cons": ["price"]}));

        let requests = mock.requests();
        let sent = &requests[0];
        assert!(sent.config.json_mode);
        let last = sent.messages.last().unwrap();
        assert_eq!(last.role, Role::System);
        assert!(last.content.contains("\"Review\""));
    }

    #[tokio::test]
    async fn test_structured_output_failures() {
        for reply in ["the phone is great", r#"{"pros": "battery"}"#] {
            let model = ChatModel::new("m", Arc::new(MockBackend::fixed(reply)))
                .with_structured_output(review_schema());
            let err = model
                .invoke(&ExecCtx::default(), json!("Review"))
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::SchemaValidation { .. }), "{reply}");
        }
    }

    #[tokio::test]
    async fn test_transport_retries_emit_events() {
        let mock = Arc::new(MockBackend::failing(503));
        let model = ChatModel::new("m", mock.clone());
        let recorder = Arc::new(Recorder::default());
        let ctx = ExecCtx::builder()
            .backoff(BackoffConfig {
                max_retries: 2,
                initial_delay: Duration::from_millis(1),
                jitter: false,
                ..BackoffConfig::standard()
            })
            .event_handler(recorder.clone())
            .build();

        let err = model.invoke(&ctx, json!("hi")).await.unwrap_err();
        assert!(matches!(err, PipelineError::HttpError { status: 503, .. }));
        assert_eq!(mock.call_count(), 3);

        let retries = recorder
            .events()
            .iter()
            .filter(|e| matches!(e, Event::TransportRetry { .. }))
            .count();
        assert_eq!(retries, 2);
        assert!(matches!(
            recorder.events().last(),
            Some(Event::StepEnd { ok: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let mock = Arc::new(MockBackend::echo());
        let model = ChatModel::new("m", mock.clone());
        let ctx = ExecCtx::builder()
            .cancellation(Some(Arc::new(AtomicBool::new(true))))
            .build();
        assert!(matches!(
            model.invoke(&ctx, json!("hi")).await,
            Err(PipelineError::Cancelled)
        ));
        assert_eq!(mock.call_count(), 0);
    }
}
