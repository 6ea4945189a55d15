//! Sequential chain of steps.
//!
//! [`Chain`] composes multiple steps into a sequential pipeline, passing each
//! step's output `value` as the next step's input. For fan-out use
//! [`Parallel`](crate::Parallel); for routing use [`Branch`](crate::Branch).

use crate::{
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    step::{BoxFut, Step, StepOutput},
    PipelineError,
};
use serde_json::Value;

/// A sequential chain of steps.
///
/// Executes steps in order, piping each output's `value` as the next step's
/// input. The first failure stops the chain and is returned unchanged.
///
/// `Chain` itself implements [`Step`], so chains can be nested.
///
/// # Example
///
/// ```
/// use llm_runnables::backend::MockBackend;
/// use llm_runnables::{Chain, ChatModel, ExecCtx, PromptTemplate, StrOutputParser};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let chain = Chain::new("summary")
///     .then(PromptTemplate::new("Summarize the following {topic} topic"))
///     .then(ChatModel::new("model", Arc::new(MockBackend::echo())))
///     .then(StrOutputParser::new());
///
/// let ctx = ExecCtx::default();
/// let output = chain.execute(&ctx, json!({"topic": "Black Holes"})).await.unwrap();
/// assert_eq!(output.value, "Summarize the following Black Holes topic");
/// # });
/// ```
pub struct Chain {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Chain {
    /// Create a new empty chain.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Add a boxed step to the end of the chain (builder style).
    pub fn push(mut self, step: Box<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Add a step to the end of the chain (builder style).
    pub fn then(self, step: impl Step + 'static) -> Self {
        self.push(Box::new(step))
    }

    /// Add a step to the end of the chain (mutation style).
    pub fn add(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    /// Number of steps in the chain.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Execute all steps sequentially, returning every intermediate output.
    ///
    /// The first step receives `input`. Each subsequent step receives the
    /// previous output's `value`.
    pub async fn execute_all(&self, ctx: &ExecCtx, input: Value) -> Result<Vec<StepOutput>> {
        if self.steps.is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "Chain '{}' has no steps",
                self.name
            )));
        }

        let mut outputs: Vec<StepOutput> = Vec::with_capacity(self.steps.len());
        let mut current = input;

        for (index, step) in self.steps.iter().enumerate() {
            ctx.check_cancelled()?;
            tracing::debug!(chain = %self.name, step = step.name(), index, "running step");
            let output = step.invoke(ctx, current).await.map_err(|e| {
                tracing::warn!(
                    chain = %self.name,
                    step = step.name(),
                    kind = step.kind(),
                    index,
                    error = %e,
                    "chain step failed"
                );
                e
            })?;
            current = output.value.clone();
            outputs.push(output);
        }

        Ok(outputs)
    }

    /// Execute all steps and return only the final output.
    pub async fn execute(&self, ctx: &ExecCtx, input: Value) -> Result<StepOutput> {
        let outputs = self.execute_all(ctx, input).await?;
        outputs
            .into_iter()
            .last()
            .ok_or_else(|| PipelineError::Other("Chain produced no outputs".to_string()))
    }
}

impl Step for Chain {
    fn kind(&self) -> &'static str {
        "chain"
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
            let result = self.execute(ctx, input).await;
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
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// A test step that wraps input in a JSON object.
    struct EchoStep {
        tag: String,
    }

    impl Step for EchoStep {
        fn kind(&self) -> &'static str {
            "echo"
        }
        fn name(&self) -> &str {
            &self.tag
        }
        fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<StepOutput>> {
            let tag = self.tag.clone();
            Box::pin(async move {
                let value = json!({ "from": tag, "input": input });
                Ok(StepOutput::from_value(value))
            })
        }
    }

    struct FailStep;

    impl Step for FailStep {
        fn kind(&self) -> &'static str {
            "fail"
        }
        fn name(&self) -> &str {
            "fail"
        }
        fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, _input: Value) -> BoxFut<'a, Result<StepOutput>> {
            Box::pin(async { Err(PipelineError::Other("boom".into())) })
        }
    }

    /// Counts invocations; used to prove short-circuiting.
    struct CountStep(Arc<AtomicUsize>);

    impl Step for CountStep {
        fn kind(&self) -> &'static str {
            "count"
        }
        fn name(&self) -> &str {
            "count"
        }
        fn invoke<'a>(&'a self, _ctx: &'a ExecCtx, input: Value) -> BoxFut<'a, Result<StepOutput>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(StepOutput::from_value(input)) })
        }
    }

    fn echo(tag: &str) -> EchoStep {
        EchoStep { tag: tag.into() }
    }

    fn test_ctx() -> ExecCtx {
        ExecCtx::builder().build()
    }

    #[tokio::test]
    async fn test_chain_single_step() {
        let chain = Chain::new("test").then(echo("a"));

        let out = chain.execute(&test_ctx(), json!("hello")).await.unwrap();
        assert_eq!(out.value["from"], "a");
        assert_eq!(out.value["input"], "hello");
    }

    #[tokio::test]
    async fn test_chain_equals_manual_composition() {
        let ctx = test_ctx();
        let chain = Chain::new("test").then(echo("f")).then(echo("g"));

        let composed = chain.execute(&ctx, json!("start")).await.unwrap();
        let f = echo("f").invoke(&ctx, json!("start")).await.unwrap();
        let manual = echo("g").invoke(&ctx, f.value).await.unwrap();
        assert_eq!(composed.value, manual.value);
    }

    #[tokio::test]
    async fn test_chain_execute_all() {
        let mut chain = Chain::new("test").push(Box::new(echo("a")));
        chain.add(Box::new(echo("b")));
        assert_eq!(chain.len(), 2);

        let outputs = chain.execute_all(&test_ctx(), json!("x")).await.unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].value["from"], "a");
        assert_eq!(outputs[1].value["from"], "b");
    }

    #[tokio::test]
    async fn test_chain_short_circuits() {
        let count = Arc::new(AtomicUsize::new(0));
        let chain = Chain::new("test")
            .then(echo("a"))
            .then(FailStep)
            .then(CountStep(count.clone()));

        let err = chain.execute(&test_ctx(), json!("x")).await.unwrap_err();
        assert!(matches!(err, PipelineError::Other(ref m) if m == "boom"));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chain_empty_fails() {
        let chain = Chain::new("empty");
        assert!(chain.is_empty());
        let result = chain.execute(&test_ctx(), json!(null)).await;
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_chain_cancellation() {
        let cancel = Arc::new(AtomicBool::new(true));
        let ctx = ExecCtx::builder().cancellation(Some(cancel)).build();

        let chain = Chain::new("test").then(echo("a"));
        let result = chain.execute(&ctx, json!("x")).await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }

    #[tokio::test]
    async fn test_chain_as_step() {
        // Chain implements Step, so it can be nested
        let inner = Chain::new("inner").then(echo("inner-step"));
        let outer = Chain::new("outer").then(inner);

        let out = outer.invoke(&test_ctx(), json!("input")).await.unwrap();
        assert_eq!(out.value["from"], "inner-step");
    }
}
