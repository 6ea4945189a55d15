//! Glue steps: identity and closures.
//!
//! [`Passthrough`] forwards its input untouched (useful as a parallel branch
//! that keeps the original value next to derived ones). [`Lambda`] wraps a
//! closure for reshaping values between stages, such as building the mapping
//! a template expects from a parser's output.

use crate::{
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    step::{BoxFut, Step, StepOutput},
};
use serde_json::Value;
use std::sync::Arc;

/// Type alias for the closure wrapped by [`Lambda`].
pub type LambdaFn = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// Returns its input unchanged.
#[derive(Debug, Clone)]
pub struct Passthrough {
    name: String,
}

impl Default for Passthrough {
    fn default() -> Self {
        Self::new()
    }
}

impl Passthrough {
    pub fn new() -> Self {
        Self {
            name: "passthrough".to_string(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Step for Passthrough {
    fn kind(&self) -> &'static str {
        "passthrough"
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
            let output = StepOutput::from_value(input);
            emit(
                &ctx.event_handler,
                Event::StepEnd {
                    name: self.name.clone(),
                    ok: true,
                },
            );
            Ok(output)
        })
    }
}

/// A step backed by a synchronous closure.
///
/// Closure errors are `anyhow` errors; a [`PipelineError`](crate::PipelineError)
/// raised inside the closure comes back out unchanged, anything else becomes
/// [`PipelineError::Other`](crate::PipelineError::Other).
///
/// ```
/// use llm_runnables::{ExecCtx, Lambda, Step};
/// use serde_json::json;
///
/// let wrap = Lambda::new("to-mapping", |v| Ok(json!({"text": v})));
/// # tokio_test::block_on(async {
/// let out = wrap.invoke(&ExecCtx::default(), json!("hello")).await.unwrap();
/// assert_eq!(out.value, json!({"text": "hello"}));
/// # });
/// ```
#[derive(Clone)]
pub struct Lambda {
    name: String,
    func: LambdaFn,
}

impl std::fmt::Debug for Lambda {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lambda").field("name", &self.name).finish()
    }
}

impl Lambda {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl Step for Lambda {
    fn kind(&self) -> &'static str {
        "lambda"
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
            let result: Result<StepOutput> = (self.func)(input)
                .map(StepOutput::from_value)
                .map_err(Into::into);
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
    use crate::events::testing::Recorder;
    use crate::PipelineError;
    use serde_json::json;

    #[tokio::test]
    async fn test_passthrough_identity() {
        let ctx = ExecCtx::default();
        let p = Passthrough::new();
        for v in [json!("x"), json!({"a": [1, 2]}), json!(null)] {
            assert_eq!(p.invoke(&ctx, v.clone()).await.unwrap().value, v);
        }
    }

    #[tokio::test]
    async fn test_passthrough_emits_events() {
        let recorder = Arc::new(Recorder::default());
        let ctx = ExecCtx::builder().event_handler(recorder.clone()).build();
        Passthrough::new()
            .named("keep-text")
            .invoke(&ctx, json!("x"))
            .await
            .unwrap();

        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            Event::StepStart { name, kind: "passthrough" } if name == "keep-text"
        ));
        assert!(matches!(&events[1], Event::StepEnd { ok: true, .. }));
    }

    #[tokio::test]
    async fn test_lambda_error_kinds() {
        let ctx = ExecCtx::default();
        let plain = Lambda::new("plain", |_| anyhow::bail!("bad shape"));
        let err = plain.invoke(&ctx, json!(1)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Other(ref m) if m.contains("bad shape")));

        let typed = Lambda::new("typed", |_| {
            Err(PipelineError::MissingVariable { name: "text".into() }.into())
        });
        let err = typed.invoke(&ctx, json!(1)).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingVariable { ref name } if name == "text"));
    }

    #[tokio::test]
    async fn test_lambda_reshapes() {
        let ctx = ExecCtx::default();
        let pick = Lambda::new("pick", |v| Ok(v["sentiment"].clone()));
        let out = pick
            .invoke(&ctx, json!({"sentiment": "negative", "text": "meh"}))
            .await
            .unwrap();
        assert_eq!(out.value, json!("negative"));
    }
}
