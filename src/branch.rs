//! Conditional routing: the first matching predicate picks the step to run.
//!
//! ```text
//!             ┌─ p1(x)? ──► step 1
//! input x ──► ├─ p2(x)? ──► step 2
//!             └─ else ────► default
//! ```

use crate::{
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    step::{BoxFut, Step, StepOutput},
};
use serde_json::Value;
use std::sync::Arc;

/// Predicate evaluated against a branch's input.
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Routes each input to exactly one step.
///
/// Predicates are tested in the order they were added; the first one that
/// returns `true` selects its step. When none match (or there are none),
/// the default step runs. Exactly one step executes per invocation.
///
/// # Example
///
/// ```
/// use llm_runnables::branch::field_equals;
/// use llm_runnables::{Branch, ExecCtx, Lambda, Step};
/// use serde_json::json;
///
/// let reply = |msg: &'static str| Lambda::new(msg, move |_| Ok(json!(msg)));
/// let router = Branch::new("by-sentiment", reply("neutral reply"))
///     .when(field_equals("sentiment", "positive"), reply("thanks!"))
///     .when(field_equals("sentiment", "negative"), reply("sorry!"));
///
/// # tokio_test::block_on(async {
/// let out = router
///     .invoke(&ExecCtx::default(), json!({"sentiment": "negative", "text": "meh"}))
///     .await
///     .unwrap();
/// assert_eq!(out.value, "sorry!");
/// # });
/// ```
pub struct Branch {
    name: String,
    routes: Vec<(Predicate, Box<dyn Step>)>,
    default: Box<dyn Step>,
}

impl Branch {
    /// Create a branch that always runs `default` until routes are added.
    pub fn new(name: impl Into<String>, default: impl Step + 'static) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
            default: Box::new(default),
        }
    }

    /// Append a route, tested after all routes added before it.
    pub fn when<P>(mut self, predicate: P, step: impl Step + 'static) -> Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.routes.push((Arc::new(predicate), Box::new(step)));
        self
    }

    /// Append a route with a boxed step (mutation style).
    pub fn add(&mut self, predicate: Predicate, step: Box<dyn Step>) {
        self.routes.push((predicate, step));
    }

    /// Number of predicate routes (the default is not counted).
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// The index of the route selected for `input`, `None` for the default.
    pub fn select(&self, input: &Value) -> Option<usize> {
        self.routes.iter().position(|(predicate, _)| predicate(input))
    }
}

impl Step for Branch {
    fn kind(&self) -> &'static str {
        "branch"
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

            let index = self.select(&input);
            let target: &dyn Step = match index {
                Some(i) => self.routes[i].1.as_ref(),
                None => self.default.as_ref(),
            };
            tracing::debug!(branch = %self.name, ?index, target = target.name(), "route selected");
            emit(
                &ctx.event_handler,
                Event::BranchSelected {
                    name: self.name.clone(),
                    index,
                    target: target.name().to_string(),
                },
            );

            let result = target.invoke(ctx, input).await;
            if let Err(ref e) = result {
                tracing::warn!(branch = %self.name, target = target.name(), error = %e, "routed step failed");
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

/// True when the input is an object whose `key` equals `expected`.
///
/// String comparisons ignore surrounding whitespace and ASCII case, since
/// classifier models are loose about both.
pub fn field_equals(
    key: impl Into<String>,
    expected: impl Into<Value>,
) -> impl Fn(&Value) -> bool + Send + Sync + 'static {
    let key = key.into();
    let expected = expected.into();
    move |input| match (input.get(&key), &expected) {
        (Some(Value::String(actual)), Value::String(wanted)) => {
            actual.trim().eq_ignore_ascii_case(wanted.trim())
        }
        (Some(actual), wanted) => actual == wanted,
        (None, _) => false,
    }
}

/// True when the input is text with more than `limit` whitespace-separated words.
pub fn word_count_above(limit: usize) -> impl Fn(&Value) -> bool + Send + Sync + 'static {
    move |input| {
        input
            .as_str()
            .is_some_and(|text| text.split_whitespace().count() > limit)
    }
}
