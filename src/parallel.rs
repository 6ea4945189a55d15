//! Fan-out composition: named branches over the same input.

use crate::{
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    step::{BoxFut, Step, StepOutput},
};
use futures::future::try_join_all;
use serde_json::{Map, Value};

/// Runs every named branch against a copy of the same input and merges the
/// results into one object keyed by branch name.
///
/// Branches run concurrently on the calling task unless
/// [`sequential`](Parallel::sequential) is set. Either way the output keys
/// are exactly the branch names, and the first failing branch fails the
/// whole composition.
///
/// # Example
///
/// ```
/// use llm_runnables::{ExecCtx, Lambda, Parallel, Passthrough, Step};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let fan_out = Parallel::new("notes-and-quiz")
///     .branch("original", Passthrough::new())
///     .branch("length", Lambda::new("len", |v| {
///         Ok(json!(v.as_str().map(str::len).unwrap_or(0)))
///     }));
///
/// let out = fan_out.invoke(&ExecCtx::default(), json!("abc")).await.unwrap();
/// assert_eq!(out.value, json!({"original": "abc", "length": 3}));
/// # });
/// ```
pub struct Parallel {
    name: String,
    branches: Vec<(String, Box<dyn Step>)>,
    sequential: bool,
}

impl Parallel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
            sequential: false,
        }
    }

    /// Add a named branch. Reusing a name replaces the earlier branch in place.
    pub fn branch(mut self, key: impl Into<String>, step: impl Step + 'static) -> Self {
        self.insert(key.into(), Box::new(step));
        self
    }

    /// Add a named, boxed branch (mutation style).
    pub fn add(&mut self, key: impl Into<String>, step: Box<dyn Step>) {
        self.insert(key.into(), step);
    }

    fn insert(&mut self, key: String, step: Box<dyn Step>) {
        match self.branches.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = step,
            None => self.branches.push((key, step)),
        }
    }

    /// Run branches one after another in declaration order.
    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    /// Branch names in declaration order.
    pub fn keys(&self) -> Vec<&str> {
        self.branches.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Execute all branches, returning each branch's full output by name.
    pub async fn execute_all(
        &self,
        ctx: &ExecCtx,
        input: Value,
    ) -> Result<Vec<(String, StepOutput)>> {
        ctx.check_cancelled()?;
        tracing::debug!(
            parallel = %self.name,
            branches = self.branches.len(),
            sequential = self.sequential,
            "fanning out"
        );

        if self.sequential {
            let mut outputs = Vec::with_capacity(self.branches.len());
            for (key, step) in &self.branches {
                ctx.check_cancelled()?;
                outputs.push(self.run_branch(ctx, key, step.as_ref(), input.clone()).await?);
            }
            Ok(outputs)
        } else {
            try_join_all(
                self.branches
                    .iter()
                    .map(|(key, step)| self.run_branch(ctx, key, step.as_ref(), input.clone())),
            )
            .await
        }
    }

    async fn run_branch(
        &self,
        ctx: &ExecCtx,
        key: &str,
        step: &dyn Step,
        input: Value,
    ) -> Result<(String, StepOutput)> {
        match step.invoke(ctx, input).await {
            Ok(output) => Ok((key.to_string(), output)),
            Err(e) => {
                tracing::warn!(parallel = %self.name, branch = key, error = %e, "branch failed");
                Err(e)
            }
        }
    }
}

impl Step for Parallel {
    fn kind(&self) -> &'static str {
        "parallel"
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

            let result = self.execute_all(ctx, input).await.map(|outputs| {
                let merged: Map<String, Value> = outputs
                    .into_iter()
                    .map(|(key, output)| (key, output.value))
                    .collect();
                StepOutput::from_value(Value::Object(merged))
            });

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
