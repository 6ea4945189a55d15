//! Event system for step lifecycle hooks.
//!
//! Provides an optional, non-intrusive way to observe pipeline execution.
//! Steps emit events when they start, finish, route, or retry a transport
//! call. Implement [`EventHandler`] to receive them for progress tracking or
//! UIs; structured logs go through `tracing` independently.

use std::sync::Arc;

/// Events emitted during step execution.
#[derive(Debug, Clone)]
pub enum Event {
    /// A step has started executing.
    StepStart {
        /// Instance name of the step.
        name: String,
        /// Stable type identifier (e.g. `"chat-model"`, `"chain"`).
        kind: &'static str,
    },
    /// A step has finished executing.
    StepEnd {
        /// Instance name of the step.
        name: String,
        /// Whether execution succeeded.
        ok: bool,
    },
    /// A conditional branch picked its route.
    BranchSelected {
        /// Instance name of the branch.
        name: String,
        /// Index of the matching predicate, `None` for the default route.
        index: Option<usize>,
        /// Name of the step that will run.
        target: String,
    },
    /// A transport-level retry due to an HTTP or connection error.
    TransportRetry {
        /// Instance name of the calling step.
        name: String,
        /// The retry attempt number (1-indexed).
        attempt: u32,
        /// Delay before this retry attempt in milliseconds.
        delay_ms: u64,
        /// Reason for the retry (error description).
        reason: String,
    },
}

/// Handler for step lifecycle events.
///
/// This is entirely optional -- steps work without an event handler.
///
/// # Example
///
/// ```
/// use llm_runnables::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         match event {
///             Event::StepStart { name, .. } => println!("[start] {}", name),
///             Event::StepEnd { name, ok } => println!("[end] {} ok={}", name, ok),
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when a step emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// ```
/// use llm_runnables::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::BranchSelected { target, .. } = event {
///         println!("routing to {}", target);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every event for assertions.
    #[derive(Default)]
    pub struct Recorder(pub Mutex<Vec<Event>>);

    impl EventHandler for Recorder {
        fn on_event(&self, event: Event) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl Recorder {
        pub fn events(&self) -> Vec<Event> {
            self.0.lock().unwrap().clone()
        }
    }
}
