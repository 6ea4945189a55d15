//! Tracing subscriber setup for binaries and demos.
//!
//! The library itself only emits `tracing` events; nothing is printed unless
//! the application installs a subscriber, for example with [`init_logging`].

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::Result;
use crate::PipelineError;

/// Install a stderr `fmt` subscriber filtered by `log_level`, or by
/// `RUST_LOG` when no level is given (default `info`).
///
/// Fails with [`PipelineError::InvalidConfig`] on a malformed filter or when
/// a global subscriber is already installed.
///
/// ```no_run
/// llm_runnables::logging::init_logging(Some("llm_runnables=debug")).unwrap();
/// ```
pub fn init_logging(log_level: Option<&str>) -> Result<()> {
    let default_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_str = log_level.unwrap_or(&default_level);

    let env_filter = EnvFilter::try_new(filter_str)
        .map_err(|e| PipelineError::InvalidConfig(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(std::env::var_os("NO_COLOR").is_none());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| PipelineError::InvalidConfig(format!("Failed to init logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_rejected() {
        let err = init_logging(Some("llm_runnables=notalevel")).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(ref m) if m.contains("filter")));
    }
}
