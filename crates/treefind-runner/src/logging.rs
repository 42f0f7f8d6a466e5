//! Log subscriber setup.

use crate::{Result, RunnerError};
use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber.
///
/// `level` takes precedence over `RUST_LOG`; without either, `info` is used.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| RunnerError::Logging(format!("invalid log filter {level:?}: {e}")))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| RunnerError::Logging(e.to_string()))
}
