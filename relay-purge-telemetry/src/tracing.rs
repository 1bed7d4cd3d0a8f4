use std::sync::Once;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, ParseError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Environment variable enabling debug logs when set to `1`.
const DEBUG_ENV_NAME: &str = "DEBUG";

const DEFAULT_LEVEL: &str = "info";
const DEBUG_LEVEL: &str = "debug";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("failed to install the tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Flushes buffered log lines when dropped.
///
/// Keep it alive until the end of `main`, otherwise the last log lines may be lost.
#[must_use]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Returns the default filter directive for the given value of the `DEBUG` variable.
fn default_directive(debug: Option<&str>) -> &'static str {
    match debug {
        Some("1") => DEBUG_LEVEL,
        _ => DEFAULT_LEVEL,
    }
}

/// Builds the filter from `RUST_LOG`, falling back to the `DEBUG` based default.
fn build_filter() -> Result<EnvFilter, ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => {
            let debug = std::env::var(DEBUG_ENV_NAME).ok();
            EnvFilter::try_new(default_directive(debug.as_deref()))
        }
    }
}

/// Installs a global subscriber writing formatted logs to stdout.
///
/// Logs are emitted at `info` level, or `debug` level when `DEBUG=1`. `RUST_LOG` overrides both.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    tracing_subscriber::registry()
        .with(build_filter()?)
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .try_init()?;

    ::tracing::debug!(app_name, "tracing initialized");

    Ok(LogFlusher { _guard: guard })
}

/// Installs a subscriber that writes through the test harness, once per process.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let filter = build_filter().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(None), "info");
        assert_eq!(default_directive(Some("0")), "info");
        assert_eq!(default_directive(Some("true")), "info");
        assert_eq!(default_directive(Some("1")), "debug");
    }

    #[test]
    fn test_init_test_tracing_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }
}
