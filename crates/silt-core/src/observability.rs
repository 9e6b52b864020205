//! Observability infrastructure: structured logging with consistent spans.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at process startup. Safe to call multiple times; subsequent
/// calls are no-ops. Log levels come from `RUST_LOG` (e.g. `info`,
/// `silt_compact=debug`).
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for compaction operations with standard fields.
#[must_use]
pub fn compaction_span(operation: &str, input_count: usize) -> Span {
    tracing::info_span!("compaction", op = operation, inputs = input_count)
}

/// Creates a span for dispatch worker operations.
#[must_use]
pub fn worker_span(operation: &str, namespace: &str) -> Span {
    tracing::info_span!("worker", op = operation, namespace = namespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Pretty); // Second call is a no-op
    }

    #[test]
    fn span_helpers_create_spans() {
        let span = compaction_span("compact", 4);
        let _guard = span.enter();
        tracing::info!("test message in span");

        let span = worker_span("run", "storage/compaction");
        let _guard2 = span.enter();
        tracing::info!("worker message");
    }
}
