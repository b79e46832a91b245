// Observability infrastructure using tracing crate
// Provides structured logging without blocking the reconcile loop

use anyhow::Result;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize the observability system
/// Sets up structured logging to stdout with JSON formatting for machine parsing
pub fn init() -> Result<()> {
    // Create a JSON formatter for structured logs
    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_span_events(FmtSpan::CLOSE);

    // Configure filter from environment or use default
    // Example: RUST_LOG=quince=debug
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("quince=info"))?;

    // Build and set the global subscriber
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    Ok(())
}

/// Record the duration of a reconciliation pass
#[inline]
pub fn record_pass_duration(namespace: &str, duration_ms: u64) {
    tracing::debug!(
        namespace = namespace,
        duration_ms = duration_ms,
        "reconciliation pass completed"
    );
}
