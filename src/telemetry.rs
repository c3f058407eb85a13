use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Initialize tracing with JSON output for structured logging. This provides
/// the correlation IDs and structured data needed for observability.
pub fn init_telemetry() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("mergeready telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking a run's operations and artifacts
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span with common batch-check attributes
pub fn create_check_span(check_name: &str, run_id: Option<&str>) -> tracing::Span {
    tracing::info_span!(
        "merge_check",
        check.name = check_name,
        run.id = run_id,
        otel.kind = "internal"
    )
}
