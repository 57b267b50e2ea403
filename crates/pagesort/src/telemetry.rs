//! Global `tracing` subscriber setup for hosts embedding the crate.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::error::TelemetryError;

/// Filter from `RUST_LOG` when set, otherwise from the configured level.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).unwrap_or_else(|e| {
            eprintln!(
                "Invalid log level '{}' ({}), falling back to 'info'",
                config.level, e
            );
            EnvFilter::new("info")
        }),
    }
}

/// Installs the global subscriber and bridges `log` records into it.
///
/// Fails if a global subscriber or logger is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let json = config.json;
    let subscriber = Registry::default()
        .with(build_filter(config))
        .with(json.then(|| fmt::layer().json().with_current_span(true)))
        .with((!json).then(|| fmt::layer().with_target(true)));

    tracing_log::LogTracer::init().map_err(|e| TelemetryError::Init(e.to_string()))?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::debug!(json, level = %config.level, "Logging initialized");
    Ok(())
}
