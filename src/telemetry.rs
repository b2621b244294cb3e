//! Tracing subscriber setup

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter {
        value: String,
        #[source]
        source: ParseError,
    },
    #[error("unknown log format '{0}' (expected json, pretty or compact)")]
    Format(String),
    #[error("telemetry error: {0}")]
    Subscriber(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|source| TelemetryError::EnvFilter {
            value: config.level.clone(),
            source,
        })?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    match config.format.as_str() {
        "json" => builder
            .json()
            .with_current_span(false)
            .try_init()
            .map_err(TelemetryError::Subscriber),
        "pretty" => builder.pretty().try_init().map_err(TelemetryError::Subscriber),
        "compact" => builder
            .compact()
            .with_target(false)
            .try_init()
            .map_err(TelemetryError::Subscriber),
        other => Err(TelemetryError::Format(other.to_string())),
    }
}
