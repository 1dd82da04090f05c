use super::config::LogLevel;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Noisy dependency targets held at warn regardless of the configured level.
const QUIET_TARGETS: &[&str] = &["hyper", "reqwest", "h2", "tower", "redis"];

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {source}")]
    InvalidFilter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    #[error("Failed to set global tracing subscriber: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// `RUST_LOG` when set, otherwise the configured level plus quiet targets.
pub fn filter_string(level: LogLevel) -> String {
    if let Ok(directives) = std::env::var("RUST_LOG")
        && !directives.trim().is_empty()
    {
        return directives;
    }

    let mut parts = vec![level.as_str().to_string()];
    parts.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    parts.join(",")
}

/// Installs the global subscriber. JSON output unless
/// `RUST_LOG_FORMAT` is set to something other than `json`.
pub fn init_tracing(level: LogLevel) -> Result<(), LoggingError> {
    let filter = filter_string(level);
    let env_filter = EnvFilter::try_new(&filter).map_err(|source| LoggingError::InvalidFilter {
        filter: filter.clone(),
        source,
    })?;

    let use_json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(true); // Default to JSON for production

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).compact())
            .try_init()?;
    }
    Ok(())
}
