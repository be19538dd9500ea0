//! Tracing subscriber configuration.
//!
//! Libraries normally leave subscriber installation to the application; this
//! module exists for binaries and examples that want a sensible default.

use crate::error::FlowError;
use tracing_subscriber::EnvFilter;

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub default_filter: String,
    pub format: LogFormat,
    /// Include event targets (`flowstream::http`, ...)
    pub with_target: bool,
}

impl TracingConfig {
    /// Verbose, human readable output.
    pub fn development() -> Self {
        Self {
            default_filter: "flowstream=debug".to_string(),
            format: LogFormat::Pretty,
            with_target: true,
        }
    }

    /// Warnings and errors only.
    pub fn minimal() -> Self {
        Self {
            default_filter: "flowstream=warn".to_string(),
            format: LogFormat::Compact,
            with_target: false,
        }
    }

    /// Structured JSON lines at info level.
    pub fn json_production() -> Self {
        Self {
            default_filter: "flowstream=info".to_string(),
            format: LogFormat::Json,
            with_target: true,
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::minimal()
    }
}

/// Install a global subscriber.
///
/// `RUST_LOG` takes precedence over `config.default_filter`. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: TracingConfig) -> Result<(), FlowError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| FlowError::ConfigurationError(format!("Invalid tracing filter: {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let result = match config.format {
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| FlowError::ConfigurationError(format!("Failed to init tracing: {e}")))
}
