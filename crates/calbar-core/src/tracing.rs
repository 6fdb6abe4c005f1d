//! Tracing setup for calbar
//!
//! Logs always go to stderr: stdout carries the menu read by the host.
//!
//! # Usage
//!
//! ```ignore
//! use calbar_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::plugin()).expect("failed to initialize tracing");
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to set global subscriber
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Failed to parse env filter directive
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Human-readable multi-line format
    Pretty,
    /// Compact single-line format (default)
    #[default]
    Compact,
    /// JSON lines
    Json,
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// The default log level when RUST_LOG is not set
    pub default_level: Level,
    pub output_format: TracingOutputFormat,
    /// Whether to include file/line information in logs
    pub include_location: bool,
    pub include_timestamp: bool,
    /// Custom env filter directive (overrides default_level if set)
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::plugin()
    }
}

impl TracingConfig {
    /// Quiet config for periodic plugin runs: warnings and errors only.
    #[must_use]
    pub fn plugin() -> Self {
        Self {
            default_level: Level::WARN,
            output_format: TracingOutputFormat::Compact,
            include_location: false,
            include_timestamp: true,
            env_filter: None,
        }
    }

    /// Verbose config for `--debug`.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            output_format: TracingOutputFormat::Compact,
            include_location: true,
            include_timestamp: false,
            env_filter: None,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Directive used when neither `env_filter` nor `RUST_LOG` is set.
    ///
    /// Target matching is by prefix, so this covers every `calbar_*` crate.
    fn default_directive(&self) -> String {
        format!("calbar={}", self.default_level)
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over the configured level unless `env_filter` is set.
///
/// # Errors
///
/// Fails if a global subscriber is already installed or the filter
/// directive does not parse.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter = match &config.env_filter {
        Some(filter) => EnvFilter::try_new(filter)?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.default_directive())),
    };

    let subscriber = tracing_subscriber::registry()
        .with(stderr_layer(&config))
        .with(env_filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn stderr_layer(config: &TracingConfig) -> BoxedLayer {
    let location = config.include_location;
    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_file(location)
        .with_line_number(location);

    match (config.output_format, config.include_timestamp) {
        (TracingOutputFormat::Json, _) => base.json().boxed(),
        (TracingOutputFormat::Pretty, _) => base.pretty().boxed(),
        (TracingOutputFormat::Compact, true) => base.compact().with_target(location).boxed(),
        (TracingOutputFormat::Compact, false) => {
            base.compact().with_target(location).without_time().boxed()
        }
    }
}
