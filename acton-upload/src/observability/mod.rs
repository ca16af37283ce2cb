//! Structured logging
//!
//! The pipeline emits `tracing` events only: rejections at `warn` with the
//! failing stage and reason code, acceptances at `debug`, stored files at
//! `info`. Filenames and content are never recorded. This module installs a
//! subscriber for applications that do not bring their own.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,

    /// One JSON object per event
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to the startup event
    pub service_name: String,

    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "acton-upload".to_string(),
            default_filter: if cfg!(debug_assertions) {
                "debug,acton_upload=trace".to_string()
            } else {
                "info".to_string()
            },
            format: LogFormat::default(),
        }
    }
}

impl ObservabilityConfig {
    /// Create new observability config
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Use a different fallback filter
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    /// Force JSON output
    #[must_use]
    pub const fn with_json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }
}

/// Initialize logging with defaults
///
/// Pretty output in debug builds, JSON in release builds. `RUST_LOG`
/// overrides the level filter.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
///
/// # Example
///
/// ```rust,no_run
/// use acton_upload::observability;
///
/// # fn main() -> anyhow::Result<()> {
/// observability::init()?;
/// tracing::info!("Application started");
/// # Ok(())
/// # }
/// ```
pub fn init() -> anyhow::Result<()> {
    init_with(&ObservabilityConfig::default())
}

/// Initialize logging from an explicit configuration
///
/// # Errors
///
/// Returns an error if the fallback filter does not parse or a global
/// subscriber is already installed.
pub fn init_with(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_filter)
            .with_context(|| format!("invalid log filter '{}'", config.default_filter))?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
    .context("a global tracing subscriber is already installed")?;

    tracing::info!(service = %config.service_name, "Logging initialized");
    Ok(())
}
