//! Tracing subscriber installation.

use crate::config::{parse_log_filter, LoggingConfig};
use crate::errors::ConfigurationError;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable holding a filter directive, e.g. `stationflow=debug`.
pub const LOG_FILTER_ENV: &str = "STATIONFLOW_LOG";

static INSTALLED: OnceLock<bool> = OnceLock::new();

/// Builds the filter: an explicit directive wins over the configured level.
///
/// # Errors
///
/// Returns `CONFIG-INVALID-LOGGING` if the directive in use does not parse.
pub fn build_env_filter(config: &LoggingConfig, directive: Option<&str>) -> Result<EnvFilter, ConfigurationError> {
    match directive {
        Some(directive) => parse_log_filter(LOG_FILTER_ENV, directive),
        None => parse_log_filter("logging.level", &config.level),
    }
}

/// Installs a global fmt subscriber.
///
/// Returns `Ok(true)` if this call installed it and `Ok(false)` if a
/// subscriber was already installed, by this function or by someone else.
///
/// # Errors
///
/// Returns an error if `STATIONFLOW_LOG` or the configured level is not a
/// valid filter. Nothing is installed in that case.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool, ConfigurationError> {
    if INSTALLED.get().is_some() {
        return Ok(false);
    }

    let directive = std::env::var(LOG_FILTER_ENV).ok();
    let filter = build_env_filter(config, directive.as_deref())?;

    let mut installed_now = false;
    INSTALLED.get_or_init(|| {
        let layer = if config.json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_filter(filter)
                .boxed()
        };

        installed_now = tracing_subscriber::registry().with(layer).try_init().is_ok();
        if installed_now {
            tracing::debug!(json = config.json, level = %config.level, "Tracing initialized");
        }
        installed_now
    });

    Ok(installed_now)
}
