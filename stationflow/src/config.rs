//! Orchestrator configuration.
//!
//! Configuration is a JSON document holding the engine settings, logging
//! settings, report thresholds and the station definitions. A handful of
//! engine and logging settings can be overridden from the environment.

use crate::errors::{ConfigurationError, ErrorInfo, StationflowError};
use crate::registry::{StationDefinition, StationRegistry};
use crate::report::ReportThresholds;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Overrides `EngineConfig::max_concurrency`.
pub const ENV_MAX_CONCURRENCY: &str = "STATIONFLOW_MAX_CONCURRENCY";
/// Overrides `EngineConfig::attempt_timeout_ms`.
pub const ENV_ATTEMPT_TIMEOUT_MS: &str = "STATIONFLOW_ATTEMPT_TIMEOUT_MS";
/// Overrides `LoggingConfig::json`.
pub const ENV_LOG_JSON: &str = "STATIONFLOW_LOG_JSON";

fn default_max_concurrency() -> usize {
    4
}

fn default_attempt_timeout_ms() -> u64 {
    120_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Execution engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Size of the worker pool shared by every session.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Deadline for a single processing attempt, in milliseconds.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// Sets the worker pool size.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Sets the per-attempt deadline.
    #[must_use]
    pub fn with_attempt_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.attempt_timeout_ms = timeout_ms;
        self
    }

    /// Returns the per-attempt deadline.
    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool size or the deadline is zero.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_concurrency == 0 {
            return Err(invalid_engine("max_concurrency must be at least 1"));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(invalid_engine("attempt_timeout_ms must be at least 1"));
        }
        Ok(())
    }
}

fn invalid_engine(problem: impl Into<String>) -> ConfigurationError {
    let problem = problem.into();
    ConfigurationError::new(format!("Invalid engine configuration: {problem}"))
        .with_error_info(ErrorInfo::new("CONFIG-INVALID-ENGINE", problem))
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `STATIONFLOW_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Validates the filter directive in `level`.
    ///
    /// # Errors
    ///
    /// Returns `CONFIG-INVALID-LOGGING` if `level` is not a valid directive.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        parse_log_filter("logging.level", &self.level).map(|_| ())
    }
}

/// Parses a tracing filter directive such as `info` or `stationflow=debug`.
pub(crate) fn parse_log_filter(source: &str, directive: &str) -> Result<EnvFilter, ConfigurationError> {
    EnvFilter::try_new(directive).map_err(|err| {
        ConfigurationError::new(format!("{source} has an invalid log filter '{directive}': {err}"))
            .with_error_info(
                ErrorInfo::new("CONFIG-INVALID-LOGGING", format!("Invalid log filter in {source}"))
                    .with_fix_hint("Use a level such as 'info' or directives such as 'stationflow=debug'"),
            )
    })
}

/// The complete orchestrator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Report thresholds.
    #[serde(default)]
    pub report: ReportThresholds,
    /// Station definitions.
    #[serde(default)]
    pub stations: Vec<StationDefinition>,
}

impl OrchestratorConfig {
    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON for this shape or
    /// the logging filter is invalid.
    pub fn from_json_str(json: &str) -> Result<Self, StationflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.logging.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StationflowError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is set but cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigurationError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is set but cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MAX_CONCURRENCY) {
            self.engine.max_concurrency = parse_override(ENV_MAX_CONCURRENCY, &value)?;
        }
        if let Some(value) = lookup(ENV_ATTEMPT_TIMEOUT_MS) {
            self.engine.attempt_timeout_ms = parse_override(ENV_ATTEMPT_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_LOG_JSON) {
            self.logging.json = parse_override(ENV_LOG_JSON, &value)?;
        }
        Ok(())
    }

    /// Validates the engine settings and builds the station registry.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found.
    pub fn build_registry(&self) -> Result<StationRegistry, ConfigurationError> {
        self.engine.validate()?;
        StationRegistry::from_definitions(self.stations.iter().cloned())
    }
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigurationError> {
    value.trim().parse().map_err(|_| {
        ConfigurationError::new(format!("{key} has an unparseable value '{value}'")).with_error_info(
            ErrorInfo::new("CONFIG-INVALID-ENGINE", format!("Cannot parse {key}"))
                .with_fix_hint(format!("Unset {key} or give it a valid value")),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StationType;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "engine": { "max_concurrency": 2 },
        "logging": { "json": true },
        "stations": [
            { "id": "episode_analysis", "type": "analysis" },
            { "id": "script_draft", "type": "generation", "depends_on": ["episode_analysis"],
              "complexity": "short", "bounds": { "short_min": 200, "short_max": 800 } }
        ]
    }"#;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::from_json_str("{}").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.engine.max_concurrency, 4);
        assert_eq!(config.engine.attempt_timeout(), Duration::from_secs(120));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(config.stations.is_empty());
    }

    #[test]
    fn test_parse_and_build_registry() {
        let config = OrchestratorConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(config.engine.max_concurrency, 2);
        assert_eq!(config.engine.attempt_timeout_ms, 120_000);
        assert!(config.logging.json);

        let registry = config.build_registry().unwrap();
        assert_eq!(registry.len(), 2);
        let draft = registry.get("script_draft").unwrap();
        assert_eq!(draft.station_type(), StationType::Generation);
        assert_eq!(draft.output_bounds().map(|b| (b.min, b.max)), Some((200, 800)));
    }

    #[test]
    fn test_missing_bound_fails_registry_build() {
        let config = OrchestratorConfig::from_json_str(
            r#"{ "stations": [
                { "id": "draft", "type": "generation", "complexity": "short", "bounds": { "short_min": 1 } }
            ] }"#,
        )
        .unwrap();
        let err = config.build_registry().unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-MISSING-BOUND"));
        assert!(err.to_string().contains("short_max"));
    }

    #[test]
    fn test_invalid_log_level_fails_on_load() {
        let err = OrchestratorConfig::from_json_str(r#"{ "logging": { "level": "stationflow=verbose" } }"#)
            .unwrap_err();
        match err {
            StationflowError::Configuration(config) => {
                assert_eq!(config.code(), Some("CONFIG-INVALID-LOGGING"));
                assert!(config.message.contains("logging.level"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let config = OrchestratorConfig::from_json_str(r#"{ "logging": { "level": "stationflow=debug,warn" } }"#)
            .unwrap();
        assert!(config.logging.validate().is_ok());
    }

    #[test]
    fn test_engine_validation() {
        assert!(EngineConfig::default().validate().is_ok());
        let err = EngineConfig::default().with_max_concurrency(0).validate().unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-INVALID-ENGINE"));
        let err = EngineConfig::default().with_attempt_timeout_ms(0).validate().unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-INVALID-ENGINE"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_MAX_CONCURRENCY, "8"),
            (ENV_ATTEMPT_TIMEOUT_MS, " 2500 "),
            (ENV_LOG_JSON, "true"),
        ]
        .into_iter()
        .collect();

        let mut config = OrchestratorConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.engine.max_concurrency, 8);
        assert_eq!(config.engine.attempt_timeout_ms, 2500);
        assert!(config.logging.json);
    }

    #[test]
    fn test_unparseable_override() {
        let mut config = OrchestratorConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_MAX_CONCURRENCY).then(|| "many".to_string()))
            .unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-INVALID-ENGINE"));
        assert_eq!(config.engine.max_concurrency, 4);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = OrchestratorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.stations.len(), 2);

        let missing = OrchestratorConfig::from_file(file.path().with_extension("absent"));
        assert!(matches!(missing, Err(StationflowError::Io(_))));
    }
}
