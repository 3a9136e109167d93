//! Error types for the stationflow orchestrator.
//!
//! Configuration problems are fatal and surface before any session runs.
//! Processing problems are transient: they are handed to the retry
//! controller and, once terminal, recorded rather than raised.

use crate::core::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The main error type for stationflow operations.
#[derive(Debug, Error)]
pub enum StationflowError {
    /// The registry or engine configuration is invalid.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// The state store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// A session with this id has already been opened on the engine.
    #[error("Session {0} already exists")]
    SessionExists(SessionId),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Diagnostic metadata attached to a configuration error.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Error code (e.g., "CONFIG-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when the station registry or engine configuration is invalid.
///
/// Never retried.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The stations involved in the error.
    pub stations: Vec<String>,
    /// Diagnostic metadata.
    pub error_info: Option<ErrorInfo>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stations: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stations involved.
    #[must_use]
    pub fn with_stations(mut self, stations: Vec<String>) -> Self {
        self.stations = stations;
        self
    }

    /// Sets the diagnostic metadata.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if one was attached.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a cycle is detected in the station dependency graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in station registry: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stations forming the cycle.
    pub cycle_path: Vec<String>,
    /// Diagnostic metadata.
    pub error_info: ErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ErrorInfo::new(
            "CONFIG-CYCLE",
            format!("Station registry contains a dependency cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the dependencies in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl CycleDetectedError {
    /// Returns each station on the cycle once, without the closing repeat.
    #[must_use]
    pub fn members(&self) -> &[String] {
        match self.cycle_path.split_last() {
            Some((last, rest)) if rest.first() == Some(last) => rest,
            _ => &self.cycle_path,
        }
    }
}

impl From<CycleDetectedError> for ConfigurationError {
    fn from(err: CycleDetectedError) -> Self {
        let stations = err.members().to_vec();
        let info = err
            .error_info
            .clone()
            .with_context_entry("cycle_length", stations.len().to_string());
        Self {
            message: err.to_string(),
            stations,
            error_info: Some(info),
        }
    }
}

/// Classification of a processing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingErrorKind {
    /// The external processing call reported a failure.
    Failed,
    /// The attempt exceeded its deadline.
    Timeout,
    /// The processor returned a payload that could not be used.
    InvalidOutput,
    /// A dependency output could not be read from the state store.
    MissingInput,
    /// The output could not be persisted.
    Storage,
    /// The attempt task panicked or was torn down unexpectedly.
    Crashed,
}

impl fmt::Display for ProcessingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed => write!(f, "failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidOutput => write!(f, "invalid_output"),
            Self::MissingInput => write!(f, "missing_input"),
            Self::Storage => write!(f, "storage"),
            Self::Crashed => write!(f, "crashed"),
        }
    }
}

/// A failed station attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ProcessingError {
    /// The failure classification.
    pub kind: ProcessingErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl ProcessingError {
    /// Creates a new processing error.
    #[must_use]
    pub fn new(kind: ProcessingErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a generic processing failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ProcessingErrorKind::Failed, message)
    }

    /// Creates a timeout failure.
    #[must_use]
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(
            ProcessingErrorKind::Timeout,
            format!("attempt exceeded its {timeout_ms}ms deadline"),
        )
    }

    /// Creates an invalid-output failure.
    #[must_use]
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::new(ProcessingErrorKind::InvalidOutput, message)
    }
}

/// Errors raised by a state store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No payload exists for the key.
    #[error("No output stored for station '{station}' in session {session}")]
    NotFound {
        /// The session id.
        session: SessionId,
        /// The station id.
        station: String,
    },

    /// A different payload was already written for the key.
    #[error("Output for station '{station}' in session {session} is already written")]
    Conflict {
        /// The session id.
        session: SessionId,
        /// The station id.
        station: String,
    },

    /// IO error from a durable backend.
    #[error("Store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload (de)serialization error.
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
