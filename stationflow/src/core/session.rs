//! Session identity, requests and results.

use super::{RunStatus, SessionStatus, StationRun};
use crate::pipeline::ErrorRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Identifies one execution of the pipeline for a production unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new time-ordered session id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A request to drive a set of stations for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The session id.
    pub id: SessionId,
    /// Requested station ids. Empty means every registered station.
    #[serde(default)]
    pub requested: Vec<String>,
}

impl Session {
    /// Creates a session with a fresh id.
    #[must_use]
    pub fn new(requested: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::with_id(SessionId::new(), requested)
    }

    /// Creates a session with a caller-chosen id.
    #[must_use]
    pub fn with_id(id: SessionId, requested: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            id,
            requested: requested.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a session requesting every registered station.
    #[must_use]
    pub fn all() -> Self {
        Self {
            id: SessionId::new(),
            requested: Vec::new(),
        }
    }
}

/// The fixed point reached by a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    /// The session id.
    pub session_id: SessionId,
    /// Derived aggregate status.
    pub status: SessionStatus,
    /// The planned stations in topological order.
    pub plan: Vec<String>,
    /// Final run records keyed by station id.
    pub runs: BTreeMap<String, StationRun>,
    /// Terminal failures in the order they became terminal.
    pub errors: Vec<ErrorRecord>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
}

impl SessionResult {
    /// Returns the run record for a station.
    #[must_use]
    pub fn run(&self, station_id: &str) -> Option<&StationRun> {
        self.runs.get(station_id)
    }

    /// Returns the status of a station's run.
    #[must_use]
    pub fn status_of(&self, station_id: &str) -> Option<RunStatus> {
        self.runs.get(station_id).map(|run| run.status)
    }

    /// Returns station ids with the given status, in plan order.
    #[must_use]
    pub fn stations_with_status(&self, status: RunStatus) -> Vec<&str> {
        self.plan
            .iter()
            .filter(|id| self.status_of(id) == Some(status))
            .map(String::as_str)
            .collect()
    }

    /// Returns the number of runs with the given status.
    #[must_use]
    pub fn count(&self, status: RunStatus) -> usize {
        self.runs.values().filter(|run| run.status == status).count()
    }

    /// Returns true if every station succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }
}
