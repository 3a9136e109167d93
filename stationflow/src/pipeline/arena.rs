//! Arena of station runs indexed by (session, station).

use crate::core::{RunStatus, SessionId, StationRun};
use crate::errors::StationflowError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Key of a run in the arena.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    /// The session id.
    pub session_id: SessionId,
    /// The station id.
    pub station_id: String,
}

impl RunKey {
    /// Creates a run key.
    pub fn new(session_id: SessionId, station_id: impl Into<String>) -> Self {
        Self {
            session_id,
            station_id: station_id.into(),
        }
    }
}

/// Holds every [`StationRun`] of every open session.
///
/// A run is created once, when its session opens, and then mutated in place
/// for the rest of the session.
#[derive(Debug, Default)]
pub struct RunArena {
    runs: DashMap<RunKey, StationRun>,
    sessions: DashMap<SessionId, Vec<String>>,
}

impl RunArena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pending run for every planned station.
    ///
    /// # Errors
    ///
    /// Returns `SessionExists` if the session was already opened.
    pub fn open(&self, session: SessionId, plan: &[String]) -> Result<(), StationflowError> {
        match self.sessions.entry(session) {
            Entry::Occupied(_) => return Err(StationflowError::SessionExists(session)),
            Entry::Vacant(entry) => {
                entry.insert(plan.to_vec());
            }
        }

        for station in plan {
            self.runs
                .insert(RunKey::new(session, station.as_str()), StationRun::new(session, station.as_str()));
        }
        Ok(())
    }

    /// Returns true if the session is open.
    #[must_use]
    pub fn contains_session(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    /// Returns a copy of a run.
    #[must_use]
    pub fn get(&self, session: SessionId, station: &str) -> Option<StationRun> {
        self.runs
            .get(&RunKey::new(session, station))
            .map(|run| run.clone())
    }

    /// Returns a run's status.
    #[must_use]
    pub fn status(&self, session: SessionId, station: &str) -> Option<RunStatus> {
        self.runs
            .get(&RunKey::new(session, station))
            .map(|run| run.status)
    }

    /// Applies `f` to a run in place. Returns `None` if the run does not exist.
    pub fn update<R>(
        &self,
        session: SessionId,
        station: &str,
        f: impl FnOnce(&mut StationRun) -> R,
    ) -> Option<R> {
        self.runs
            .get_mut(&RunKey::new(session, station))
            .map(|mut run| f(&mut *run))
    }

    /// Starts a new attempt if the run is waiting for one.
    ///
    /// Returns the attempt number, or `None` if the run has moved on (for
    /// example because its session was cancelled).
    pub fn begin_attempt(&self, session: SessionId, station: &str) -> Option<u32> {
        self.update(session, station, |run| {
            matches!(run.status, RunStatus::Pending | RunStatus::RetryScheduled)
                .then(|| run.begin_attempt())
        })
        .flatten()
    }

    /// Returns the session's runs keyed by station id.
    #[must_use]
    pub fn session_runs(&self, session: SessionId) -> BTreeMap<String, StationRun> {
        let Some(plan) = self.sessions.get(&session).map(|plan| plan.clone()) else {
            return BTreeMap::new();
        };

        plan.into_iter()
            .filter_map(|station| {
                let run = self.get(session, &station)?;
                Some((station, run))
            })
            .collect()
    }

    /// Drops the session's runs. Returns how many were dropped.
    pub fn release(&self, session: SessionId) -> usize {
        let Some((_, plan)) = self.sessions.remove(&session) else {
            return 0;
        };

        plan.iter()
            .filter(|station| self.runs.remove(&RunKey::new(session, station.as_str())).is_some())
            .count()
    }
}
