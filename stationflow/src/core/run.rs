//! Per-(session, station) run records.

use super::{RunStatus, SessionId};
use crate::errors::ProcessingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The lifecycle record of one station within one session.
///
/// Created once when the session opens and mutated in place across retry
/// attempts. Only the execution engine drives its transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRun {
    /// The owning session.
    pub session_id: SessionId,
    /// The station id.
    pub station_id: String,
    /// Current status.
    pub status: RunStatus,
    /// Number of attempts started so far.
    pub attempts: u32,
    /// The most recent attempt failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ProcessingError>,
    /// Why the run was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// When the run record was created.
    pub created_at: DateTime<Utc>,
    /// When the first attempt was dispatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the next attempt becomes eligible, while `RetryScheduled`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// When the run settled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StationRun {
    /// Creates a pending run.
    #[must_use]
    pub fn new(session_id: SessionId, station_id: impl Into<String>) -> Self {
        Self {
            session_id,
            station_id: station_id.into(),
            status: RunStatus::Pending,
            attempts: 0,
            last_error: None,
            skip_reason: None,
            created_at: Utc::now(),
            started_at: None,
            next_attempt_at: None,
            finished_at: None,
        }
    }

    /// Records the start of a new attempt and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        debug_assert!(matches!(
            self.status,
            RunStatus::Pending | RunStatus::RetryScheduled
        ));
        self.attempts += 1;
        self.status = RunStatus::Running;
        self.next_attempt_at = None;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.attempts
    }

    /// Marks the run as waiting out a backoff delay.
    pub fn schedule_retry(&mut self, next_attempt_at: DateTime<Utc>) {
        self.status = RunStatus::RetryScheduled;
        self.next_attempt_at = Some(next_attempt_at);
    }

    /// Marks the run succeeded.
    pub fn succeed(&mut self) {
        self.status = RunStatus::Succeeded;
        self.finish();
    }

    /// Marks the run terminally failed.
    pub fn fail(&mut self) {
        self.status = RunStatus::Failed;
        self.finish();
    }

    /// Marks the run skipped because of an upstream failure.
    pub fn skip(&mut self, reason: impl Into<String>) {
        debug_assert_eq!(self.status, RunStatus::Pending);
        self.status = RunStatus::Skipped;
        self.skip_reason = Some(reason.into());
        self.finish();
    }

    /// Marks the run cancelled.
    pub fn cancel(&mut self) {
        self.status = RunStatus::Cancelled;
        self.finish();
    }

    fn finish(&mut self) {
        self.next_attempt_at = None;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_is_pending() {
        let run = StationRun::new(SessionId::new(), "a");
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.attempts, 0);
        assert!(run.started_at.is_none());
    }

    #[test]
    fn test_attempts_accumulate_across_retries() {
        let mut run = StationRun::new(SessionId::new(), "a");

        assert_eq!(run.begin_attempt(), 1);
        let first_start = run.started_at;
        run.schedule_retry(Utc::now());
        assert_eq!(run.status, RunStatus::RetryScheduled);
        assert!(run.next_attempt_at.is_some());

        assert_eq!(run.begin_attempt(), 2);
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.next_attempt_at.is_none());
        assert_eq!(run.started_at, first_start);

        run.fail();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_skip_records_reason() {
        let mut run = StationRun::new(SessionId::new(), "b");
        run.skip("upstream station 'a' failed");

        assert_eq!(run.status, RunStatus::Skipped);
        assert_eq!(run.attempts, 0);
        assert_eq!(run.skip_reason.as_deref(), Some("upstream station 'a' failed"));
    }
}
