//! Per-session accumulation of terminal failures.

use crate::core::SessionId;
use crate::errors::{ProcessingError, ProcessingErrorKind};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Record of a station that failed terminally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Station id.
    pub station_id: String,
    /// Classification of the final failure.
    pub kind: ProcessingErrorKind,
    /// Error message of the final failure.
    pub message: String,
    /// Attempts made when the failure became terminal.
    pub attempts: u32,
    /// When the failure became terminal.
    pub recorded_at: DateTime<Utc>,
}

impl ErrorRecord {
    /// Creates a new error record.
    #[must_use]
    pub fn new(station_id: impl Into<String>, error: &ProcessingError, attempts: u32) -> Self {
        Self {
            station_id: station_id.into(),
            kind: error.kind,
            message: error.message.clone(),
            attempts,
            recorded_at: Utc::now(),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.attempts == 1 { "attempt" } else { "attempts" };
        write!(
            f,
            "{} [{}] after {} {noun}: {}",
            self.station_id, self.kind, self.attempts, self.message
        )
    }
}

/// Collects error records per session.
///
/// Pure accumulation: recording never fails, and a session with no records
/// had no terminal failures.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    records: DashMap<SessionId, Vec<ErrorRecord>>,
}

impl ErrorAggregator {
    /// Creates a new aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record to the session.
    pub fn record(&self, session: SessionId, record: ErrorRecord) {
        self.records.entry(session).or_default().push(record);
    }

    /// Returns the session's records in the order they were recorded.
    #[must_use]
    pub fn list(&self, session: SessionId) -> Vec<ErrorRecord> {
        self.records
            .get(&session)
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Returns true if the session has any records.
    #[must_use]
    pub fn has_failures(&self, session: SessionId) -> bool {
        self.records
            .get(&session)
            .is_some_and(|records| !records.is_empty())
    }

    /// Drops the session's records. Returns how many were dropped.
    pub fn clear(&self, session: SessionId) -> usize {
        self.records
            .remove(&session)
            .map_or(0, |(_, records)| records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_record_creation() {
        let record = ErrorRecord::new("episode_analysis", &ProcessingError::failed("boom"), 3);

        assert_eq!(record.station_id, "episode_analysis");
        assert_eq!(record.kind, ProcessingErrorKind::Failed);
        assert_eq!(record.message, "boom");
        assert_eq!(record.attempts, 3);
        assert_eq!(record.to_string(), "episode_analysis [failed] after 3 attempts: boom");
    }

    #[test]
    fn test_single_attempt_display() {
        let record = ErrorRecord::new("a", &ProcessingError::timeout(10), 1);
        assert_eq!(
            record.to_string(),
            "a [timeout] after 1 attempt: attempt exceeded its 10ms deadline"
        );
    }

    #[test]
    fn test_aggregator_preserves_order() {
        let aggregator = ErrorAggregator::new();
        let session = SessionId::new();

        aggregator.record(session, ErrorRecord::new("b", &ProcessingError::failed("x"), 1));
        aggregator.record(session, ErrorRecord::new("a", &ProcessingError::failed("y"), 2));

        let records = aggregator.list(session);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].station_id, "b");
        assert_eq!(records[1].station_id, "a");
        assert!(aggregator.has_failures(session));
    }

    #[test]
    fn test_aggregator_sessions_are_isolated() {
        let aggregator = ErrorAggregator::new();
        let first = SessionId::new();
        let second = SessionId::new();

        aggregator.record(first, ErrorRecord::new("a", &ProcessingError::failed("x"), 1));

        assert!(aggregator.list(second).is_empty());
        assert!(!aggregator.has_failures(second));
    }

    #[test]
    fn test_aggregator_clear() {
        let aggregator = ErrorAggregator::new();
        let session = SessionId::new();
        aggregator.record(session, ErrorRecord::new("a", &ProcessingError::failed("x"), 1));

        assert_eq!(aggregator.clear(session), 1);
        assert!(aggregator.list(session).is_empty());
        assert_eq!(aggregator.clear(session), 0);
    }
}
