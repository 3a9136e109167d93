//! Event sink trait and implementations.

use crate::core::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, Level};

/// The transitions the engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A session was opened and planned.
    #[serde(rename = "session.started")]
    SessionStarted,
    /// A station attempt began executing.
    #[serde(rename = "station.started")]
    StationStarted,
    /// A station attempt succeeded and its output was stored.
    #[serde(rename = "station.succeeded")]
    StationSucceeded,
    /// A failed attempt will be retried after a backoff.
    #[serde(rename = "station.retry_scheduled")]
    StationRetryScheduled,
    /// A station failed terminally.
    #[serde(rename = "station.failed")]
    StationFailed,
    /// A station was skipped because an upstream station failed.
    #[serde(rename = "station.skipped")]
    StationSkipped,
    /// A station was cancelled with its session.
    #[serde(rename = "station.cancelled")]
    StationCancelled,
    /// A session reached its final status.
    #[serde(rename = "session.finished")]
    SessionFinished,
}

impl EventKind {
    /// Returns the dotted event name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStarted => "session.started",
            Self::StationStarted => "station.started",
            Self::StationSucceeded => "station.succeeded",
            Self::StationRetryScheduled => "station.retry_scheduled",
            Self::StationFailed => "station.failed",
            Self::StationSkipped => "station.skipped",
            Self::StationCancelled => "station.cancelled",
            Self::SessionFinished => "session.finished",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// What happened.
    pub kind: EventKind,
    /// The session it happened in.
    pub session_id: SessionId,
    /// The station, for station events.
    pub station_id: Option<String>,
    /// Extra detail (attempt numbers, errors, final status).
    pub data: Option<serde_json::Value>,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl EngineEvent {
    /// Creates a session-level event.
    #[must_use]
    pub fn session(kind: EventKind, session_id: SessionId) -> Self {
        Self {
            kind,
            session_id,
            station_id: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a station-level event.
    #[must_use]
    pub fn station(kind: EventKind, session_id: SessionId, station_id: impl Into<String>) -> Self {
        Self {
            station_id: Some(station_id.into()),
            ..Self::session(kind, session_id)
        }
    }

    /// Attaches event data.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Receives engine events.
///
/// Implementations must never panic or block.
pub trait EventSink: Send + Sync {
    /// Emits an event.
    fn emit(&self, event: EngineEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl EventSink for LoggingEventSink {
    fn emit(&self, event: EngineEvent) {
        let station = event.station_id.as_deref().unwrap_or("-");
        if self.level == Level::DEBUG {
            debug!(
                event_type = %event.kind,
                session_id = %event.session_id,
                station_id = station,
                event_data = ?event.data,
                "Event: {}", event.kind
            );
        } else {
            info!(
                event_type = %event.kind,
                session_id = %event.session_id,
                station_id = station,
                event_data = ?event.data,
                "Event: {}", event.kind
            );
        }
    }
}

/// A collecting event sink for tests and post-run inspection.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<EngineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.read().clone()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events of one kind.
    #[must_use]
    pub fn events_of_kind(&self, kind: EventKind) -> Vec<EngineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Returns the events of one session.
    #[must_use]
    pub fn session_events(&self, session: SessionId) -> Vec<EngineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.session_id == session)
            .cloned()
            .collect()
    }

    /// Returns the position of the first matching event, if any.
    #[must_use]
    pub fn position(&self, session: SessionId, kind: EventKind, station: &str) -> Option<usize> {
        self.events.read().iter().position(|e| {
            e.session_id == session && e.kind == kind && e.station_id.as_deref() == Some(station)
        })
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: EngineEvent) {
        self.events.write().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_noop_and_logging_sinks() {
        let session = SessionId::new();
        NoOpEventSink.emit(EngineEvent::session(EventKind::SessionStarted, session));
        LoggingEventSink::debug().emit(
            EngineEvent::station(EventKind::StationStarted, session, "a").with_data(json!({"attempt": 1})),
        );
        LoggingEventSink::info().emit(EngineEvent::session(EventKind::SessionFinished, session));
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(EventKind::StationRetryScheduled.to_string(), "station.retry_scheduled");
        assert_eq!(
            serde_json::to_value(EventKind::SessionFinished).unwrap(),
            json!("session.finished")
        );
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        let session = SessionId::new();
        let other = SessionId::new();
        assert!(sink.is_empty());

        sink.emit(EngineEvent::session(EventKind::SessionStarted, session));
        sink.emit(EngineEvent::station(EventKind::StationStarted, session, "a"));
        sink.emit(EngineEvent::station(EventKind::StationSucceeded, session, "a"));
        sink.emit(EngineEvent::station(EventKind::StationStarted, other, "a"));

        assert_eq!(sink.len(), 4);
        assert_eq!(sink.events_of_kind(EventKind::StationStarted).len(), 2);
        assert_eq!(sink.session_events(session).len(), 3);
        assert_eq!(sink.position(session, EventKind::StationSucceeded, "a"), Some(2));
        assert_eq!(sink.position(other, EventKind::StationSucceeded, "a"), None);

        sink.clear();
        assert!(sink.is_empty());
    }
}
