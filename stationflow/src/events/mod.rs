//! Engine events for observability.
//!
//! The engine reports every run-state transition to an [`EventSink`]. Sinks
//! must not block: they are called from the scheduling loop.

mod sink;

pub use sink::{CollectingEventSink, EngineEvent, EventKind, EventSink, LoggingEventSink, NoOpEventSink};
