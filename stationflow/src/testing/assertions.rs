//! Assertions over session results, events and reports.

use crate::core::{RunStatus, SessionId, SessionResult};
use crate::events::{CollectingEventSink, EventKind};
use crate::registry::StationRegistry;

/// Asserts that a station finished with the expected status.
pub fn assert_station_status(result: &SessionResult, station: &str, expected: RunStatus) {
    let actual = result.status_of(station);
    assert_eq!(
        actual,
        Some(expected),
        "Expected station '{}' to be {:?}, got {:?}",
        station,
        expected,
        actual
    );
}

/// Asserts that every started station started only after each of its
/// dependencies had succeeded in the same session.
pub fn assert_started_after_dependencies(
    events: &CollectingEventSink,
    registry: &StationRegistry,
    session: SessionId,
) {
    for station in registry.iter() {
        let Some(started) = events.position(session, EventKind::StationStarted, station.id()) else {
            continue;
        };
        for dep in station.dependencies() {
            let succeeded = events.position(session, EventKind::StationSucceeded, dep);
            assert!(
                succeeded.is_some_and(|at| at < started),
                "Station '{}' started at event {} before dependency '{}' succeeded ({:?})",
                station.id(),
                started,
                dep,
                succeeded
            );
        }
    }
}

/// Asserts that a rendered report carries the five section headings in order.
pub fn assert_report_sections_in_order(markdown: &str) {
    let mut cursor = 0;
    for heading in crate::report::SECTION_HEADINGS {
        let line = format!("## {heading}");
        let found = markdown[cursor..].find(&line);
        assert!(
            found.is_some(),
            "Expected section '{}' after byte {} of report:\n{}",
            heading,
            cursor,
            markdown
        );
        cursor += found.unwrap_or_default() + line.len();
    }
}
