//! Testing utilities for stationflow sessions.
//!
//! This module provides:
//! - A scripted station processor that records calls
//! - Registry and payload fixtures for audio-drama pipelines
//! - Assertions over session results and engine events

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_report_sections_in_order, assert_started_after_dependencies, assert_station_status,
};
pub use fixtures::{
    drama_registry, episode, episodes_payload, fan_out_registry, fast_retry, linear_registry,
    DRAMA_CONFIG,
};
pub use mocks::{RecordedCall, ScriptStep, ScriptedProcessor};
