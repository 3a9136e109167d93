//! Core domain model types for stationflow.
//!
//! This module contains the fundamental types used throughout the orchestrator:
//! - Station type and run/session status enums
//! - Per-(session, station) run records
//! - Session identity, requests and results

mod run;
mod session;
mod status;

pub use run::StationRun;
pub use session::{Session, SessionId, SessionResult};
pub use status::{RunStatus, SessionStatus, StationType};

/// A station's structured output.
pub type Payload = serde_json::Value;
