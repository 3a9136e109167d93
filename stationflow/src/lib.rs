//! # Stationflow
//!
//! A dependency-aware orchestrator for station pipelines that analyse audio
//! drama productions.
//!
//! Stationflow provides:
//!
//! - **Station registry**: validated station definitions with dependencies,
//!   retry policies and output bounds
//! - **Dependency resolution**: cycle detection, topological planning and
//!   readiness checks
//! - **Concurrent execution**: a shared worker pool, per-attempt deadlines and
//!   bounded retries with backoff
//! - **Partial-failure isolation**: failed stations skip only their dependents
//! - **Report synthesis**: a five-section Markdown report built from the
//!   outputs a session produced
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stationflow::prelude::*;
//!
//! let config = OrchestratorConfig::from_file("stations.json")?;
//! let registry = Arc::new(config.build_registry()?);
//! let engine = ExecutionEngine::builder(registry, ProcessorSet::uniform(processor))
//!     .config(config.engine.clone())
//!     .build()?;
//!
//! let result = engine.run(Session::all()).await?;
//! let report = ReportSynthesizer::new(config.report.clone())
//!     .synthesize(&result, engine.store().as_ref())
//!     .await?;
//! println!("{report}");
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{EngineConfig, LoggingConfig, OrchestratorConfig};
    pub use crate::core::{
        Payload, RunStatus, Session, SessionId, SessionResult, SessionStatus, StationRun,
        StationType,
    };
    pub use crate::errors::{
        ConfigurationError, CycleDetectedError, ProcessingError, ProcessingErrorKind,
        StationflowError, StoreError,
    };
    pub use crate::events::{
        CollectingEventSink, EngineEvent, EventKind, EventSink, LoggingEventSink, NoOpEventSink,
    };
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        DependencyGraph, ErrorAggregator, ErrorRecord, ExecutionEngine, ProcessingRequest,
        ProcessorSet, RetryPolicy, StationProcessor,
    };
    pub use crate::registry::{
        ComplexityTier, OutputBounds, Station, StationDefinition, StationRegistry,
    };
    pub use crate::report::{AnalysisReport, ReportSynthesizer, ReportThresholds};
    pub use crate::store::{FileStateStore, InMemoryStateStore, StateStore};
}
