//! Dependency resolution, retries and execution.
//!
//! This module provides:
//! - The dependency graph over a station registry
//! - Retry policies and the retry controller
//! - The execution engine and its run arena
//! - Per-session error aggregation

mod aggregator;
mod arena;
mod dag;
mod engine;
mod processor;
mod retry;


pub use aggregator::{ErrorAggregator, ErrorRecord};
pub use arena::{RunArena, RunKey};
pub use dag::DependencyGraph;
pub use engine::{ExecutionEngine, ExecutionEngineBuilder};
pub use processor::{ProcessingRequest, ProcessorSet, StationProcessor};
pub use retry::{JitterStrategy, RetryController, RetryDecision, RetryPolicy};
