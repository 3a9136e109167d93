//! The station processing seam.
//!
//! Processing is an external collaborator: the engine hands a processor the
//! outputs of a station's dependencies and gets back a payload or a
//! [`ProcessingError`]. One processor is bound per [`StationType`].

use crate::core::{Payload, SessionId, StationType};
use crate::errors::ProcessingError;
use crate::registry::OutputBounds;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Everything a processor receives for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingRequest {
    /// The session the attempt belongs to.
    pub session_id: SessionId,
    /// The station being processed.
    pub station_id: String,
    /// The station's type.
    pub station_type: StationType,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Dependency outputs keyed by dependency station id.
    pub inputs: BTreeMap<String, Payload>,
    /// Validated output-length bounds, when the station declares a tier.
    pub bounds: Option<OutputBounds>,
}

impl ProcessingRequest {
    /// Returns a dependency's output.
    #[must_use]
    pub fn input(&self, station_id: &str) -> Option<&Payload> {
        self.inputs.get(station_id)
    }
}

/// Performs the work of a station.
///
/// Implementations may be slow or unreliable; the engine applies the
/// per-attempt timeout and retry policy around every call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StationProcessor: Send + Sync {
    /// Processes one attempt.
    async fn process(&self, request: ProcessingRequest) -> Result<Payload, ProcessingError>;
}

/// One processor per station type.
#[derive(Clone)]
pub struct ProcessorSet {
    analysis: Arc<dyn StationProcessor>,
    generation: Arc<dyn StationProcessor>,
    enhancement: Arc<dyn StationProcessor>,
    validation: Arc<dyn StationProcessor>,
}

impl ProcessorSet {
    /// Creates a set from one processor per type.
    pub fn new(
        analysis: Arc<dyn StationProcessor>,
        generation: Arc<dyn StationProcessor>,
        enhancement: Arc<dyn StationProcessor>,
        validation: Arc<dyn StationProcessor>,
    ) -> Self {
        Self {
            analysis,
            generation,
            enhancement,
            validation,
        }
    }

    /// Uses the same processor for every station type.
    pub fn uniform(processor: Arc<dyn StationProcessor>) -> Self {
        Self {
            analysis: processor.clone(),
            generation: processor.clone(),
            enhancement: processor.clone(),
            validation: processor,
        }
    }

    /// Returns the processor bound to a station type.
    #[must_use]
    pub fn for_type(&self, station_type: StationType) -> &Arc<dyn StationProcessor> {
        match station_type {
            StationType::Analysis => &self.analysis,
            StationType::Generation => &self.generation,
            StationType::Enhancement => &self.enhancement,
            StationType::Validation => &self.validation,
        }
    }
}

impl fmt::Debug for ProcessorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorSet").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(station_type: StationType) -> ProcessingRequest {
        ProcessingRequest {
            session_id: SessionId::new(),
            station_id: "a".to_string(),
            station_type,
            attempt: 1,
            inputs: BTreeMap::from([("dep".to_string(), json!({"ok": true}))]),
            bounds: None,
        }
    }

    #[tokio::test]
    async fn test_for_type_dispatches_by_station_type() {
        let mut analysis = MockStationProcessor::new();
        analysis
            .expect_process()
            .withf(|req| req.station_type == StationType::Analysis)
            .times(1)
            .returning(|_| Ok(json!("analysis")));

        let mut other = MockStationProcessor::new();
        other
            .expect_process()
            .times(1)
            .returning(|req| Ok(json!(req.station_type.to_string())));
        let other: Arc<dyn StationProcessor> = Arc::new(other);

        let set = ProcessorSet::new(Arc::new(analysis), other.clone(), other.clone(), other);

        let out = set
            .for_type(StationType::Analysis)
            .process(request(StationType::Analysis))
            .await
            .unwrap();
        assert_eq!(out, json!("analysis"));

        let out = set
            .for_type(StationType::Validation)
            .process(request(StationType::Validation))
            .await
            .unwrap();
        assert_eq!(out, json!(StationType::Validation.to_string()));
    }

    #[test]
    fn test_request_input_lookup() {
        let req = request(StationType::Analysis);
        assert_eq!(req.input("dep"), Some(&json!({"ok": true})));
        assert!(req.input("missing").is_none());
    }
}
