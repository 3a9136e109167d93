//! A scripted station processor for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::core::{Payload, SessionId};
use crate::errors::{ProcessingError, ProcessingErrorKind};
use crate::pipeline::{ProcessingRequest, StationProcessor};

/// One scripted reaction to a processing call.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Return the payload immediately.
    Succeed(Payload),
    /// Fail with the given kind and message.
    Fail(ProcessingErrorKind, String),
    /// Sleep, then return the payload.
    Sleep(Duration, Payload),
    /// Never complete.
    Hang,
}

impl ScriptStep {
    /// A `Failed` step with a message.
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(ProcessingErrorKind::Failed, message.into())
    }
}

/// A processing call as the processor saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// The session id.
    pub session_id: SessionId,
    /// The station id.
    pub station_id: String,
    /// The attempt number.
    pub attempt: u32,
    /// Ids of the dependency outputs that were supplied.
    pub input_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<ScriptStep>,
    fallback: Option<ScriptStep>,
}

/// Replays per-station scripts.
///
/// Each call pops the next step of its station's script. Once the script
/// runs out the station's fallback step is used, and without a fallback the
/// call succeeds with `{"station": <id>, "session": <session id>}`.
#[derive(Debug, Default)]
pub struct ScriptedProcessor {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<RecordedCall>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedProcessor {
    /// Creates a processor that succeeds for every station.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues steps for a station.
    #[must_use]
    pub fn with_script(self, station: &str, steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        self.scripts
            .lock()
            .entry(station.to_string())
            .or_default()
            .steps
            .extend(steps);
        self
    }

    /// Sets the step used once a station's script is exhausted.
    #[must_use]
    pub fn with_fallback(self, station: &str, step: ScriptStep) -> Self {
        self.scripts.lock().entry(station.to_string()).or_default().fallback = Some(step);
        self
    }

    /// Makes every call for a station use the same step.
    #[must_use]
    pub fn always(self, station: &str, step: ScriptStep) -> Self {
        self.with_fallback(station, step)
    }

    /// Returns every recorded call in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the recorded calls for one station.
    #[must_use]
    pub fn calls_for(&self, station: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.station_id == station)
            .cloned()
            .collect()
    }

    /// Returns how many times a station was called.
    #[must_use]
    pub fn call_count(&self, station: &str) -> usize {
        self.calls.lock().iter().filter(|call| call.station_id == station).count()
    }

    /// Returns the highest number of calls that were in progress at once.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_step(&self, station: &str) -> Option<ScriptStep> {
        let mut scripts = self.scripts.lock();
        let script = scripts.get_mut(station)?;
        script.steps.pop_front().or_else(|| script.fallback.clone())
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StationProcessor for ScriptedProcessor {
    async fn process(&self, request: ProcessingRequest) -> Result<Payload, ProcessingError> {
        self.calls.lock().push(RecordedCall {
            session_id: request.session_id,
            station_id: request.station_id.clone(),
            attempt: request.attempt,
            input_ids: request.inputs.keys().cloned().collect(),
        });

        let current = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        let _active = ActiveGuard(&self.active);

        let step = self.next_step(&request.station_id).unwrap_or_else(|| {
            ScriptStep::Succeed(json!({
                "station": request.station_id,
                "session": request.session_id,
            }))
        });

        match step {
            ScriptStep::Succeed(payload) => Ok(payload),
            ScriptStep::Fail(kind, message) => Err(ProcessingError::new(kind, message)),
            ScriptStep::Sleep(delay, payload) => {
                tokio::time::sleep(delay).await;
                Ok(payload)
            }
            ScriptStep::Hang => futures::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StationType;
    use std::collections::BTreeMap;

    fn request(station: &str, attempt: u32) -> ProcessingRequest {
        ProcessingRequest {
            session_id: SessionId::new(),
            station_id: station.to_string(),
            station_type: StationType::Analysis,
            attempt,
            inputs: BTreeMap::new(),
            bounds: None,
        }
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let processor = ScriptedProcessor::new()
            .with_script("a", [ScriptStep::fail("first"), ScriptStep::Succeed(json!(1))])
            .with_fallback("a", ScriptStep::Succeed(json!("later")));

        let first = processor.process(request("a", 1)).await.unwrap_err();
        assert_eq!(first.kind, ProcessingErrorKind::Failed);
        assert_eq!(processor.process(request("a", 2)).await.unwrap(), json!(1));
        assert_eq!(processor.process(request("a", 3)).await.unwrap(), json!("later"));
        assert_eq!(processor.process(request("a", 4)).await.unwrap(), json!("later"));
        assert_eq!(processor.call_count("a"), 4);
    }

    #[tokio::test]
    async fn test_default_payload_names_station_and_session() {
        let processor = ScriptedProcessor::new();
        let req = request("b", 1);
        let session = req.session_id;

        let payload = processor.process(req).await.unwrap();
        assert_eq!(payload, json!({"station": "b", "session": session}));
        assert_eq!(processor.calls_for("b")[0].attempt, 1);
    }

    #[tokio::test]
    async fn test_peak_concurrency() {
        let processor = std::sync::Arc::new(
            ScriptedProcessor::new().always("slow", ScriptStep::Sleep(Duration::from_millis(30), json!(null))),
        );

        let calls = (0..3).map(|n| {
            let processor = processor.clone();
            async move { processor.process(request("slow", n)).await }
        });
        futures::future::join_all(calls).await;

        assert_eq!(processor.peak_concurrency(), 3);
        assert_eq!(processor.calls().len(), 3);
    }
}
