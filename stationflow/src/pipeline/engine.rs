//! The execution engine.
//!
//! The engine drives one session at a time per `run` call, but every session
//! running on the same engine shares its worker pool, run arena, state store
//! and error aggregator. Each attempt is a spawned task: it waits out its
//! backoff delay, takes a worker permit, reads its inputs from the store and
//! calls the station's processor under the per-attempt deadline. The session
//! loop owns every run transition and reacts to attempt completions one at a
//! time, so a (session, station) pair never has more than one attempt in
//! flight.

use super::aggregator::{ErrorAggregator, ErrorRecord};
use super::arena::RunArena;
use super::dag::DependencyGraph;
use super::processor::{ProcessingRequest, ProcessorSet, StationProcessor};
use super::retry::{RetryController, RetryDecision};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::core::{
    Payload, RunStatus, Session, SessionId, SessionResult, SessionStatus, StationRun, StationType,
};
use crate::errors::{ConfigurationError, ProcessingError, ProcessingErrorKind, StationflowError};
use crate::events::{EngineEvent, EventKind, EventSink, NoOpEventSink};
use crate::registry::{OutputBounds, Station, StationRegistry};
use crate::store::{InMemoryStateStore, StateStore};
use chrono::Utc;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinError};
use tracing::{debug, info, instrument, warn};

/// Drives sessions through the station graph.
pub struct ExecutionEngine {
    registry: Arc<StationRegistry>,
    graph: DependencyGraph,
    processors: Arc<ProcessorSet>,
    store: Arc<dyn StateStore>,
    errors: Arc<ErrorAggregator>,
    retry: RetryController,
    config: EngineConfig,
    workers: Arc<Semaphore>,
    arena: Arc<RunArena>,
    sessions: DashMap<SessionId, Arc<CancellationToken>>,
    events: Arc<dyn EventSink>,
}

/// Builder for [`ExecutionEngine`].
pub struct ExecutionEngineBuilder {
    registry: Arc<StationRegistry>,
    processors: ProcessorSet,
    store: Option<Arc<dyn StateStore>>,
    errors: Option<Arc<ErrorAggregator>>,
    events: Option<Arc<dyn EventSink>>,
    config: EngineConfig,
    retry: RetryController,
}

impl ExecutionEngineBuilder {
    /// Uses the given state store instead of a fresh in-memory one.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses the given error aggregator.
    #[must_use]
    pub fn errors(mut self, errors: Arc<ErrorAggregator>) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Reports lifecycle events to the given sink.
    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the retry controller.
    #[must_use]
    pub fn retry_controller(mut self, retry: RetryController) -> Self {
        self.retry = retry;
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine configuration is invalid.
    pub fn build(self) -> Result<ExecutionEngine, ConfigurationError> {
        self.config.validate()?;

        Ok(ExecutionEngine {
            graph: DependencyGraph::new(&self.registry),
            registry: self.registry,
            processors: Arc::new(self.processors),
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryStateStore::new())),
            errors: self.errors.unwrap_or_default(),
            retry: self.retry,
            workers: Arc::new(Semaphore::new(self.config.max_concurrency)),
            config: self.config,
            arena: Arc::new(RunArena::new()),
            sessions: DashMap::new(),
            events: self.events.unwrap_or_else(|| Arc::new(NoOpEventSink)),
        })
    }
}

impl ExecutionEngine {
    /// Starts building an engine for a registry.
    pub fn builder(registry: Arc<StationRegistry>, processors: ProcessorSet) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder {
            registry,
            processors,
            store: None,
            errors: None,
            events: None,
            config: EngineConfig::default(),
            retry: RetryController::new(),
        }
    }

    /// Returns the station registry.
    #[must_use]
    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }

    /// Returns the dependency graph.
    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Returns the state store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Returns the error aggregator.
    #[must_use]
    pub fn errors(&self) -> &Arc<ErrorAggregator> {
        &self.errors
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drives a session to a fixed point.
    ///
    /// Station failures never abort the session: they are retried, then
    /// recorded, and their dependents are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the request names an unknown station or the
    /// session id was already used on this engine.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub async fn run(&self, session: Session) -> Result<SessionResult, StationflowError> {
        let started = Instant::now();
        let session_id = session.id;
        let plan = self.graph.plan(&session.requested)?;

        self.arena.open(session_id, &plan)?;
        let token = Arc::new(CancellationToken::new());
        self.sessions.insert(session_id, token.clone());
        let _active = ActiveSession {
            sessions: &self.sessions,
            session_id,
        };

        info!(stations = plan.len(), "Session started");
        self.emit(
            EngineEvent::session(EventKind::SessionStarted, session_id).with_data(json!({ "plan": plan })),
        );

        let cancelled = self.drive(session_id, &plan, &token).await?;

        let runs = self.arena.session_runs(session_id);
        let status = SessionStatus::derive(runs.values().map(|run| run.status), cancelled);
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(status = %status, duration_ms, "Session finished");
        self.emit(
            EngineEvent::session(EventKind::SessionFinished, session_id)
                .with_data(json!({ "status": status, "duration_ms": duration_ms })),
        );

        Ok(SessionResult {
            session_id,
            status,
            plan,
            runs,
            errors: self.errors.list(session_id),
            duration_ms,
        })
    }

    /// Requests cancellation of a running session.
    ///
    /// Returns false if the session is not running or was already cancelled.
    pub fn cancel(&self, session_id: SessionId) -> bool {
        let token = self.sessions.get(&session_id).map(|token| token.clone());
        token.is_some_and(|token| token.cancel("cancelled by caller"))
    }

    /// Returns true while the session's `run` call is in progress.
    #[must_use]
    pub fn is_active(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Returns a copy of one station's run record.
    #[must_use]
    pub fn run_state(&self, session_id: SessionId, station_id: &str) -> Option<StationRun> {
        self.arena.get(session_id, station_id)
    }

    /// Returns the session's run records keyed by station id.
    #[must_use]
    pub fn session_runs(&self, session_id: SessionId) -> BTreeMap<String, StationRun> {
        self.arena.session_runs(session_id)
    }

    /// Reclaims everything held for a finished session: run records, error
    /// records and stored outputs. The engine never calls this itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is still running or the store fails.
    pub async fn release_session(&self, session_id: SessionId) -> Result<(), StationflowError> {
        if self.is_active(session_id) {
            return Err(StationflowError::Internal(format!(
                "session {session_id} is still running"
            )));
        }

        let runs = self.arena.release(session_id);
        let errors = self.errors.clear(session_id);
        let outputs = self.store.purge_session(session_id).await?;
        debug!(session_id = %session_id, runs, errors, outputs, "Released session");
        Ok(())
    }

    /// Runs the scheduling loop. Returns true if the session was cancelled.
    async fn drive(
        &self,
        session_id: SessionId,
        plan: &[String],
        token: &CancellationToken,
    ) -> Result<bool, StationflowError> {
        let mut flight = InFlight::default();

        loop {
            if token.is_cancelled() {
                break;
            }

            let runnable = self
                .graph
                .runnable(plan, |id| self.arena.status(session_id, id));
            for id in runnable {
                if flight.contains(&id) {
                    continue;
                }
                let station = self.station(&id)?;
                self.dispatch(session_id, station, Duration::ZERO, &mut flight);
            }

            if flight.is_empty() {
                break;
            }

            let completion = tokio::select! {
                biased;
                () = token.cancelled() => None,
                Some(done) = flight.next() => Some(done),
            };
            let Some(done) = completion else {
                break;
            };
            flight.finish(&done.station_id);
            self.settle(session_id, plan, done, &mut flight).await?;
        }

        if token.is_cancelled() {
            flight.abort_all();
            self.cancel_unsettled(session_id, plan, token.reason().as_deref());
            return Ok(true);
        }

        self.skip_stranded(session_id, plan);
        Ok(false)
    }

    fn station(&self, id: &str) -> Result<&Station, StationflowError> {
        self.registry
            .get(id)
            .ok_or_else(|| StationflowError::Internal(format!("planned station '{id}' is not registered")))
    }

    fn dispatch(&self, session_id: SessionId, station: &Station, delay: Duration, flight: &mut InFlight) {
        let attempt = Attempt {
            session_id,
            station_id: station.id().to_string(),
            station_type: station.station_type(),
            bounds: station.output_bounds(),
            dependencies: station.dependencies().iter().cloned().collect(),
            delay,
            timeout: self.config.attempt_timeout(),
            processor: self.processors.for_type(station.station_type()).clone(),
            store: self.store.clone(),
            workers: self.workers.clone(),
            arena: self.arena.clone(),
            events: self.events.clone(),
        };

        debug!(
            session_id = %session_id,
            station = station.id(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Dispatching attempt"
        );
        flight.spawn(station.id().to_string(), attempt.execute());
    }

    async fn settle(
        &self,
        session_id: SessionId,
        plan: &[String],
        done: AttemptCompletion,
        flight: &mut InFlight,
    ) -> Result<(), StationflowError> {
        let station = self.station(&done.station_id)?;

        let error = match done.outcome {
            AttemptOutcome::Abandoned => return Ok(()),
            AttemptOutcome::Finished(Ok(payload)) => {
                match self.store.put(session_id, station.id(), payload).await {
                    Ok(()) => {
                        self.mark_succeeded(session_id, station.id());
                        return Ok(());
                    }
                    Err(err) => ProcessingError::new(ProcessingErrorKind::Storage, err.to_string()),
                }
            }
            AttemptOutcome::Finished(Err(error)) => error,
        };

        self.handle_failure(session_id, plan, station, &error, flight);
        Ok(())
    }

    fn mark_succeeded(&self, session_id: SessionId, station_id: &str) {
        let attempts = self
            .arena
            .update(session_id, station_id, |run| {
                run.succeed();
                run.attempts
            })
            .unwrap_or_default();

        info!(session_id = %session_id, station = station_id, attempt = attempts, "Station succeeded");
        self.emit(
            EngineEvent::station(EventKind::StationSucceeded, session_id, station_id)
                .with_data(json!({ "attempts": attempts })),
        );
    }

    fn handle_failure(
        &self,
        session_id: SessionId,
        plan: &[String],
        station: &Station,
        error: &ProcessingError,
        flight: &mut InFlight,
    ) {
        let outcome = self.arena.update(session_id, station.id(), |run| {
            let decision = self.retry.on_failure(run, station.retry(), error);
            match decision {
                RetryDecision::Retry(delay) => {
                    let wait = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
                    run.schedule_retry(Utc::now() + wait);
                }
                RetryDecision::Terminal => run.fail(),
            }
            (decision, run.attempts)
        });
        let Some((decision, attempts)) = outcome else {
            return;
        };

        match decision {
            RetryDecision::Retry(delay) => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                warn!(
                    session_id = %session_id,
                    station = station.id(),
                    attempt = attempts,
                    delay_ms,
                    error = %error,
                    "Attempt failed; retry scheduled"
                );
                self.emit(
                    EngineEvent::station(EventKind::StationRetryScheduled, session_id, station.id()).with_data(
                        json!({ "attempt": attempts, "delay_ms": delay_ms, "error": error.to_string() }),
                    ),
                );
                self.dispatch(session_id, station, delay, flight);
            }
            RetryDecision::Terminal => {
                warn!(
                    session_id = %session_id,
                    station = station.id(),
                    attempts,
                    error = %error,
                    "Station failed terminally"
                );
                self.errors
                    .record(session_id, ErrorRecord::new(station.id(), error, attempts));
                self.emit(
                    EngineEvent::station(EventKind::StationFailed, session_id, station.id()).with_data(
                        json!({ "attempts": attempts, "kind": error.kind, "error": error.message }),
                    ),
                );
                self.skip_dependents(session_id, plan, station.id());
            }
        }
    }

    fn skip_dependents(&self, session_id: SessionId, plan: &[String], failed: &str) {
        let dependents = self.graph.transitive_dependents(failed);
        let reason = format!("upstream station '{failed}' failed");

        for id in plan.iter().filter(|id| dependents.contains(*id)) {
            let skipped = self.arena.update(session_id, id, |run| {
                if run.status == RunStatus::Pending {
                    run.skip(reason.as_str());
                    true
                } else {
                    false
                }
            });
            if skipped == Some(true) {
                info!(session_id = %session_id, station = %id, reason = %reason, "Station skipped");
                self.emit(
                    EngineEvent::station(EventKind::StationSkipped, session_id, id.as_str())
                        .with_data(json!({ "reason": reason })),
                );
            }
        }
    }

    fn cancel_unsettled(&self, session_id: SessionId, plan: &[String], reason: Option<&str>) {
        for id in plan {
            let cancelled = self.arena.update(session_id, id, |run| {
                if run.status.is_settled() {
                    false
                } else {
                    run.cancel();
                    true
                }
            });
            if cancelled == Some(true) {
                debug!(session_id = %session_id, station = %id, "Station cancelled");
                self.emit(EngineEvent::station(EventKind::StationCancelled, session_id, id.as_str()));
            }
        }
        info!(session_id = %session_id, reason = reason.unwrap_or_default(), "Session cancelled");
    }

    /// Runs still pending when nothing is in flight can never become runnable.
    fn skip_stranded(&self, session_id: SessionId, plan: &[String]) {
        for id in plan {
            if self.arena.status(session_id, id) != Some(RunStatus::Pending) {
                continue;
            }
            let reason = self.stranded_reason(session_id, id);
            let stranded = self.arena.update(session_id, id, |run| {
                if run.status == RunStatus::Pending {
                    run.skip(reason.as_str());
                    true
                } else {
                    false
                }
            });
            if stranded == Some(true) {
                warn!(session_id = %session_id, station = %id, reason = %reason, "Pending station stranded at fixed point");
                self.emit(
                    EngineEvent::station(EventKind::StationSkipped, session_id, id.as_str())
                        .with_data(json!({ "reason": reason })),
                );
            }
        }
    }

    /// Names the first dependency that can no longer succeed.
    fn stranded_reason(&self, session_id: SessionId, station_id: &str) -> String {
        self.graph
            .dependencies(station_id)
            .into_iter()
            .flatten()
            .find_map(|dep| {
                self.arena
                    .status(session_id, dep)
                    .filter(RunStatus::blocks_dependents)
                    .map(|status| format!("dependency '{dep}' is {status}"))
            })
            .unwrap_or_else(|| "dependencies never succeeded".to_string())
    }

    fn emit(&self, event: EngineEvent) {
        self.events.emit(event);
    }
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("stations", &self.registry.len())
            .field("config", &self.config)
            .field("active_sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

/// Unregisters a session's cancellation token when its `run` call ends.
struct ActiveSession<'a> {
    sessions: &'a DashMap<SessionId, Arc<CancellationToken>>,
    session_id: SessionId,
}

impl Drop for ActiveSession<'_> {
    fn drop(&mut self) {
        self.sessions.remove(&self.session_id);
    }
}

/// The attempts a session loop is waiting on.
#[derive(Default)]
struct InFlight {
    tasks: FuturesUnordered<BoxFuture<'static, AttemptCompletion>>,
    handles: HashMap<String, AbortHandle>,
}

impl InFlight {
    fn spawn<F>(&mut self, station_id: String, attempt: F)
    where
        F: Future<Output = AttemptCompletion> + Send + 'static,
    {
        let handle = tokio::spawn(attempt);
        self.handles.insert(station_id.clone(), handle.abort_handle());
        self.tasks.push(
            async move {
                match handle.await {
                    Ok(done) => done,
                    Err(err) => AttemptCompletion::from_join_error(station_id, &err),
                }
            }
            .boxed(),
        );
    }

    fn contains(&self, station_id: &str) -> bool {
        self.handles.contains_key(station_id)
    }

    fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    async fn next(&mut self) -> Option<AttemptCompletion> {
        self.tasks.next().await
    }

    fn finish(&mut self, station_id: &str) {
        self.handles.remove(station_id);
    }

    fn abort_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.abort_all();
    }
}

struct AttemptCompletion {
    station_id: String,
    outcome: AttemptOutcome,
}

enum AttemptOutcome {
    Finished(Result<Payload, ProcessingError>),
    /// The run moved on before the attempt started, or the task was aborted.
    Abandoned,
}

impl AttemptCompletion {
    fn abandoned(station_id: String) -> Self {
        Self {
            station_id,
            outcome: AttemptOutcome::Abandoned,
        }
    }

    fn from_join_error(station_id: String, err: &JoinError) -> Self {
        if err.is_cancelled() {
            return Self::abandoned(station_id);
        }
        Self {
            station_id,
            outcome: AttemptOutcome::Finished(Err(ProcessingError::new(
                ProcessingErrorKind::Crashed,
                format!("attempt task panicked: {err}"),
            ))),
        }
    }
}

/// Everything a spawned attempt needs, owned so the task is `'static`.
struct Attempt {
    session_id: SessionId,
    station_id: String,
    station_type: StationType,
    bounds: Option<OutputBounds>,
    dependencies: Vec<String>,
    delay: Duration,
    timeout: Duration,
    processor: Arc<dyn StationProcessor>,
    store: Arc<dyn StateStore>,
    workers: Arc<Semaphore>,
    arena: Arc<RunArena>,
    events: Arc<dyn EventSink>,
}

impl Attempt {
    async fn execute(self) -> AttemptCompletion {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let Ok(_permit) = self.workers.acquire().await else {
            return AttemptCompletion::abandoned(self.station_id);
        };
        let Some(attempt) = self.arena.begin_attempt(self.session_id, &self.station_id) else {
            return AttemptCompletion::abandoned(self.station_id);
        };

        debug!(session_id = %self.session_id, station = %self.station_id, attempt, "Attempt started");
        self.events.emit(
            EngineEvent::station(EventKind::StationStarted, self.session_id, self.station_id.as_str())
                .with_data(json!({ "attempt": attempt })),
        );

        let result = self.process(attempt).await;
        AttemptCompletion {
            station_id: self.station_id,
            outcome: AttemptOutcome::Finished(result),
        }
    }

    async fn process(&self, attempt: u32) -> Result<Payload, ProcessingError> {
        let request = ProcessingRequest {
            session_id: self.session_id,
            station_id: self.station_id.clone(),
            station_type: self.station_type,
            attempt,
            inputs: self.gather_inputs().await?,
            bounds: self.bounds,
        };

        match tokio::time::timeout(self.timeout, self.processor.process(request)).await {
            Ok(result) => result,
            Err(_) => Err(ProcessingError::timeout(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    async fn gather_inputs(&self) -> Result<BTreeMap<String, Payload>, ProcessingError> {
        let mut inputs = BTreeMap::new();
        for dep in &self.dependencies {
            let payload = self.store.get(self.session_id, dep).await.map_err(|err| {
                ProcessingError::new(
                    ProcessingErrorKind::MissingInput,
                    format!("output of dependency '{dep}' is unavailable: {err}"),
                )
            })?;
            inputs.insert(dep.clone(), payload);
        }
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processor::MockStationProcessor;
    use crate::registry::StationDefinition;

    fn registry() -> Arc<StationRegistry> {
        Arc::new(
            StationRegistry::from_definitions([
                StationDefinition::new("a", StationType::Analysis),
                StationDefinition::new("b", StationType::Analysis).with_dependency("a"),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let processor: Arc<dyn StationProcessor> = Arc::new(MockStationProcessor::new());
        let err = ExecutionEngine::builder(registry(), ProcessorSet::uniform(processor))
            .config(EngineConfig::default().with_max_concurrency(0))
            .build()
            .unwrap_err();
        assert_eq!(err.code(), Some("CONFIG-INVALID-ENGINE"));
    }

    #[tokio::test]
    async fn test_dependency_outputs_reach_processor() {
        let mut mock = MockStationProcessor::new();
        mock.expect_process()
            .withf(|req| req.station_id == "a" && req.inputs.is_empty())
            .times(1)
            .returning(|_| Ok(json!({"episodes": 3})));
        mock.expect_process()
            .withf(|req| req.station_id == "b" && req.input("a") == Some(&json!({"episodes": 3})))
            .times(1)
            .returning(|_| Ok(json!("done")));

        let engine = ExecutionEngine::builder(registry(), ProcessorSet::uniform(Arc::new(mock)))
            .build()
            .unwrap();
        let result = engine.run(Session::all()).await.unwrap();

        assert_eq!(result.status, SessionStatus::Complete);
        assert_eq!(result.plan, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            engine.store().get(result.session_id, "b").await.unwrap(),
            json!("done")
        );
        assert!(!engine.is_active(result.session_id));
    }

    #[tokio::test]
    async fn test_rerunning_session_id_is_rejected() {
        let mut mock = MockStationProcessor::new();
        mock.expect_process().returning(|_| Ok(json!(null)));
        let engine = ExecutionEngine::builder(registry(), ProcessorSet::uniform(Arc::new(mock)))
            .build()
            .unwrap();

        let session = Session::all();
        let id = session.id;
        engine.run(session).await.unwrap();

        let err = engine.run(Session::with_id(id, Vec::<String>::new())).await.unwrap_err();
        assert!(matches!(err, StationflowError::SessionExists(existing) if existing == id));

        engine.release_session(id).await.unwrap();
        assert!(engine.session_runs(id).is_empty());
        engine.run(Session::with_id(id, Vec::<String>::new())).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_station_request() {
        let mock = MockStationProcessor::new();
        let engine = ExecutionEngine::builder(registry(), ProcessorSet::uniform(Arc::new(mock)))
            .build()
            .unwrap();

        let err = engine.run(Session::new(["nope"])).await.unwrap_err();
        assert!(matches!(err, StationflowError::Configuration(_)));
    }

    #[test]
    fn test_stranded_runs_name_blocking_dependency() {
        let mock = MockStationProcessor::new();
        let engine = ExecutionEngine::builder(registry(), ProcessorSet::uniform(Arc::new(mock)))
            .build()
            .unwrap();
        let session = SessionId::new();
        let plan = vec!["a".to_string(), "b".to_string()];
        engine.arena.open(session, &plan).unwrap();
        engine.arena.update(session, "a", StationRun::cancel);

        engine.skip_stranded(session, &plan);

        let b = engine.run_state(session, "b").unwrap();
        assert_eq!(b.status, RunStatus::Skipped);
        assert_eq!(b.skip_reason.as_deref(), Some("dependency 'a' is cancelled"));
        assert_eq!(engine.run_state(session, "a").unwrap().status, RunStatus::Cancelled);
    }

    struct PanickingProcessor;

    #[async_trait::async_trait]
    impl StationProcessor for PanickingProcessor {
        async fn process(&self, _request: ProcessingRequest) -> Result<Payload, ProcessingError> {
            panic!("processor exploded")
        }
    }

    #[tokio::test]
    async fn test_panicking_processor_is_a_crash() {
        let registry = Arc::new(
            StationRegistry::from_definitions([StationDefinition::new("a", StationType::Analysis)
                .with_retry(crate::pipeline::RetryPolicy::no_retry())])
            .unwrap(),
        );
        let engine = ExecutionEngine::builder(registry, ProcessorSet::uniform(Arc::new(PanickingProcessor)))
            .build()
            .unwrap();
        let result = engine.run(Session::all()).await.unwrap();

        assert_eq!(result.status, SessionStatus::Partial);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ProcessingErrorKind::Crashed);
        assert_eq!(result.errors[0].attempts, 1);
    }
}
