use crate::application::capability_registry::CapabilityRegistry;
use crate::application::definition_store::WorkflowDefinitionStore;
use crate::application::recommendation_service::RecommendationService;
use crate::domain::events::{RequestCompleted, RequestFailed, RequestReceived};
use crate::domain::request::{WorkflowRequest, WorkflowRun};
use crate::domain::workflow::{StepId, WorkflowDefinition};
use crate::{ActionContext, Clock, CoreError, DataPacket, NotificationSink};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

/// Weight applied to a new sample when folding it into the step-timing
/// exponential moving average
const TIMING_SAMPLE_WEIGHT: f64 = 0.2;

/// Exponential moving average of wall-clock durations for one
/// `(capability, action)` pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepTiming {
    /// Smoothed duration in milliseconds
    pub average_ms: f64,

    /// Number of samples folded in
    pub samples: u64,
}

/// Aggregate executor counters and gauges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutorStats {
    /// Requests accepted for admission
    pub submitted: u64,

    /// Requests that completed successfully
    pub completed: u64,

    /// Requests that failed or timed out
    pub failed: u64,

    /// Requests cancelled before completion
    pub cancelled: u64,

    /// Requests rejected because the queue was full
    pub rejected: u64,

    /// Requests currently running
    pub active: usize,

    /// Requests currently queued
    pub queued: usize,
}

/// Result of a completed workflow run
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    /// The request in its terminal state
    pub request: WorkflowRequest,

    /// Aggregated step results; empty unless the run completed
    pub step_results: HashMap<StepId, DataPacket>,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    rejected: AtomicU64,
}

/// Admit-vs-queue state; every mutation happens under one lock so the
/// running-count check-and-increment is atomic with respect to
/// concurrent submissions
struct SchedulerState {
    running: usize,
    queue: VecDeque<oneshot::Sender<()>>,
}

enum RunOutcome {
    Completed(HashMap<StepId, DataPacket>),
    Cancelled,
}

/// Service for executing workflow requests
///
/// Runs up to `max_concurrent` requests in parallel, queues overflow
/// FIFO up to `max_queued`, and records per-step latency for
/// observability. Collaborators are injected; the service holds no
/// process-wide state.
pub struct WorkflowExecutionService {
    definitions: Arc<WorkflowDefinitionStore>,
    registry: Arc<CapabilityRegistry>,
    recommendations: Option<Arc<RecommendationService>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    scheduler: Mutex<SchedulerState>,
    cancellations: DashMap<String, Arc<AtomicBool>>,
    timings: DashMap<String, StepTiming>,
    counters: Counters,
    max_concurrent: usize,
    max_queued: usize,
    timeout: Duration,
}

impl WorkflowExecutionService {
    /// Create a new execution service
    pub fn new(
        definitions: Arc<WorkflowDefinitionStore>,
        registry: Arc<CapabilityRegistry>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        config: &crate::AdvisorConfig,
    ) -> Self {
        Self {
            definitions,
            registry,
            recommendations: None,
            clock,
            sink,
            scheduler: Mutex::new(SchedulerState {
                running: 0,
                queue: VecDeque::new(),
            }),
            cancellations: DashMap::new(),
            timings: DashMap::new(),
            counters: Counters::default(),
            max_concurrent: config.max_concurrent_workflows,
            max_queued: config.max_queued_requests,
            timeout: config.workflow_timeout(),
        }
    }

    /// Wire the recommendation service that candidate recommendations
    /// produced by steps are ingested into
    pub fn with_recommendation_service(mut self, service: Arc<RecommendationService>) -> Self {
        self.recommendations = Some(service);
        self
    }

    /// Validate and register a workflow definition
    pub fn register_workflow(&self, definition: WorkflowDefinition) -> Result<(), CoreError> {
        self.definitions.register(definition, &self.registry)
    }

    /// Submit a request for execution
    ///
    /// Resolves when the run reaches a terminal state. Admission errors
    /// (`WorkflowNotFound`, `QueueFull`) are returned before anything
    /// runs; a failed or timed-out run resolves to the step error. A
    /// cancelled run resolves to an outcome whose request is marked
    /// `Cancelled` and whose step results are empty.
    pub async fn submit(
        &self,
        mut request: WorkflowRequest,
    ) -> Result<WorkflowOutcome, CoreError> {
        let definition = self
            .definitions
            .get(&request.workflow_id)
            .ok_or_else(|| CoreError::WorkflowNotFound(request.workflow_id.0.clone()))?;

        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.cancellations
            .insert(request.id.0.clone(), cancel_flag.clone());

        // Admit-or-queue decision, atomic under the scheduler lock.
        let waiter = {
            let mut scheduler = self.scheduler.lock().await;
            if scheduler.running < self.max_concurrent {
                scheduler.running += 1;
                None
            } else if scheduler.queue.len() < self.max_queued {
                let (tx, rx) = oneshot::channel();
                scheduler.queue.push_back(tx);
                Some(rx)
            } else {
                let queued = scheduler.queue.len();
                drop(scheduler);
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                self.cancellations.remove(&request.id.0);
                return Err(CoreError::QueueFull {
                    queued,
                    max_queued: self.max_queued,
                });
            }
        };

        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.sink.notify(Box::new(RequestReceived {
            request_id: request.id.clone(),
            workflow_id: request.workflow_id.clone(),
            timestamp: self.clock.now(),
        }));

        if let Some(rx) = waiter {
            request.mark_queued()?;
            debug!(
                request_id = %request.id.0,
                workflow_id = %request.workflow_id.0,
                "Request queued for a free slot"
            );
            if rx.await.is_err() {
                self.cancellations.remove(&request.id.0);
                return Err(CoreError::Other(
                    "Executor shut down while request was queued".to_string(),
                ));
            }
            // The completing request handed its slot to us directly;
            // the running count already accounts for this run.
        }

        request.mark_running(self.clock.now())?;
        let started = Instant::now();

        let run_result = tokio::time::timeout(
            self.timeout,
            self.execute_run(&definition, &request, &cancel_flag),
        )
        .await;

        self.cancellations.remove(&request.id.0);
        // Pop the next queued request (if any) before giving the slot
        // back, preserving FIFO admission.
        self.release_slot().await;

        let now = self.clock.now();
        match run_result {
            Ok(Ok(RunOutcome::Completed(step_results))) => {
                request.mark_completed(now)?;
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                self.sink.notify(Box::new(RequestCompleted {
                    request_id: request.id.clone(),
                    workflow_id: request.workflow_id.clone(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    timestamp: now,
                }));
                Ok(WorkflowOutcome {
                    request,
                    step_results,
                })
            }
            Ok(Ok(RunOutcome::Cancelled)) => {
                request.mark_cancelled(now)?;
                self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(request_id = %request.id.0, "Request cancelled");
                Ok(WorkflowOutcome {
                    request,
                    step_results: HashMap::new(),
                })
            }
            Ok(Err(error)) => {
                request.mark_failed(now)?;
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                self.sink.notify(Box::new(RequestFailed {
                    request_id: request.id.clone(),
                    workflow_id: request.workflow_id.clone(),
                    error: error.to_string(),
                    timestamp: now,
                }));
                Err(error)
            }
            Err(_elapsed) => {
                // Timed out: partial step results were discarded with
                // the aborted run future.
                request.mark_failed(now)?;
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                let error = CoreError::WorkflowTimeout(request.workflow_id.0.clone());
                self.sink.notify(Box::new(RequestFailed {
                    request_id: request.id.clone(),
                    workflow_id: request.workflow_id.clone(),
                    error: error.to_string(),
                    timestamp: now,
                }));
                Err(error)
            }
        }
    }

    /// Request cancellation of an in-flight or queued request
    ///
    /// Best-effort: the flag is checked between steps, so an in-flight
    /// action runs to completion. Returns whether the request was known
    /// and not yet terminal.
    pub fn cancel(&self, request_id: &crate::RequestId) -> bool {
        match self.cancellations.get(&request_id.0) {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => {
                warn!(request_id = %request_id.0, "Cancellation requested for unknown request");
                false
            }
        }
    }

    /// Aggregate counters and gauges
    pub async fn stats(&self) -> ExecutorStats {
        let scheduler = self.scheduler.lock().await;
        ExecutorStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            active: scheduler.running,
            queued: scheduler.queue.len(),
        }
    }

    /// Snapshot of the per-pair step timing averages, keyed by
    /// `capability.action`
    pub fn step_timings(&self) -> HashMap<String, StepTiming> {
        self.timings
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    async fn execute_run(
        &self,
        definition: &WorkflowDefinition,
        request: &WorkflowRequest,
        cancel_flag: &AtomicBool,
    ) -> Result<RunOutcome, CoreError> {
        let mut run = WorkflowRun::new(request.id.clone(), definition.id.clone());

        for step in &definition.steps {
            if cancel_flag.load(Ordering::Relaxed) {
                debug!(
                    request_id = %request.id.0,
                    step_id = %step.id,
                    "Cancellation observed; remaining steps will not start"
                );
                return Ok(RunOutcome::Cancelled);
            }

            // Definitions are pre-validated to a topological order, so
            // an unmet dependency here means the catalog invariant
            // broke. Fatal to this run, not to the executor.
            if !run.dependencies_met(step) {
                return Err(CoreError::StepExecutionError(format!(
                    "Step {} invoked before its dependencies were recorded",
                    step.id
                )));
            }

            let handler = self.registry.resolve(&step.capability, &step.action)?;

            let context = ActionContext {
                request_id: request.id.clone(),
                workflow_id: definition.id.clone(),
                step_id: StepId(step.id.clone()),
                payload: request.payload.clone(),
                step_results: run.step_results.clone(),
            };

            debug!(
                request_id = %request.id.0,
                workflow_id = %definition.id.0,
                step_id = %step.id,
                capability = %step.capability,
                action = %step.action,
                "Executing step"
            );

            let step_started = Instant::now();
            let output = handler.execute(context).await;
            self.record_timing(&step.capability, &step.action, step_started.elapsed());

            match output {
                Ok(output) => {
                    run.record_step_result(step, output.result)?;
                    if let Some(store) = &self.recommendations {
                        if !output.recommendations.is_empty() {
                            // No executor lock is held here, so the
                            // store can take its own.
                            store.ingest(output.recommendations).await;
                        }
                    }
                }
                Err(error) => {
                    warn!(
                        request_id = %request.id.0,
                        step_id = %step.id,
                        error = %error,
                        "Step failed; aborting remaining steps"
                    );
                    return Err(CoreError::StepExecutionError(format!(
                        "Step {} failed: {}",
                        step.id, error
                    )));
                }
            }
        }

        Ok(RunOutcome::Completed(run.step_results))
    }

    async fn release_slot(&self) {
        let mut scheduler = self.scheduler.lock().await;
        loop {
            match scheduler.queue.pop_front() {
                Some(tx) => {
                    // Hand the slot to the woken waiter without
                    // decrementing: the running count transfers.
                    if tx.send(()).is_ok() {
                        return;
                    }
                    // Waiter gave up; try the next one.
                }
                None => {
                    scheduler.running -= 1;
                    return;
                }
            }
        }
    }

    fn record_timing(&self, capability: &str, action: &str, elapsed: Duration) {
        let key = format!("{}.{}", capability, action);
        let sample_ms = elapsed.as_secs_f64() * 1000.0;
        let mut entry = self.timings.entry(key).or_insert(StepTiming {
            average_ms: sample_ms,
            samples: 0,
        });
        if entry.samples > 0 {
            entry.average_ms += TIMING_SAMPLE_WEIGHT * (sample_ms - entry.average_ms);
        }
        entry.samples += 1;
    }
}
