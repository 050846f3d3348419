// SPDX-License-Identifier: MIT OR Apache-2.0
//! bas-runtime
//!
//! The simulation execution engine.
//!
//! Responsibilities:
//! - own the job table and the platform adapter registry
//! - run every job as its own tokio task, walking steps strictly in order
//! - fold adapter results into job state, events and progress
//! - compute findings on completion and honour cancellation requests

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Findings computed when a job completes.
pub mod findings;
/// Broadcast fan-out observer.
pub mod observer;
/// Platform-keyed adapter registry.
pub mod registry;
/// In-memory job table.
pub mod store;

use bas_adapter::PlatformAdapter;
use bas_adapter_mock::MockAdapter;
use bas_config::{EngineConfig, RemoteSettings, RetentionPolicy};
use bas_core::{
    EventKind, EventObserver, Job, JobStatus, Metadata, Platform, Scenario, Severity,
    StepContext, StepOutcome, StepStatus, TransitionError,
};
use bas_error::{BasError, ErrorCode};
use bas_remote::RemoteOperationAdapter;
use chrono::Utc;
use futures::FutureExt;
use serde_json::{Value, json};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, RwLock as SyncRwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use findings::compute_findings;
pub use observer::{BroadcastObserver, Notification, Subscription};
pub use registry::AdapterRegistry;
use store::{JobTable, SharedJob};

/// Errors from the engine's own bookkeeping.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No job with this id is held by the engine.
    #[error("unknown job: {0}")]
    UnknownJob(Uuid),

    /// A job was asked to move along an edge the state machine forbids.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A step index fell outside the scenario.
    #[error("step {index} is out of range for job {job_id}")]
    MissingStep {
        /// Job being executed.
        job_id: Uuid,
        /// Offending index.
        index: usize,
    },

    /// The execution task panicked or was aborted.
    #[error("execution task for job {job_id} did not finish")]
    TaskFailed {
        /// Job whose task failed.
        job_id: Uuid,
        /// Join failure.
        #[source]
        source: tokio::task::JoinError,
    },
}

impl From<EngineError> for BasError {
    fn from(err: EngineError) -> Self {
        let code = match &err {
            EngineError::Transition(_) => ErrorCode::InvalidTransition,
            EngineError::UnknownJob(_) => ErrorCode::Internal,
            EngineError::MissingStep { .. } | EngineError::TaskFailed { .. } => {
                ErrorCode::ExecutionFailed
            }
        };
        BasError::new(code, err.to_string()).with_source(err)
    }
}

struct EngineInner {
    adapters: SyncRwLock<AdapterRegistry>,
    jobs: RwLock<JobTable>,
    tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
    observer: SyncRwLock<Option<Arc<dyn EventObserver>>>,
    step_pacing: Duration,
    retention: RetentionPolicy,
}

impl EngineInner {
    fn adapter(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(platform)
    }

    async fn job(&self, job_id: Uuid) -> Option<SharedJob> {
        self.jobs.read().await.get(&job_id)
    }

    fn tasks(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// The simulation execution engine.
///
/// Cheap to clone; clones share the job table and adapter registry.
///
/// ```no_run
/// # async fn demo() -> Result<(), bas_runtime::EngineError> {
/// use bas_config::EngineConfig;
/// use bas_core::{Platform, Scenario, Step};
/// use bas_runtime::Engine;
///
/// let engine = Engine::with_default_adapters(&EngineConfig::default());
/// let job = engine
///     .start_simulation(
///         Scenario::new("s-1", "recon", Platform::Mock).with_step(Step::new("a", "scan")),
///     )
///     .await?;
/// let finished = engine.join(job.job_id).await?;
/// println!("{:?}", finished.status);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("platforms", &self.platforms())
            .field("step_pacing", &self.inner.step_pacing)
            .field("retention", &self.inner.retention)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// An engine with no adapters registered.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                adapters: SyncRwLock::new(AdapterRegistry::default()),
                jobs: RwLock::new(JobTable::default()),
                tasks: Mutex::new(HashMap::new()),
                observer: SyncRwLock::new(None),
                step_pacing: config.engine.step_pacing(),
                retention: config.engine.retention,
            }),
        }
    }

    /// An engine with the mock adapter registered from `[mock]` settings.
    pub fn with_default_adapters(config: &EngineConfig) -> Self {
        let engine = Self::new(config);
        engine.register_adapter(MockAdapter::new(&config.mock));
        engine
    }

    /// Register `adapter` under its platform, replacing any previous adapter.
    pub fn register_adapter<A: PlatformAdapter + 'static>(&self, adapter: A) {
        self.register_shared(Arc::new(adapter));
    }

    /// Register an already shared adapter.
    pub fn register_shared(&self, adapter: Arc<dyn PlatformAdapter>) {
        let platform = adapter.platform();
        let replaced = self
            .inner
            .adapters
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .register(adapter);
        info!(
            target: "bas.runtime",
            %platform,
            replaced = replaced.is_some(),
            "adapter registered"
        );
    }

    /// Platforms with a registered adapter.
    pub fn platforms(&self) -> Vec<Platform> {
        self.inner
            .adapters
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .platforms()
    }

    /// Adapter registered for `platform`.
    pub fn adapter(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.inner.adapter(platform)
    }

    /// Attach an observer to jobs started from now on.
    pub fn set_observer(&self, observer: Option<Arc<dyn EventObserver>>) {
        *self.inner.observer.write().unwrap_or_else(|p| p.into_inner()) = observer;
    }

    /// Allocate a job for `scenario`, start executing it in the background and
    /// return its initial snapshot without waiting.
    pub async fn start_simulation(&self, scenario: Scenario) -> Result<Job, EngineError> {
        let observer = self
            .inner
            .observer
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let mut job = Job::new(scenario).with_observer(observer);
        job.transition(JobStatus::Initializing)?;
        let description = format!("Started simulation: {}", job.scenario.name);
        let metadata = bag(json!({
            "scenario_id": job.scenario.scenario_id,
            "platform": job.scenario.platform,
        }));
        job.add_event(EventKind::SimulationStarted, description, Severity::Info, metadata);

        let job_id = job.job_id;
        let snapshot = job.clone();
        let shared: SharedJob = Arc::new(RwLock::new(job));
        {
            let mut table = self.inner.jobs.write().await;
            let evicted = table.enforce(self.inner.retention);
            if !evicted.is_empty() {
                let mut tasks = self.inner.tasks();
                for id in &evicted {
                    tasks.remove(id);
                }
                debug!(target: "bas.runtime", evicted = evicted.len(), "evicted terminal jobs");
            }
            table.insert(job_id, Arc::clone(&shared));
        }

        info!(
            target: "bas.runtime",
            %job_id,
            scenario = %snapshot.scenario.scenario_id,
            platform = %snapshot.scenario.platform,
            steps = snapshot.total_steps,
            "simulation started"
        );
        let handle = tokio::spawn(execute(Arc::clone(&self.inner), shared));
        self.inner.tasks().insert(job_id, handle);
        Ok(snapshot)
    }

    /// Snapshot of a job, if the engine holds it.
    pub async fn get_job_status(&self, job_id: Uuid) -> Option<Job> {
        let shared = self.inner.job(job_id).await?;
        let job = shared.read().await;
        Some(job.clone())
    }

    /// Snapshots of every job held, oldest first.
    pub async fn list_active_jobs(&self) -> Vec<Job> {
        let all = self.inner.jobs.read().await.all();
        let mut out = Vec::with_capacity(all.len());
        for shared in all {
            out.push(shared.read().await.clone());
        }
        out
    }

    /// Cancel a `PENDING` or `RUNNING` job.
    ///
    /// Returns `false` for unknown jobs and jobs in any other state. An
    /// in-flight adapter call is not interrupted; its result is discarded.
    /// The adapter is then asked to cancel on its side, and its answer does
    /// not affect the engine's own bookkeeping.
    pub async fn cancel_simulation(&self, job_id: Uuid) -> bool {
        let Some(shared) = self.inner.job(job_id).await else {
            return false;
        };
        let platform = {
            let mut job = shared.write().await;
            if !job.status.is_cancellable() {
                debug!(target: "bas.runtime", %job_id, status = %job.status, "cancel ignored");
                return false;
            }
            if let Err(e) = job.transition(JobStatus::Cancelled) {
                warn!(target: "bas.runtime", %job_id, error = %e, "cancel rejected");
                return false;
            }
            job.add_event(
                EventKind::SimulationCancelled,
                "Simulation cancelled by user",
                Severity::Warning,
                Metadata::new(),
            );
            job.scenario.platform
        };
        info!(target: "bas.runtime", %job_id, "simulation cancelled");

        if let Some(adapter) = self.inner.adapter(platform) {
            match adapter.cancel_job(job_id).await {
                Ok(accepted) => {
                    debug!(target: "bas.runtime", %job_id, accepted, "adapter cancel answered");
                }
                Err(e) => {
                    warn!(target: "bas.runtime", %job_id, error = %e, "adapter cancel failed");
                }
            }
        }
        true
    }

    /// Wait for a job's execution task and return the final snapshot.
    ///
    /// Joining a job whose task was already joined returns its snapshot.
    pub async fn join(&self, job_id: Uuid) -> Result<Job, EngineError> {
        let handle = self.inner.tasks().remove(&job_id);
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|source| EngineError::TaskFailed { job_id, source })?;
        }
        self.get_job_status(job_id)
            .await
            .ok_or(EngineError::UnknownJob(job_id))
    }

    /// Whether the job's execution task has finished (or was already joined).
    pub fn is_finished(&self, job_id: Uuid) -> bool {
        self.inner
            .tasks()
            .get(&job_id)
            .is_none_or(JoinHandle::is_finished)
    }

    /// Abort every unfinished execution task. Jobs that were still
    /// cancellable are marked `CANCELLED`.
    pub async fn shutdown(&self) {
        let handles: Vec<(Uuid, JoinHandle<()>)> = self.inner.tasks().drain().collect();
        let mut aborted = 0usize;
        for (job_id, handle) in handles {
            if handle.is_finished() {
                continue;
            }
            handle.abort();
            // Wait for the abort so nothing else writes to the job.
            let _ = handle.await;
            aborted += 1;
            if let Some(shared) = self.inner.job(job_id).await {
                let mut job = shared.write().await;
                if job.status.is_cancellable() && job.transition(JobStatus::Cancelled).is_ok() {
                    job.add_event(
                        EventKind::SimulationCancelled,
                        "Simulation cancelled by engine shutdown",
                        Severity::Warning,
                        Metadata::new(),
                    );
                }
            }
        }
        info!(target: "bas.runtime", aborted, "engine shut down");
    }
}

/// Register a remote-operation adapter when `settings` enable it.
///
/// Returns whether an adapter was registered; the reason for skipping is
/// logged.
pub fn configure_remote_adapter(engine: &Engine, settings: &RemoteSettings) -> bool {
    if !settings.enabled {
        info!(target: "bas.runtime", "remote integration disabled; skipping adapter registration");
        return false;
    }
    match RemoteOperationAdapter::new(settings) {
        Ok(adapter) => {
            engine.register_adapter(adapter);
            info!(
                target: "bas.runtime",
                base_url = %settings.api_base(),
                "remote operation adapter registered"
            );
            true
        }
        Err(e) => {
            warn!(
                target: "bas.runtime",
                error = %e,
                "remote service unavailable; adapter not registered"
            );
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Execution loop
// ---------------------------------------------------------------------------

async fn execute(inner: Arc<EngineInner>, shared: SharedJob) {
    let (job_id, platform) = {
        let job = shared.read().await;
        (job.job_id, job.scenario.platform)
    };

    let Some(adapter) = inner.adapter(platform) else {
        let mut job = shared.write().await;
        if job.is_terminal() {
            return;
        }
        if let Err(e) = job.transition(JobStatus::Failed) {
            error!(target: "bas.runtime", %job_id, error = %e, "could not fail job");
            return;
        }
        job.add_event(
            EventKind::SimulationFailed,
            format!("No adapter found for platform: {platform}"),
            Severity::Error,
            bag(json!({
                "platform": platform,
                "error_code": ErrorCode::AdapterNotRegistered.as_str(),
            })),
        );
        error!(target: "bas.runtime", %job_id, %platform, "no adapter registered");
        return;
    };

    if let Err(e) = run_steps(&inner, &shared, adapter.as_ref()).await {
        let mut job = shared.write().await;
        if job.is_terminal() {
            return;
        }
        if let Err(te) = job.transition(JobStatus::Failed) {
            error!(target: "bas.runtime", %job_id, error = %te, "could not fail job");
            return;
        }
        let err = BasError::from(e);
        let (code, text) = (err.code, err.message);
        job.add_event(
            EventKind::SimulationError,
            format!("Simulation failed with error: {text}"),
            Severity::Critical,
            bag(json!({ "error": text, "error_code": code.as_str() })),
        );
        error!(target: "bas.runtime", %job_id, error = %text, "simulation loop failed");
    }
}

async fn run_steps(
    inner: &EngineInner,
    shared: &SharedJob,
    adapter: &dyn PlatformAdapter,
) -> Result<(), EngineError> {
    let (job_id, total) = {
        let mut job = shared.write().await;
        if job.is_terminal() {
            return Ok(());
        }
        job.transition(JobStatus::Running)?;
        job.start_time = Some(Utc::now());
        (job.job_id, job.scenario.steps.len())
    };

    for index in 0..total {
        let (step, ctx) = {
            let mut job = shared.write().await;
            if job.is_terminal() {
                debug!(
                    target: "bas.runtime",
                    %job_id,
                    index,
                    "job no longer running; stopping loop"
                );
                return Ok(());
            }
            job.current_step = index;
            let step = job
                .scenario
                .steps
                .get_mut(index)
                .ok_or(EngineError::MissingStep { job_id, index })?;
            step.status = StepStatus::Running;
            step.start_time = Some(Utc::now());
            let step = step.clone();
            job.add_event(
                EventKind::StepStarted,
                format!("Starting step: {}", step.name),
                Severity::Info,
                bag(json!({ "step_id": step.step_id })),
            );
            let ctx = StepContext::for_step(&job, index)
                .ok_or(EngineError::MissingStep { job_id, index })?;
            (step, ctx)
        };

        debug!(target: "bas.runtime", %job_id, step_id = %step.step_id, "executing step");
        let result = AssertUnwindSafe(adapter.execute_step(&step, &ctx))
            .catch_unwind()
            .await;

        {
            let mut job = shared.write().await;
            if job.is_terminal() {
                debug!(
                    target: "bas.runtime",
                    %job_id,
                    step_id = %step.step_id,
                    "discarding result of cancelled step"
                );
                return Ok(());
            }
            record_result(&mut job, index, result);
            job.update_progress();
        }

        if !inner.step_pacing.is_zero() {
            tokio::time::sleep(inner.step_pacing).await;
        }
    }

    let mut job = shared.write().await;
    if job.is_terminal() {
        return Ok(());
    }
    job.transition(JobStatus::Completed)?;
    job.findings = Some(compute_findings(&job));
    let (completed, failed, total) = (job.steps_completed, job.steps_failed, job.total_steps);
    let success_rate = job.success_rate();
    job.add_event(
        EventKind::SimulationCompleted,
        format!("Simulation completed: {completed}/{total} steps successful"),
        Severity::Info,
        bag(json!({
            "steps_completed": completed,
            "steps_failed": failed,
            "success_rate": success_rate,
        })),
    );
    info!(target: "bas.runtime", %job_id, completed, failed, "simulation completed");
    Ok(())
}

type StepResult = Result<anyhow::Result<StepOutcome>, Box<dyn Any + Send>>;

fn record_result(job: &mut Job, index: usize, result: StepResult) {
    let job_id = job.job_id;
    let Some(step) = job.scenario.steps.get_mut(index) else {
        return;
    };
    step.end_time = Some(Utc::now());
    let step_id = step.step_id.clone();
    let name = step.name.clone();

    let failure = match result {
        Ok(Ok(outcome)) => {
            let context = outcome.job_context.clone();
            step.result = Some(outcome.clone());
            if outcome.is_success() {
                step.status = StepStatus::Completed;
                if let Some(context) = context {
                    job.platform_context.merge(context);
                }
                job.steps_completed += 1;
                job.add_event(
                    EventKind::StepCompleted,
                    format!("Completed step: {name}"),
                    Severity::Info,
                    bag(json!({
                        "step_id": step_id,
                        "output": outcome.output.unwrap_or_default(),
                        "artifacts": outcome.artifacts,
                    })),
                );
            } else {
                let error = outcome.error.unwrap_or_else(|| "Unknown error".to_string());
                step.status = StepStatus::Failed;
                step.error = Some(error.clone());
                if let Some(context) = context {
                    job.platform_context.merge(context);
                }
                job.steps_failed += 1;
                job.add_event(
                    EventKind::StepFailed,
                    format!("Failed step: {name}"),
                    Severity::Error,
                    bag(json!({ "step_id": step_id, "error": error })),
                );
            }
            None
        }
        Ok(Err(e)) => Some(classify(&e)),
        Err(panic) => Some((
            format!("adapter panicked: {}", panic_message(panic.as_ref())),
            ErrorCode::AdapterPanicked,
        )),
    };

    if let Some((error, code)) = failure {
        let Some(step) = job.scenario.steps.get_mut(index) else {
            return;
        };
        step.status = StepStatus::Failed;
        step.error = Some(error.clone());
        job.steps_failed += 1;
        warn!(
            target: "bas.runtime",
            %job_id,
            %step_id,
            code = code.as_str(),
            error = %error,
            "step raised"
        );
        job.add_event(
            EventKind::StepError,
            format!("Error in step: {name}"),
            Severity::Error,
            bag(json!({ "step_id": step_id, "error": error, "error_code": code.as_str() })),
        );
    }
}

/// Message and stable code for an unexpected adapter error. The first
/// [`BasError`] in the chain supplies the code.
fn classify(err: &anyhow::Error) -> (String, ErrorCode) {
    match err.chain().find_map(|e| e.downcast_ref::<BasError>()) {
        Some(bas) => (bas.to_string(), bas.code),
        None => (format!("{err:#}"), ErrorCode::AdapterFailed),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn bag(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => Metadata::new(),
    }
}
