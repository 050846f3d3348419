// SPDX-License-Identifier: MIT OR Apache-2.0
//! The mutable runtime record for one scenario execution.

use crate::{
    Event, EventKind, EventObserver, Findings, JobStatus, Metadata, ObserverSlot,
    PlatformContext, Scenario, Severity, StepStatus, TransitionError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// One running or finished instance of a [`Scenario`].
///
/// Written only by the engine's execution task for this job (and by
/// cancellation bookkeeping); status queries receive clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique within one engine instance.
    pub job_id: Uuid,
    /// The scenario being executed, owned by value.
    pub scenario: Scenario,
    /// Lifecycle state.
    pub status: JobStatus,
    /// When the job was allocated.
    pub created_at: DateTime<Utc>,
    /// When the execution loop began.
    pub start_time: Option<DateTime<Utc>>,
    /// When a terminal state was reached.
    pub end_time: Option<DateTime<Utc>>,
    /// Index of the step currently (or last) being processed.
    pub current_step: usize,
    /// Ordered event log.
    pub events: Vec<Event>,
    /// `100 * steps_completed / total_steps`.
    pub progress_percentage: f64,
    /// Populated when the job completes.
    pub findings: Option<Findings>,
    /// Cross-step adapter state.
    pub platform_context: PlatformContext,
    /// Steps whose adapter reported success.
    pub steps_completed: usize,
    /// Steps that failed or raised.
    pub steps_failed: usize,
    /// Number of steps in the scenario.
    pub total_steps: usize,
    #[serde(skip)]
    observer: ObserverSlot,
}

impl Job {
    /// Allocate a `PENDING` job for `scenario`.
    pub fn new(scenario: Scenario) -> Self {
        let total_steps = scenario.steps.len();
        Self {
            job_id: Uuid::new_v4(),
            scenario,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            start_time: None,
            end_time: None,
            current_step: 0,
            events: Vec::new(),
            progress_percentage: 0.0,
            findings: None,
            platform_context: PlatformContext::new(),
            steps_completed: 0,
            steps_failed: 0,
            total_steps,
            observer: ObserverSlot::default(),
        }
    }

    /// Attach an observer notified on every event and progress update.
    #[must_use]
    pub fn with_observer(mut self, observer: Option<Arc<dyn EventObserver>>) -> Self {
        self.observer = observer.into();
        self
    }

    /// Returns `true` once the job is `COMPLETED`, `FAILED` or `CANCELLED`.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next`, enforcing the state machine.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            let now = Utc::now();
            self.end_time = Some(now);
            if next == JobStatus::Cancelled {
                for step in &mut self.scenario.steps {
                    if step.status == StepStatus::Running {
                        step.status = StepStatus::Cancelled;
                        step.end_time = Some(now);
                    }
                }
            }
        }
        Ok(())
    }

    /// Steps processed so far, successful or not.
    pub fn steps_processed(&self) -> usize {
        self.steps_completed + self.steps_failed
    }

    /// `steps_completed / total_steps`, or 0 for an empty scenario.
    pub fn success_rate(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.steps_completed as f64 / self.total_steps as f64
    }

    /// Append an event and notify the observer (best-effort).
    pub fn add_event(
        &mut self,
        kind: EventKind,
        description: impl Into<String>,
        severity: Severity,
        metadata: Metadata,
    ) -> &Event {
        let event = Event::new(kind, description, severity, metadata);
        if self.observer.is_attached() {
            let mut payload = self.counters_payload();
            payload["event"] = serde_json::to_value(&event).unwrap_or_default();
            self.observer
                .notify("simulation_event", payload, severity.as_level());
        }
        self.events.push(event);
        &self.events[self.events.len() - 1]
    }

    /// Recompute `progress_percentage` and notify the observer (best-effort).
    pub fn update_progress(&mut self) {
        if self.total_steps > 0 {
            self.progress_percentage =
                self.steps_completed as f64 / self.total_steps as f64 * 100.0;
        }
        if self.observer.is_attached() {
            self.observer
                .notify("simulation_progress", self.counters_payload(), "info");
        }
    }

    fn counters_payload(&self) -> serde_json::Value {
        json!({
            "job_id": self.job_id,
            "progress": self.progress_percentage,
            "status": self.status,
            "current_step": self.current_step,
            "total_steps": self.total_steps,
            "steps_completed": self.steps_completed,
            "steps_failed": self.steps_failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Platform, Step};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(String, serde_json::Value, String)>>);

    impl EventObserver for Recording {
        fn emit(
            &self,
            event_type: &str,
            payload: serde_json::Value,
            level: &str,
            _source: &str,
        ) -> anyhow::Result<()> {
            self.0
                .lock()
                .unwrap()
                .push((event_type.into(), payload, level.into()));
            Ok(())
        }
    }

    struct Broken;

    impl EventObserver for Broken {
        fn emit(&self, _: &str, _: serde_json::Value, _: &str, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("socket closed")
        }
    }

    fn scenario(steps: usize) -> Scenario {
        (0..steps).fold(Scenario::new("s", "demo", Platform::Mock), |s, i| {
            s.with_step(Step::new(format!("step-{i}"), format!("Step {i}")))
        })
    }

    #[test]
    fn new_job_counts_steps() {
        let job = Job::new(scenario(3));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.total_steps, 3);
        assert_eq!(job.progress_percentage, 0.0);
    }

    #[test]
    fn progress_tracks_completed_steps_only() {
        let mut job = Job::new(scenario(4));
        job.steps_completed = 1;
        job.steps_failed = 1;
        job.update_progress();
        assert_eq!(job.progress_percentage, 25.0);
    }

    #[test]
    fn empty_scenario_never_divides_by_zero() {
        let mut job = Job::new(scenario(0));
        job.update_progress();
        assert_eq!(job.progress_percentage, 0.0);
        assert_eq!(job.success_rate(), 0.0);
    }

    #[test]
    fn terminal_transition_stamps_end_time() {
        let mut job = Job::new(scenario(1));
        job.transition(JobStatus::Initializing).unwrap();
        job.transition(JobStatus::Running).unwrap();
        assert!(job.end_time.is_none());
        job.transition(JobStatus::Completed).unwrap();
        assert!(job.end_time.is_some());
        let err = job.transition(JobStatus::Running).unwrap_err();
        assert_eq!(err.from, JobStatus::Completed);
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn cancelling_closes_the_in_flight_step() {
        let mut job = Job::new(scenario(2));
        job.transition(JobStatus::Initializing).unwrap();
        job.transition(JobStatus::Running).unwrap();
        job.scenario.steps[0].status = StepStatus::Running;

        job.transition(JobStatus::Cancelled).unwrap();
        let step = &job.scenario.steps[0];
        assert_eq!(step.status, StepStatus::Cancelled);
        assert_eq!(step.end_time, job.end_time);
        assert_eq!(job.scenario.steps[1].status, StepStatus::Pending);
        assert!(job.scenario.steps[1].end_time.is_none());
    }

    #[test]
    fn observer_sees_events_and_progress() {
        let rec = Arc::new(Recording::default());
        let mut job = Job::new(scenario(2)).with_observer(Some(rec.clone()));
        job.add_event(
            EventKind::StepFailed,
            "Failed step: Step 0",
            Severity::Error,
            Metadata::new(),
        );
        job.update_progress();
        let seen = rec.0.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "simulation_event");
        assert_eq!(seen[0].2, "error");
        assert_eq!(seen[0].1["event"]["event_type"], "step_failed");
        assert_eq!(seen[1].0, "simulation_progress");
        assert_eq!(seen[1].1["total_steps"], 2);
    }

    #[test]
    fn observer_failure_does_not_affect_job() {
        let mut job = Job::new(scenario(1)).with_observer(Some(Arc::new(Broken)));
        job.add_event(
            EventKind::SimulationStarted,
            "Started simulation: demo",
            Severity::Info,
            Metadata::new(),
        );
        job.update_progress();
        assert_eq!(job.events.len(), 1);
    }

    #[test]
    fn snapshot_serializes_without_observer() {
        let job = Job::new(scenario(1)).with_observer(Some(Arc::new(Broken)));
        let v = serde_json::to_value(&job).unwrap();
        assert!(v.get("observer").is_none());
        assert_eq!(v["status"], "pending");
    }
}
