// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! The contract every simulation back end implements.
//!
//! One adapter instance is registered per [`Platform`] and shared by every job
//! targeting that platform, so any per-job state an adapter keeps must be
//! keyed by job id.

use anyhow::Result;
use async_trait::async_trait;
use bas_core::{Metadata, Platform, Step, StepContext, StepOutcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A back end that can execute scenario steps.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The platform this adapter serves.
    fn platform(&self) -> Platform;

    /// Execute one step.
    ///
    /// Expected failure modes are reported as [`StepOutcome::failure`].
    /// Returning `Err` is reserved for unexpected conditions; the engine turns
    /// it into a failed step and carries on with the scenario. Attach a
    /// `bas_error::BasError` to the error chain to give it a stable code.
    async fn execute_step(&self, step: &Step, context: &StepContext) -> Result<StepOutcome>;

    /// Adapter-side view of a job, independent of the engine's own status.
    async fn get_job_status(&self, job_id: Uuid) -> Result<AdapterJobStatus>;

    /// Best-effort cancellation on the back end. The answer is advisory.
    async fn cancel_job(&self, job_id: Uuid) -> Result<bool>;
}

/// Snapshot returned by [`PlatformAdapter::get_job_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterJobStatus {
    /// Job the snapshot refers to.
    pub job_id: Uuid,
    /// Adapter-specific state tag (`not_found`, `running`, `finished`, ...).
    pub state: String,
    /// Adapter-specific detail.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub detail: Metadata,
}

impl AdapterJobStatus {
    /// Snapshot with the given state and no detail.
    pub fn new(job_id: Uuid, state: impl Into<String>) -> Self {
        Self {
            job_id,
            state: state.into(),
            detail: Metadata::new(),
        }
    }

    /// The adapter has never seen this job.
    pub fn not_found(job_id: Uuid) -> Self {
        Self::new(job_id, "not_found")
    }

    /// Add a detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.detail.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bas_core::{Job, Scenario};
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl PlatformAdapter for Echo {
        fn platform(&self) -> Platform {
            Platform::Custom
        }

        async fn execute_step(&self, step: &Step, ctx: &StepContext) -> Result<StepOutcome> {
            Ok(StepOutcome::success()
                .with_output(format!("{}:{}", ctx.scenario_name, step.step_id)))
        }

        async fn get_job_status(&self, job_id: Uuid) -> Result<AdapterJobStatus> {
            Ok(AdapterJobStatus::not_found(job_id))
        }

        async fn cancel_job(&self, _job_id: Uuid) -> Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn adapters_are_usable_as_trait_objects() {
        let adapter: Arc<dyn PlatformAdapter> = Arc::new(Echo);
        let job = Job::new(
            Scenario::new("s-1", "echo", Platform::Custom).with_step(Step::new("a", "A")),
        );
        let ctx = StepContext::for_step(&job, 0).unwrap();
        let out = adapter.execute_step(&job.scenario.steps[0], &ctx).await.unwrap();
        assert_eq!(out.output.as_deref(), Some("echo:a"));
        assert_eq!(adapter.get_job_status(job.job_id).await.unwrap().state, "not_found");
    }

    #[test]
    fn status_detail_is_omitted_when_empty() {
        let s = AdapterJobStatus::new(Uuid::nil(), "running");
        let v = serde_json::to_value(&s).unwrap();
        assert!(v.get("detail").is_none());
        let s = s.with_detail("steps", serde_json::json!(2));
        assert_eq!(serde_json::to_value(&s).unwrap()["detail"]["steps"], 2);
    }
}
