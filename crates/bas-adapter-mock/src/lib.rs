// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Mock platform used to exercise the engine without a live back end.
//!
//! Each step sleeps for `min(max_latency, step.estimated_duration)` and then
//! succeeds with a configurable probability. The random source is injected so
//! runs can be made reproducible with a seed.

use anyhow::Result;
use async_trait::async_trait;
use bas_adapter::{AdapterJobStatus, PlatformAdapter};
use bas_config::MockSettings;
use bas_core::{Platform, Step, StepContext, StepOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Parameter key that overrides the success rate for one scenario.
pub const SUCCESS_RATE_PARAM: &str = "success_rate";

#[derive(Debug, Clone, Default)]
struct MockJob {
    cancelled: bool,
    steps_executed: u64,
    steps_succeeded: u64,
    last_step: Option<String>,
}

/// Adapter for [`Platform::Mock`].
#[derive(Debug)]
pub struct MockAdapter {
    success_rate: f64,
    max_latency: Duration,
    rng: Mutex<StdRng>,
    jobs: Mutex<HashMap<Uuid, MockJob>>,
}

impl MockAdapter {
    /// Build from `[mock]` settings. Without a seed the RNG is seeded from
    /// the operating system.
    pub fn new(settings: &MockSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(settings.success_rate, settings.max_latency(), rng)
    }

    /// Build with an explicit random source.
    pub fn with_rng(success_rate: f64, max_latency: Duration, rng: StdRng) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            max_latency,
            rng: Mutex::new(rng),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Seeded adapter without latency, convenient for tests.
    pub fn instant(success_rate: f64, seed: u64) -> Self {
        Self::with_rng(success_rate, Duration::ZERO, StdRng::seed_from_u64(seed))
    }

    /// The configured success rate.
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    fn effective_rate(&self, context: &StepContext) -> f64 {
        context
            .parameters
            .get(SUCCESS_RATE_PARAM)
            .and_then(serde_json::Value::as_f64)
            .map_or(self.success_rate, |r| r.clamp(0.0, 1.0))
    }

    fn roll(&self) -> f64 {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        rng.random::<f64>()
    }

    fn record(&self, job_id: Uuid, step_id: &str, success: bool) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        let entry = jobs.entry(job_id).or_default();
        entry.steps_executed += 1;
        entry.steps_succeeded += u64::from(success);
        entry.last_step = Some(step_id.to_string());
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new(&MockSettings::default())
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        Platform::Mock
    }

    async fn execute_step(&self, step: &Step, context: &StepContext) -> Result<StepOutcome> {
        let latency = self.max_latency.min(step.estimated_duration);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let rate = self.effective_rate(context);
        let success = self.roll() < rate;
        self.record(context.job_id, &step.step_id, success);
        debug!(
            target: "bas.mock",
            job_id = %context.job_id,
            step_id = %step.step_id,
            success,
            rate,
            "mock step executed"
        );

        let outcome = if success {
            StepOutcome::success()
                .with_output(format!("Mock execution completed for: {}", step.name))
                .with_artifact(format!("mock_artifact_{}.log", step.step_id))
        } else {
            StepOutcome::failure(format!("Mock execution failed for: {}", step.name))
        };
        Ok(outcome.with_execution_time(latency))
    }

    async fn get_job_status(&self, job_id: Uuid) -> Result<AdapterJobStatus> {
        let jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        let Some(job) = jobs.get(&job_id) else {
            return Ok(AdapterJobStatus::not_found(job_id)
                .with_detail("message", json!("Job not found in mock platform")));
        };
        let state = if job.cancelled { "cancelled" } else { "running" };
        Ok(AdapterJobStatus::new(job_id, state)
            .with_detail("steps_executed", json!(job.steps_executed))
            .with_detail("steps_succeeded", json!(job.steps_succeeded))
            .with_detail("last_step", json!(job.last_step)))
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|p| p.into_inner());
        Ok(match jobs.get_mut(&job_id) {
            Some(job) => {
                job.cancelled = true;
                true
            }
            None => false,
        })
    }
}
