// SPDX-License-Identifier: MIT OR Apache-2.0
//! Normalised adapter step results.

use crate::{Metadata, PlatformContext};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Whether an adapter considers the step successful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The step did what it was asked to.
    Success,
    /// An expected failure mode; the scenario continues.
    Failed,
}

/// What an adapter reports back for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepOutcome {
    /// Success or failure.
    pub status: OutcomeStatus,
    /// Human-readable output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Human-readable failure text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time the adapter spent on the step, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    /// Artifacts produced by the step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,
    /// State merged into the job's platform context for later steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_context: Option<PlatformContext>,
    /// Adapter-specific detail.
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub data: Metadata,
}

impl StepOutcome {
    fn with_status(status: OutcomeStatus) -> Self {
        Self {
            status,
            output: None,
            error: None,
            execution_time: None,
            artifacts: Vec::new(),
            job_context: None,
            data: Metadata::new(),
        }
    }

    /// A successful outcome.
    pub fn success() -> Self {
        Self::with_status(OutcomeStatus::Success)
    }

    /// A failed outcome with the given error text.
    pub fn failure(error: impl Into<String>) -> Self {
        let mut outcome = Self::with_status(OutcomeStatus::Failed);
        outcome.error = Some(error.into());
        outcome
    }

    /// Returns `true` if the status is [`OutcomeStatus::Success`].
    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// Set the output text.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Record how long the step took.
    #[must_use]
    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.execution_time = Some(elapsed.as_secs_f64());
        self
    }

    /// Append an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifacts.push(artifact.into());
        self
    }

    /// Attach context to merge into the job.
    #[must_use]
    pub fn with_job_context(mut self, context: PlatformContext) -> Self {
        self.job_context = Some(context);
        self
    }

    /// Insert adapter-specific detail.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_carries_error_text() {
        let o = StepOutcome::failure("Mock execution failed for: recon");
        assert!(!o.is_success());
        assert_eq!(o.error.as_deref(), Some("Mock execution failed for: recon"));
    }

    #[test]
    fn wire_shape_uses_status_key() {
        let o = StepOutcome::success()
            .with_output("ok")
            .with_execution_time(Duration::from_millis(1500))
            .with_data("operation_id", json!("op-1"));
        let v = serde_json::to_value(&o).unwrap();
        assert_eq!(v["status"], "success");
        assert_eq!(v["execution_time"], json!(1.5));
        assert_eq!(v["data"]["operation_id"], "op-1");
        assert!(v.get("error").is_none());
    }
}
