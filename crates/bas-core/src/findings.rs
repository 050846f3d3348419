// SPDX-License-Identifier: MIT OR Apache-2.0
//! Summary statistics computed once a job reaches a terminal state.

use crate::JobStatus;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Findings attached to a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Findings {
    /// Headline numbers.
    pub summary: FindingsSummary,
    /// Derived ratios.
    pub metrics: FindingsMetrics,
    /// Canned, threshold-driven advice.
    pub recommendations: Vec<String>,
    /// Artifacts reported by steps, in event order.
    pub artifacts: Vec<String>,
}

/// Headline numbers for a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FindingsSummary {
    /// Scenario name.
    pub scenario_name: String,
    /// Wall-clock time between loop start and end.
    pub execution_time_seconds: f64,
    /// Steps that succeeded.
    pub steps_completed: usize,
    /// Steps that failed.
    pub steps_failed: usize,
    /// `steps_completed / total_steps`, 0 when there are no steps.
    pub success_rate: f64,
    /// Job status at the time findings were computed.
    pub overall_status: JobStatus,
}

/// Ratios derived from the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FindingsMetrics {
    /// Average seconds per step.
    pub time_per_step: f64,
    /// `steps_failed / total_steps`.
    pub error_rate: f64,
    /// Success rate, halved for runs of five minutes or longer.
    pub efficiency_score: f64,
}
