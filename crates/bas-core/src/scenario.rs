// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scenario and step templates.

use crate::{Metadata, Platform, StepOutcome, StepStatus};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_step_duration() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_total_duration() -> Duration {
    Duration::from_secs(30 * 60)
}

/// Ordered attack simulation, produced by an external planner.
///
/// The template fields are never changed once handed to the engine. Only the
/// execution fields of the contained [`Step`]s are written, and only by the
/// execution loop of the job that owns the scenario.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Scenario {
    /// Scenario identifier.
    pub scenario_id: String,
    /// Human-readable name.
    pub name: String,
    /// What the scenario simulates.
    #[serde(default)]
    pub description: String,
    /// Back end that executes the steps.
    pub platform: Platform,
    /// Opaque criteria describing which targets to act on.
    #[serde(default)]
    pub target_selector: Metadata,
    /// Parameter bag visible to every step.
    #[serde(default)]
    pub parameters: Metadata,
    /// Steps, executed strictly in order.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Estimated wall-clock time for the whole scenario (seconds).
    #[serde(default = "default_total_duration", with = "crate::duration_secs")]
    #[schemars(with = "f64")]
    pub estimated_total_time: Duration,
    /// Platform-specific settings keyed by platform section.
    #[serde(default)]
    pub platform_metadata: Metadata,
}

impl Scenario {
    /// Create an empty scenario for `platform`.
    pub fn new(
        scenario_id: impl Into<String>,
        name: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            name: name.into(),
            description: String::new(),
            platform,
            target_selector: Metadata::new(),
            parameters: Metadata::new(),
            steps: Vec::new(),
            estimated_total_time: default_total_duration(),
            platform_metadata: Metadata::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a step.
    #[must_use]
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Insert a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Insert a target selector criterion.
    #[must_use]
    pub fn with_target(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.target_selector.insert(key.into(), value);
        self
    }

    /// Insert a platform metadata section.
    #[must_use]
    pub fn with_platform_metadata(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.platform_metadata.insert(key.into(), value);
        self
    }

    /// Set the estimated total duration.
    #[must_use]
    pub fn with_estimated_total_time(mut self, duration: Duration) -> Self {
        self.estimated_total_time = duration;
        self
    }
}

/// One unit of work within a [`Scenario`], plus its execution record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    /// Step identifier.
    pub step_id: String,
    /// Human-readable name.
    pub name: String,
    /// What the step does.
    #[serde(default)]
    pub description: String,
    /// Platform-specific command or payload.
    #[serde(default)]
    pub platform_command: String,
    /// Platform-specific settings keyed by platform section.
    #[serde(default)]
    pub platform_metadata: Metadata,
    /// Estimated duration (seconds).
    #[serde(default = "default_step_duration", with = "crate::duration_secs")]
    #[schemars(with = "f64")]
    pub estimated_duration: Duration,

    /// Execution status.
    #[serde(default)]
    pub status: StepStatus,
    /// When the adapter call started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    /// When the outcome was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Normalised adapter result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<StepOutcome>,
    /// Failure text, when the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Step {
    /// Create a pending step with the default estimated duration (5 minutes).
    pub fn new(step_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            name: name.into(),
            description: String::new(),
            platform_command: String::new(),
            platform_metadata: Metadata::new(),
            estimated_duration: default_step_duration(),
            status: StepStatus::Pending,
            start_time: None,
            end_time: None,
            result: None,
            error: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the platform command.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.platform_command = command.into();
        self
    }

    /// Insert a platform metadata section.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.platform_metadata.insert(key.into(), value);
        self
    }

    /// Set the estimated duration.
    #[must_use]
    pub fn with_estimated_duration(mut self, duration: Duration) -> Self {
        self.estimated_duration = duration;
        self
    }
}
