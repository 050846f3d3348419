// SPDX-License-Identifier: MIT OR Apache-2.0
//! Append-only job event log entries.

use crate::{Metadata, Severity};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Event type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Job accepted by the engine.
    SimulationStarted,
    /// A step is about to be handed to the adapter.
    StepStarted,
    /// The adapter reported success.
    StepCompleted,
    /// The adapter reported an ordinary failure.
    StepFailed,
    /// The adapter raised an error or panicked.
    StepError,
    /// Every step was processed.
    SimulationCompleted,
    /// The job could not start (no adapter).
    SimulationFailed,
    /// The execution loop itself failed.
    SimulationError,
    /// A caller cancelled the job.
    SimulationCancelled,
}

impl EventKind {
    /// Stable tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimulationStarted => "simulation_started",
            Self::StepStarted => "step_started",
            Self::StepCompleted => "step_completed",
            Self::StepFailed => "step_failed",
            Self::StepError => "step_error",
            Self::SimulationCompleted => "simulation_completed",
            Self::SimulationFailed => "simulation_failed",
            Self::SimulationError => "simulation_error",
            Self::SimulationCancelled => "simulation_cancelled",
        }
    }

    /// Events that record the result of a step.
    pub fn is_step_result(&self) -> bool {
        matches!(self, Self::StepCompleted | Self::StepFailed | Self::StepError)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single timestamped entry in a job's event log. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// When the event was appended.
    pub timestamp: DateTime<Utc>,
    /// Event type tag.
    #[serde(rename = "event_type")]
    pub kind: EventKind,
    /// Human-readable description.
    pub description: String,
    /// Severity.
    pub severity: Severity,
    /// Structured detail.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(
        kind: EventKind,
        description: impl Into<String>,
        severity: Severity,
        metadata: Metadata,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind,
            description: description.into(),
            severity,
            metadata,
        }
    }
}
