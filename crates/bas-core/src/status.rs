// SPDX-License-Identifier: MIT OR Apache-2.0
//! Job and step state machines.

use bas_error::{BasError, ErrorCode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Lifecycle of a [`Job`](crate::Job).
///
/// ```text
/// PENDING -> INITIALIZING -> RUNNING -> { COMPLETED, FAILED, CANCELLED }
///                 |            ^  |
///                 v            |  v
///               FAILED        PAUSED
/// ```
///
/// `PENDING` may also be cancelled directly. Terminal states are sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Allocated but not yet prepared.
    #[default]
    Pending,
    /// Registered with the engine; the execution loop has not begun.
    Initializing,
    /// Steps are being executed.
    Running,
    /// Suspended by an adapter that supports it.
    Paused,
    /// Every step was processed.
    Completed,
    /// No adapter, or the execution loop itself failed.
    Failed,
    /// Cancelled by a caller.
    Cancelled,
}

impl JobStatus {
    /// Returns `true` for `COMPLETED`, `FAILED` and `CANCELLED`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `cancel_simulation` may act on a job in this state.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Initializing)
                | (Pending, Cancelled)
                | (Initializing, Running)
                | (Initializing, Failed)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Paused, Running)
        )
    }

    /// Stable lower-case tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status of a single [`Step`](crate::Step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started.
    #[default]
    Pending,
    /// Adapter call in flight.
    Running,
    /// Adapter reported success.
    Completed,
    /// Adapter reported failure or raised an error.
    Failed,
    /// The job was cancelled while the adapter call was in flight; the
    /// result, if any arrived, was discarded.
    Cancelled,
}

impl StepStatus {
    /// Returns `true` once the step has an outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A job was asked to move along an edge the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job transition {from} -> {to}")]
pub struct TransitionError {
    /// State the job was in.
    pub from: JobStatus,
    /// Requested state.
    pub to: JobStatus,
}

impl From<TransitionError> for BasError {
    fn from(err: TransitionError) -> Self {
        BasError::new(ErrorCode::InvalidTransition, err.to_string())
            .with_context("from", err.from)
            .with_context("to", err.to)
    }
}
