// SPDX-License-Identifier: MIT OR Apache-2.0
//! bas-core
//!
//! The data model shared by the simulation engine and every platform adapter.
//!
//! A [`Scenario`] is handed in fully formed, the engine wraps it in a [`Job`],
//! and adapters see each [`Step`] together with a freshly assembled
//! [`StepContext`]. Adapters answer with a [`StepOutcome`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Per-step context handed to adapters and the cross-step platform context.
pub mod context;
/// Serde helpers for durations expressed in seconds.
pub mod duration_secs;
/// Append-only job event log.
pub mod event;
/// Summary statistics computed at terminal state.
pub mod findings;
/// The mutable runtime record for one scenario execution.
pub mod job;
/// Best-effort external observers.
pub mod observer;
/// Normalised adapter step results.
pub mod outcome;
/// Scenario and step templates.
pub mod scenario;
/// Job and step state machines.
pub mod status;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use context::{PlatformContext, StepContext, metadata_section};
pub use event::{Event, EventKind};
pub use findings::{Findings, FindingsMetrics, FindingsSummary};
pub use job::Job;
pub use observer::{EventObserver, ObserverSlot};
pub use outcome::{OutcomeStatus, StepOutcome};
pub use scenario::{Scenario, Step};
pub use status::{JobStatus, StepStatus, TransitionError};

/// Free-form key/value bag used for selectors, parameters and metadata.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Event source tag used for observer notifications.
pub const EVENT_SOURCE: &str = "simulation_engine";

/// Back-end platform a scenario targets.
///
/// One adapter is registered per platform in the engine's registry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Deterministic in-process mock engine.
    Mock,
    /// Remote red-team automation service driven through operations.
    #[serde(alias = "caldera")]
    RemoteOperation,
    /// Metasploit Framework.
    Metasploit,
    /// Atomic Red Team.
    AtomicRed,
    /// User-supplied adapter.
    Custom,
}

impl Platform {
    /// Stable tag used in configuration, events and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::RemoteOperation => "remote_operation",
            Self::Metasploit => "metasploit",
            Self::AtomicRed => "atomic_red",
            Self::Custom => "custom",
        }
    }

    /// All known platforms, in declaration order.
    pub fn all() -> [Platform; 5] {
        [
            Self::Mock,
            Self::RemoteOperation,
            Self::Metasploit,
            Self::AtomicRed,
            Self::Custom,
        ]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "remote_operation" | "remote-operation" | "caldera" => Ok(Self::RemoteOperation),
            "metasploit" => Ok(Self::Metasploit),
            "atomic_red" | "atomic-red" => Ok(Self::AtomicRed),
            "custom" => Ok(Self::Custom),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// Event severity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
    Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Routine progress.
    #[default]
    Info,
    /// Something the operator should look at.
    Warning,
    /// A step or job failed.
    Error,
    /// The execution loop itself failed.
    Critical,
}

impl Severity {
    /// Lower-case level string used for observer notifications.
    pub fn as_level(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_tags_roundtrip_through_from_str() {
        for p in Platform::all() {
            assert_eq!(p.as_str().parse::<Platform>().unwrap(), p);
        }
    }

    #[test]
    fn caldera_is_an_alias_for_remote_operation() {
        let p: Platform = serde_json::from_str(r#""caldera""#).unwrap();
        assert_eq!(p, Platform::RemoteOperation);
        assert_eq!("caldera".parse::<Platform>().unwrap(), Platform::RemoteOperation);
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let err = "cobalt".parse::<Platform>().unwrap_err();
        assert!(err.contains("cobalt"));
    }

    #[test]
    fn severity_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            r#""CRITICAL""#
        );
        assert_eq!(Severity::Warning.as_level(), "warning");
        assert!(Severity::Critical > Severity::Error);
    }
}
