// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-step context handed to adapters and the cross-step platform context.
//!
//! [`PlatformContext`] is the only state shared between steps of one job.
//! It stays a free-form bag so that any adapter can hand state forward, but
//! adapters read and write it through typed sections ([`PlatformContext::insert_section`]
//! and [`PlatformContext::section`]) so the shape is validated at the adapter
//! boundary.

use crate::{Job, Metadata};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form cross-step state, merged in by adapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct PlatformContext {
    entries: Metadata,
}

impl PlatformContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow-merge `other` into `self`; keys in `other` win.
    pub fn merge(&mut self, other: PlatformContext) {
        self.entries.extend(other.entries);
    }

    /// Insert a raw value.
    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(key.into(), value);
    }

    /// Raw value for `key`.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    /// Serialise `value` and store it under `key`.
    pub fn insert_section<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let v = serde_json::to_value(value)?;
        self.entries.insert(key.into(), v);
        Ok(())
    }

    /// Builder form of [`insert_section`](Self::insert_section).
    pub fn with_section<T: Serialize>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        self.insert_section(key, value)?;
        Ok(self)
    }

    /// Deserialise the section stored under `key`, if present.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        metadata_section(&self.entries, key)
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been merged in.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over top-level entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.entries.iter()
    }
}

/// Deserialise `bag[key]` into `T`, returning `Ok(None)` when the key is absent.
pub fn metadata_section<T: DeserializeOwned>(
    bag: &Metadata,
    key: &str,
) -> Result<Option<T>, serde_json::Error> {
    bag.get(key)
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
}

/// Everything an adapter may consult while executing one step.
///
/// Assembled fresh from the job for every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepContext {
    /// Owning job.
    pub job_id: Uuid,
    /// Scenario identifier.
    pub scenario_id: String,
    /// Scenario name.
    pub scenario_name: String,
    /// Scenario-level platform metadata.
    pub scenario_metadata: Metadata,
    /// Target selection criteria.
    pub target_selector: Metadata,
    /// Scenario parameters.
    pub parameters: Metadata,
    /// Context accumulated from earlier steps of the same job.
    pub platform_context: PlatformContext,
    /// The step's own platform metadata.
    pub step_metadata: Metadata,
}

impl StepContext {
    /// Build the context for step `index` of `job`.
    ///
    /// Returns `None` if `index` is out of range.
    pub fn for_step(job: &Job, index: usize) -> Option<Self> {
        let step = job.scenario.steps.get(index)?;
        Some(Self {
            job_id: job.job_id,
            scenario_id: job.scenario.scenario_id.clone(),
            scenario_name: job.scenario.name.clone(),
            scenario_metadata: job.scenario.platform_metadata.clone(),
            target_selector: job.scenario.target_selector.clone(),
            parameters: job.scenario.parameters.clone(),
            platform_context: job.platform_context.clone(),
            step_metadata: step.platform_metadata.clone(),
        })
    }
}
