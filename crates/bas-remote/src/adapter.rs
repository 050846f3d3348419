// SPDX-License-Identifier: MIT OR Apache-2.0
//! Platform adapter that drives one remote operation per job.
//!
//! A scenario expresses "start remote job, wait for first activity, wait for
//! completion, pull the report" as ordinary steps. Each step names its action
//! in the `remote_operation` section of its platform metadata:
//!
//! ```json
//! { "remote_operation": { "action": "await_links", "minimum_links": 3 } }
//! ```
//!
//! The operation id and the set of links already seen are kept in an
//! adapter-local table keyed by job id, since one adapter instance serves
//! every concurrently running job.

use crate::client::{HttpOperationClient, Link, Operation, OperationClient};
use crate::RemoteError;
use anyhow::Result;
use async_trait::async_trait;
use bas_adapter::{AdapterJobStatus, PlatformAdapter};
use bas_config::RemoteSettings;
use bas_core::{
    Metadata, Platform, PlatformContext, Step, StepContext, StepOutcome, metadata_section,
};
use bas_error::{BasError, ErrorCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

/// Metadata key holding step actions and scenario/parameter operation settings.
pub const METADATA_KEY: &str = "remote_operation";
/// Older metadata key accepted as a fallback.
pub const LEGACY_METADATA_KEY: &str = "caldera";
/// Platform-context key written by `create_operation`.
pub const CONTEXT_KEY: &str = "remote_operation";
/// Platform-context key written by `collect_results`.
pub const REPORT_CONTEXT_KEY: &str = "remote_operation_report";

/// The action one step asks the adapter to perform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    /// Submit a new operation and optionally start it.
    CreateOperation {
        /// Set the operation state to `running` right after creation.
        #[serde(default = "default_true")]
        auto_start: bool,
    },
    /// Poll until at least `minimum_links` distinct links have been seen.
    AwaitLinks {
        /// Link count that satisfies the wait.
        #[serde(default = "default_minimum_links")]
        minimum_links: usize,
    },
    /// Poll until the operation state is one of `terminal_states`.
    AwaitCompletion {
        /// Remote states that end the wait.
        #[serde(default = "default_terminal_states")]
        terminal_states: Vec<String>,
    },
    /// Fetch the final snapshot and every link's detail.
    CollectResults,
    /// Nothing to do.
    Noop,
}

fn default_true() -> bool {
    true
}

fn default_minimum_links() -> usize {
    1
}

fn default_terminal_states() -> Vec<String> {
    vec!["finished".into(), "cleanup".into()]
}

impl StepAction {
    /// Read the action from a step's platform metadata.
    ///
    /// A missing section, or one without an `action` key, is a no-op.
    pub fn from_metadata(metadata: &Metadata) -> Result<Self, BasError> {
        let section = metadata
            .get(METADATA_KEY)
            .or_else(|| metadata.get(LEGACY_METADATA_KEY));
        match section {
            Some(v) if v.get("action").is_some() => serde_json::from_value(v.clone()).map_err(|e| {
                BasError::new(
                    ErrorCode::InvalidStepMetadata,
                    format!("invalid remote operation step metadata: {e}"),
                )
                .with_context("metadata", v)
            }),
            _ => Ok(Self::Noop),
        }
    }

    /// Whether the action needs an operation created earlier in the job.
    pub fn needs_operation(&self) -> bool {
        !matches!(self, Self::CreateOperation { .. } | Self::Noop)
    }
}

/// Operation settings from scenario metadata and parameters. Every field is
/// optional; unset fields fall back to [`OperationPayload`] defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    adversary_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    planner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jitter: Option<String>,
    #[serde(default, deserialize_with = "int_like", skip_serializing_if = "Option::is_none")]
    autonomous: Option<i64>,
    #[serde(default, deserialize_with = "int_like", skip_serializing_if = "Option::is_none")]
    auto_close: Option<i64>,
    #[serde(default, deserialize_with = "int_like", skip_serializing_if = "Option::is_none")]
    visibility: Option<i64>,
    #[serde(default, deserialize_with = "int_like", skip_serializing_if = "Option::is_none")]
    phases_enabled: Option<i64>,
}

fn int_like<'de, D>(de: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match Option::<Value>::deserialize(de)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(i64::from(b))),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("{n} is not an integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("'{s}' is not an integer"))),
        Some(other) => Err(D::Error::custom(format!("expected an integer, got {other}"))),
    }
}

impl OperationSettings {
    /// Read `<bag>.remote_operation.operation`.
    pub fn from_bag(bag: &Metadata) -> Result<Self, BasError> {
        let key = if bag.contains_key(METADATA_KEY) {
            METADATA_KEY
        } else {
            LEGACY_METADATA_KEY
        };
        let section: Option<Map<String, Value>> =
            metadata_section(bag, key).map_err(invalid_metadata)?;
        match section.and_then(|mut s| s.remove("operation")) {
            Some(v) => serde_json::from_value(v).map_err(invalid_metadata),
            None => Ok(Self::default()),
        }
    }

    /// Fields set in `overlay` win.
    #[must_use]
    pub fn overlay(self, overlay: Self) -> Self {
        Self {
            name: overlay.name.or(self.name),
            adversary_id: overlay.adversary_id.or(self.adversary_id),
            group: overlay.group.or(self.group),
            planner: overlay.planner.or(self.planner),
            source: overlay.source.or(self.source),
            jitter: overlay.jitter.or(self.jitter),
            autonomous: overlay.autonomous.or(self.autonomous),
            auto_close: overlay.auto_close.or(self.auto_close),
            visibility: overlay.visibility.or(self.visibility),
            phases_enabled: overlay.phases_enabled.or(self.phases_enabled),
        }
    }

    /// Use `name` when neither bag set one.
    #[must_use]
    pub fn or_name(mut self, name: Option<&str>) -> Self {
        if self.name.as_deref().is_none_or(str::is_empty) {
            self.name = name.filter(|n| !n.is_empty()).map(str::to_string);
        }
        self
    }

    /// Fill defaults. Without a configured name one is generated from the
    /// scenario name plus six random hex digits.
    pub fn into_payload(self, scenario_name: &str) -> OperationPayload {
        let name = self.name.filter(|n| !n.is_empty()).unwrap_or_else(|| {
            let suffix = Uuid::new_v4().simple().to_string();
            let base = if scenario_name.is_empty() { "simulation" } else { scenario_name };
            format!("{base}-{}", &suffix[..6])
        });
        OperationPayload {
            name,
            adversary_id: self.adversary_id.unwrap_or_default(),
            group: self.group.unwrap_or_default(),
            planner: self.planner.unwrap_or_else(|| "atomic".into()),
            source: self.source.unwrap_or_else(|| "basic".into()),
            jitter: self.jitter.unwrap_or_else(|| "2/8".into()),
            autonomous: self.autonomous.unwrap_or(1),
            auto_close: self.auto_close.unwrap_or(0),
            visibility: self.visibility.unwrap_or(50),
            phases_enabled: self.phases_enabled.unwrap_or(1),
        }
    }
}

fn invalid_metadata(e: serde_json::Error) -> BasError {
    BasError::new(
        ErrorCode::InvalidStepMetadata,
        format!("invalid remote operation settings: {e}"),
    )
}

/// Body submitted to create an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPayload {
    /// Operation name.
    pub name: String,
    /// Adversary profile.
    pub adversary_id: String,
    /// Agent group.
    pub group: String,
    /// Planner.
    pub planner: String,
    /// Fact source.
    pub source: String,
    /// Agent check-in jitter.
    pub jitter: String,
    /// Autonomous mode flag.
    pub autonomous: i64,
    /// Close automatically when done.
    pub auto_close: i64,
    /// Visibility threshold.
    pub visibility: i64,
    /// Honour adversary phases.
    pub phases_enabled: i64,
}

/// Cross-step context recorded by `create_operation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationContext {
    /// Remote operation id.
    pub operation_id: String,
    /// Payload that was submitted.
    pub operation_payload: OperationPayload,
}

/// Report produced by `collect_results`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    /// Final operation snapshot.
    pub operation: Operation,
    /// Link chain.
    pub links: Vec<Link>,
    /// Link detail for every link that could be fetched.
    pub artifacts: Vec<Value>,
}

#[derive(Debug, Default)]
struct OperationState {
    operation_id: String,
    links_seen: HashSet<String>,
    final_operation: Option<Operation>,
}

/// Adapter for [`Platform::RemoteOperation`].
pub struct RemoteOperationAdapter {
    client: Arc<dyn OperationClient>,
    poll_interval: Duration,
    poll_timeout: Duration,
    operation_name: Option<String>,
    operations: Mutex<HashMap<Uuid, OperationState>>,
}

impl std::fmt::Debug for RemoteOperationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteOperationAdapter")
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .field("operation_name", &self.operation_name)
            .finish_non_exhaustive()
    }
}

impl RemoteOperationAdapter {
    /// Adapter backed by an [`HttpOperationClient`].
    pub fn new(settings: &RemoteSettings) -> Result<Self, RemoteError> {
        let client = HttpOperationClient::new(settings)?;
        Ok(Self::with_client(settings, Arc::new(client)))
    }

    /// Adapter backed by an arbitrary client.
    pub fn with_client(settings: &RemoteSettings, client: Arc<dyn OperationClient>) -> Self {
        Self {
            client,
            poll_interval: settings.poll_interval(),
            poll_timeout: settings.poll_timeout(),
            operation_name: settings.operation_name.clone().filter(|n| !n.is_empty()),
            operations: Mutex::new(HashMap::new()),
        }
    }

    /// Operation id recorded for `job_id`, if any.
    pub fn operation_id(&self, job_id: Uuid) -> Option<String> {
        self.table().get(&job_id).map(|s| s.operation_id.clone())
    }

    fn table(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, OperationState>> {
        self.operations.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn require_operation(&self, job_id: Uuid) -> Result<String, RemoteError> {
        self.operation_id(job_id)
            .ok_or(RemoteError::NotInitialized(job_id))
    }

    async fn create_operation(&self, ctx: &StepContext, auto_start: bool) -> Result<StepOutcome> {
        let settings = OperationSettings::from_bag(&ctx.scenario_metadata)?
            .overlay(OperationSettings::from_bag(&ctx.parameters)?)
            .or_name(self.operation_name.as_deref());
        let payload = settings.into_payload(&ctx.scenario_name);
        let body = serde_json::to_value(&payload)?;

        let operation = self.client.create_operation(body).await.map_err(remote)?;
        let operation_id = operation.require_id().map_err(remote)?.to_string();
        if auto_start {
            self.client
                .set_operation_state(&operation_id, "running")
                .await
                .map_err(remote)?;
        }
        info!(
            target: "bas.remote",
            job_id = %ctx.job_id,
            %operation_id,
            auto_start,
            "remote operation created"
        );

        self.table().insert(
            ctx.job_id,
            OperationState {
                operation_id: operation_id.clone(),
                ..OperationState::default()
            },
        );

        let detail = OperationContext {
            operation_id: operation_id.clone(),
            operation_payload: payload,
        };
        Ok(StepOutcome::success()
            .with_output(format!("created remote operation {operation_id}"))
            .with_data("operation_id", json!(operation_id))
            .with_data("operation", serde_json::to_value(&operation)?)
            .with_job_context(PlatformContext::new().with_section(CONTEXT_KEY, &detail)?))
    }

    async fn await_links(&self, job_id: Uuid, minimum_links: usize) -> Result<StepOutcome> {
        let operation_id = self.require_operation(job_id).map_err(remote)?;
        let deadline = Instant::now() + self.poll_timeout;
        let mut new_links = Vec::new();
        let mut total = self.seen_count(job_id);

        while Instant::now() < deadline {
            let operation = self.client.get_operation(&operation_id).await.map_err(remote)?;
            {
                let mut table = self.table();
                let Some(state) = table.get_mut(&job_id) else {
                    return Err(remote(RemoteError::NotInitialized(job_id)));
                };
                for link in operation.chain {
                    if let Some(id) = link.id.clone()
                        && state.links_seen.insert(id)
                    {
                        new_links.push(link);
                    }
                }
                total = state.links_seen.len();
            }
            debug!(
                target: "bas.remote",
                %job_id,
                %operation_id,
                total,
                minimum_links,
                "polled operation links"
            );
            if total >= minimum_links {
                return Ok(StepOutcome::success()
                    .with_output(format!("observed {total} links"))
                    .with_data("new_links", serde_json::to_value(&new_links)?)
                    .with_data("total_links", json!(total)));
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(remote(RemoteError::OperationTimeout(format!(
            "operation {operation_id} produced only {total} links in allotted time (wanted {minimum_links})"
        ))))
    }

    fn seen_count(&self, job_id: Uuid) -> usize {
        self.table().get(&job_id).map_or(0, |s| s.links_seen.len())
    }

    async fn await_completion(
        &self,
        job_id: Uuid,
        terminal_states: &[String],
    ) -> Result<StepOutcome> {
        let operation_id = self.require_operation(job_id).map_err(remote)?;
        let deadline = Instant::now() + self.poll_timeout;

        while Instant::now() < deadline {
            let operation = self.client.get_operation(&operation_id).await.map_err(remote)?;
            let state = operation.state.clone().unwrap_or_default();
            debug!(target: "bas.remote", %job_id, %operation_id, %state, "polled operation state");
            if terminal_states.iter().any(|t| *t == state) {
                if let Some(entry) = self.table().get_mut(&job_id) {
                    entry.final_operation = Some(operation);
                }
                return Ok(StepOutcome::success()
                    .with_output(format!("operation reached state {state}"))
                    .with_data("state", json!(state)));
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(remote(RemoteError::OperationTimeout(format!(
            "timed out waiting for operation {operation_id} to reach one of {terminal_states:?}"
        ))))
    }

    async fn collect_results(&self, job_id: Uuid) -> Result<StepOutcome> {
        let operation_id = self.require_operation(job_id).map_err(remote)?;
        let cached = self.table().get(&job_id).and_then(|s| s.final_operation.clone());
        let operation = match cached {
            Some(op) => op,
            None => self.client.get_operation(&operation_id).await.map_err(remote)?,
        };
        let links = self.client.operation_links(&operation_id).await.map_err(remote)?;

        let mut artifacts = Vec::new();
        for link_id in links.iter().filter_map(|l| l.id.as_deref()) {
            match self.client.link_detail(link_id).await {
                Ok(detail) => artifacts.push(detail),
                Err(e) => {
                    debug!(
                        target: "bas.remote",
                        %job_id,
                        link_id,
                        error = %e,
                        "skipping link detail"
                    );
                }
            }
        }

        let report = OperationReport {
            operation,
            links,
            artifacts,
        };
        info!(
            target: "bas.remote",
            %job_id,
            %operation_id,
            links = report.links.len(),
            artifacts = report.artifacts.len(),
            "remote operation results collected"
        );
        Ok(StepOutcome::success()
            .with_output(format!(
                "collected {} links and {} link details",
                report.links.len(),
                report.artifacts.len()
            ))
            .with_data("report", serde_json::to_value(&report)?)
            .with_job_context(PlatformContext::new().with_section(REPORT_CONTEXT_KEY, &report)?))
    }
}

fn remote(err: RemoteError) -> anyhow::Error {
    anyhow::Error::new(BasError::from(err))
}

#[async_trait]
impl PlatformAdapter for RemoteOperationAdapter {
    fn platform(&self) -> Platform {
        Platform::RemoteOperation
    }

    async fn execute_step(&self, step: &Step, context: &StepContext) -> Result<StepOutcome> {
        let action = StepAction::from_metadata(&step.platform_metadata)?;
        debug!(
            target: "bas.remote",
            job_id = %context.job_id,
            step_id = %step.step_id,
            ?action,
            "executing remote step"
        );
        match action {
            StepAction::CreateOperation { auto_start } => {
                self.create_operation(context, auto_start).await
            }
            StepAction::AwaitLinks { minimum_links } => {
                self.await_links(context.job_id, minimum_links).await
            }
            StepAction::AwaitCompletion { terminal_states } => {
                self.await_completion(context.job_id, &terminal_states).await
            }
            StepAction::CollectResults => self.collect_results(context.job_id).await,
            StepAction::Noop => Ok(StepOutcome::success()
                .with_output("no remote action defined")
                .with_data("detail", json!("no remote action defined"))),
        }
    }

    async fn get_job_status(&self, job_id: Uuid) -> Result<AdapterJobStatus> {
        let Some(operation_id) = self.operation_id(job_id) else {
            return Ok(AdapterJobStatus::new(job_id, "not_started"));
        };
        let operation = self.client.get_operation(&operation_id).await.map_err(remote)?;
        let state = operation.state.clone().unwrap_or_else(|| "unknown".into());
        Ok(AdapterJobStatus::new(job_id, state)
            .with_detail("operation_id", json!(operation_id))
            .with_detail("operation", serde_json::to_value(&operation)?))
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<bool> {
        let Some(operation_id) = self.operation_id(job_id) else {
            return Ok(false);
        };
        self.client
            .set_operation_state(&operation_id, "finished")
            .await
            .map_err(remote)?;
        self.table().remove(&job_id);
        info!(target: "bas.remote", %job_id, %operation_id, "remote operation finished on cancel");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(v: Value) -> Metadata {
        match v {
            Value::Object(m) => m.into_iter().collect(),
            _ => Metadata::new(),
        }
    }

    fn action(key: &str, action: &str) -> Result<StepAction, BasError> {
        StepAction::from_metadata(&meta(json!({ key: { "action": action } })))
    }

    #[test]
    fn action_defaults() {
        assert_eq!(StepAction::from_metadata(&Metadata::new()).unwrap(), StepAction::Noop);
        assert_eq!(
            action("remote_operation", "await_links").unwrap(),
            StepAction::AwaitLinks { minimum_links: 1 }
        );
        assert_eq!(
            action("caldera", "await_completion").unwrap(),
            StepAction::AwaitCompletion {
                terminal_states: vec!["finished".into(), "cleanup".into()]
            }
        );
        assert_eq!(
            action("remote_operation", "create_operation").unwrap(),
            StepAction::CreateOperation { auto_start: true }
        );
    }

    #[test]
    fn unknown_action_is_invalid_metadata() {
        let err = action("remote_operation", "detonate").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStepMetadata);
    }

    #[test]
    fn payload_defaults_and_overlay() {
        let scenario = meta(json!({
            "remote_operation": {"operation": {"planner": "batch", "autonomous": false}}
        }));
        let params = meta(json!({
            "remote_operation": {"operation": {"planner": "buckets", "visibility": "80"}}
        }));
        let payload = OperationSettings::from_bag(&scenario)
            .unwrap()
            .overlay(OperationSettings::from_bag(&params).unwrap())
            .into_payload("lateral");
        assert_eq!(payload.planner, "buckets");
        assert_eq!(payload.autonomous, 0);
        assert_eq!(payload.visibility, 80);
        assert_eq!(payload.jitter, "2/8");
        assert_eq!(payload.source, "basic");
        assert!(payload.name.starts_with("lateral-"));
        assert_eq!(payload.name.len(), "lateral-".len() + 6);
    }

    #[test]
    fn configured_name_only_fills_a_missing_name() {
        let named = meta(json!({"remote_operation": {"operation": {"name": "from-scenario"}}}));
        let payload = OperationSettings::from_bag(&named)
            .unwrap()
            .or_name(Some("nightly"))
            .into_payload("lateral");
        assert_eq!(payload.name, "from-scenario");

        let payload = OperationSettings::default().or_name(Some("nightly")).into_payload("lateral");
        assert_eq!(payload.name, "nightly");

        let payload = OperationSettings::default().or_name(Some("")).into_payload("lateral");
        assert!(payload.name.starts_with("lateral-"));
    }
}
