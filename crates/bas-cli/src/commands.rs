// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the `bas` CLI.
//!
//! These functions are library-level so they can be tested without
//! spawning the binary.

use anyhow::{Context, Result};
use bas_config::{ConfigWarning, EngineConfig, load_config, validate_config};
use bas_core::{Findings, Job, Scenario};
use bas_remote::{HealthReport, check_health};
use bas_runtime::{Engine, configure_remote_adapter};
use schemars::schema_for;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const FINISH_POLL: Duration = Duration::from_millis(25);

/// Schema types that can be printed by the `schema` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// JSON schema for [`Scenario`].
    Scenario,
    /// JSON schema for [`Findings`].
    Findings,
    /// JSON schema for [`EngineConfig`].
    Config,
}

/// Return the JSON schema string for the given kind.
pub fn schema_json(kind: SchemaKind) -> Result<String> {
    let value = match kind {
        SchemaKind::Scenario => serde_json::to_value(schema_for!(Scenario))?,
        SchemaKind::Findings => serde_json::to_value(schema_for!(Findings))?,
        SchemaKind::Config => serde_json::to_value(schema_for!(EngineConfig))?,
    };
    serde_json::to_string_pretty(&value).context("serialize schema")
}

/// Load configuration from `path` (or defaults), apply `BAS_*` environment
/// overrides and validate. Warnings are logged and returned.
pub fn resolve_config(path: Option<&Path>) -> Result<(EngineConfig, Vec<ConfigWarning>)> {
    let config = load_config(path).context("load configuration")?;
    let warnings = validate_config(&config).context("validate configuration")?;
    for w in &warnings {
        warn!(target: "bas.cli", warning = %w, "configuration warning");
    }
    Ok((config, warnings))
}

/// Validate a configuration file without applying environment overrides.
pub fn validate_config_file(path: &Path) -> Result<Vec<ConfigWarning>> {
    let config = load_config(Some(path))
        .with_context(|| format!("load config '{}'", path.display()))?;
    validate_config(&config).with_context(|| format!("validate config '{}'", path.display()))
}

/// Read and parse a scenario JSON file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read scenario '{}'", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parse scenario from '{}'", path.display()))
}

/// Build an engine with the mock adapter and, when enabled, the
/// remote-operation adapter. `seed` overrides the configured mock seed.
pub fn build_engine(mut config: EngineConfig, seed: Option<u64>) -> Engine {
    if seed.is_some() {
        config.mock.seed = seed;
    }
    let engine = Engine::with_default_adapters(&config);
    configure_remote_adapter(&engine, &config.remote);
    engine
}

/// Start `scenario`, wait for it to finish and return the final snapshot.
/// Ctrl-C cancels the job and shuts the engine down.
pub async fn run_scenario(engine: &Engine, scenario: Scenario) -> Result<Job> {
    run_until(engine, scenario, async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Like [`run_scenario`], with `interrupt` standing in for Ctrl-C.
pub async fn run_until(
    engine: &Engine,
    scenario: Scenario,
    interrupt: impl Future<Output = ()>,
) -> Result<Job> {
    let started = engine
        .start_simulation(scenario)
        .await
        .context("start simulation")?;
    let job_id = started.job_id;
    info!(target: "bas.cli", %job_id, "waiting for simulation");

    // The task handle stays registered until the job is done so that
    // `shutdown` can still abort it.
    let interrupted = tokio::select! {
        () = wait_finished(engine, job_id) => false,
        () = interrupt => true,
    };
    if interrupted {
        warn!(target: "bas.cli", %job_id, "interrupted; cancelling");
        engine.cancel_simulation(job_id).await;
        engine.shutdown().await;
    }
    engine.join(job_id).await.context("join simulation")
}

async fn wait_finished(engine: &Engine, job_id: Uuid) {
    while !engine.is_finished(job_id) {
        tokio::time::sleep(FINISH_POLL).await;
    }
}

/// Check the remote automation service described by `config`.
pub async fn health(config: &EngineConfig) -> HealthReport {
    check_health(&config.remote).await
}
