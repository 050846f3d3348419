// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library-level command functions, exercised without the binary.

use bas_cli::commands::{build_engine, resolve_config, run_until};
use bas_config::{ConfigWarning, EngineConfig};
use bas_core::{EventKind, JobStatus, Platform, Scenario, Step};
use std::time::Duration;

fn scenario(steps: usize) -> Scenario {
    (0..steps).fold(Scenario::new("cli", "cli run", Platform::Mock), |s, i| {
        s.with_step(Step::new(format!("s{i}"), format!("Step {i}")))
    })
}

// ── 1. Running to completion ────────────────────────────────────────

#[tokio::test]
async fn run_until_waits_for_completion() {
    let mut config = EngineConfig::default();
    config.engine.step_pacing_ms = 0;
    config.mock.max_latency_ms = 0;
    let engine = build_engine(config, Some(5));

    let job = run_until(&engine, scenario(3), std::future::pending())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.steps_processed(), 3);
    assert!(engine.is_finished(job.job_id));
}

// ── 2. Interruption ─────────────────────────────────────────────────

#[tokio::test]
async fn interrupt_cancels_job_and_stops_its_task() {
    let mut config = EngineConfig::default();
    config.engine.step_pacing_ms = 1000;
    config.mock.max_latency_ms = 5000;
    let engine = build_engine(config, Some(5));

    let job = run_until(
        &engine,
        scenario(3),
        tokio::time::sleep(Duration::from_millis(20)),
    )
    .await
    .unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(engine.is_finished(job.job_id));
    assert_eq!(job.events.last().unwrap().kind, EventKind::SimulationCancelled);

    // The aborted task never writes to the job again.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let later = engine.get_job_status(job.job_id).await.unwrap();
    assert_eq!(later.events.len(), job.events.len());
    assert_eq!(later.steps_processed(), job.steps_processed());
}

// ── 3. Configuration ────────────────────────────────────────────────

#[test]
fn resolve_config_reads_file_and_returns_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bas.toml");
    std::fs::write(&path, "[mock]\nsuccess_rate = 0.25\n").unwrap();

    let (config, warnings) = resolve_config(Some(&path)).unwrap();
    assert_eq!(config.mock.success_rate, 0.25);
    assert!(warnings.contains(&ConfigWarning::UnboundedRetention));
}

#[test]
fn resolve_config_missing_file_is_an_error() {
    let err = resolve_config(Some(std::path::Path::new("/nonexistent/bas.toml"))).unwrap_err();
    assert!(format!("{err:#}").contains("load configuration"));
}
