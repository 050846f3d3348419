// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration through to findings using the mock platform.

use breach_sim::config::parse_toml;
use breach_sim::runtime::BroadcastObserver;
use breach_sim::{Engine, JobStatus, Platform, Scenario, Step};
use std::sync::Arc;

const CONFIG: &str = r#"
[engine]
step_pacing_ms = 0
retention = { max_terminal_jobs = 8 }

[mock]
success_rate = 0.5
max_latency_ms = 0
seed = 42
"#;

fn scenario(name: &str, steps: usize) -> Scenario {
    (0..steps).fold(Scenario::new(name, name, Platform::Mock), |s, i| {
        s.with_step(Step::new(format!("{name}-{i}"), format!("{name} step {i}")))
    })
}

async fn run_once(seed_config: &str) -> (usize, usize) {
    let config = parse_toml(seed_config).unwrap();
    let engine = Engine::with_default_adapters(&config);
    let job = engine.start_simulation(scenario("det", 10)).await.unwrap();
    let job = engine.join(job.job_id).await.unwrap();
    (job.steps_completed, job.steps_failed)
}

#[tokio::test]
async fn seeded_mock_runs_are_reproducible() {
    let first = run_once(CONFIG).await;
    let second = run_once(CONFIG).await;
    assert_eq!(first, second);
    assert_eq!(first.0 + first.1, 10);
}

#[tokio::test]
async fn success_rate_parameter_overrides_config() {
    let config = parse_toml(CONFIG).unwrap();
    let engine = Engine::with_default_adapters(&config);
    let s = scenario("forced", 5).with_parameter("success_rate", serde_json::json!(1.0));
    let job = engine.start_simulation(s).await.unwrap();
    let job = engine.join(job.job_id).await.unwrap();
    assert_eq!(job.steps_completed, 5);
    let findings = job.findings.unwrap();
    assert!(findings
        .recommendations
        .contains(&"High success rate indicates potential security gaps".to_string()));
    assert_eq!(findings.metrics.efficiency_score, 1.0);
}

#[tokio::test]
async fn observer_stream_matches_job_log() {
    let config = parse_toml(CONFIG).unwrap();
    let engine = Engine::with_default_adapters(&config);
    let observer = BroadcastObserver::with_capacity(1024);
    let mut sub = observer.subscribe();
    engine.set_observer(Some(Arc::new(observer)));

    let job = engine.start_simulation(scenario("obs", 3)).await.unwrap();
    let job = engine.join(job.job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let mut event_ids = Vec::new();
    while let Some(n) = sub.try_recv() {
        if n.event_type == "simulation_event" {
            event_ids.push(n.payload["event"]["event_id"].as_str().unwrap().to_string());
        }
    }
    let logged: Vec<String> = job.events.iter().map(|e| e.event_id.to_string()).collect();
    assert_eq!(event_ids, logged);
}

#[tokio::test]
async fn list_reflects_every_started_job() {
    let config = parse_toml(CONFIG).unwrap();
    let engine = Engine::with_default_adapters(&config);
    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(
            engine
                .start_simulation(scenario(&format!("job{i}"), 2))
                .await
                .unwrap()
                .job_id,
        );
    }
    for id in &ids {
        engine.join(*id).await.unwrap();
    }
    let jobs = engine.list_active_jobs().await;
    assert_eq!(jobs.len(), 3);
    assert!(jobs.iter().all(|j| j.status.is_terminal()));
}
