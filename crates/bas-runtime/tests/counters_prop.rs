// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tests over the engine's job counters.

use bas_adapter_mock::MockAdapter;
use bas_config::EngineConfig;
use bas_core::{EventKind, JobStatus, Platform, Scenario, Step};
use bas_runtime::Engine;
use proptest::prelude::*;

fn run(steps: usize, rate: f64, seed: u64) -> bas_core::Job {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    rt.block_on(async {
        let mut config = EngineConfig::default();
        config.engine.step_pacing_ms = 0;
        let engine = Engine::new(&config);
        engine.register_adapter(MockAdapter::instant(rate, seed));
        let scenario = (0..steps).fold(Scenario::new("p", "prop", Platform::Mock), |s, i| {
            s.with_step(Step::new(format!("s{i}"), format!("S{i}")))
        });
        let job = engine.start_simulation(scenario).await.unwrap();
        engine.join(job.job_id).await.unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn every_step_is_counted_once(steps in 0usize..8, rate in 0.0f64..=1.0, seed: u64) {
        let job = run(steps, rate, seed);
        prop_assert_eq!(job.status, JobStatus::Completed);
        prop_assert_eq!(job.steps_completed + job.steps_failed, steps);
        if steps > 0 {
            let expected = job.steps_completed as f64 / steps as f64 * 100.0;
            prop_assert!((job.progress_percentage - expected).abs() < 1e-9);
        } else {
            prop_assert_eq!(job.progress_percentage, 0.0);
        }
        let results = job
            .events
            .iter()
            .filter(|e| e.kind.is_step_result())
            .count();
        prop_assert_eq!(results, steps);
        prop_assert_eq!(job.events.last().map(|e| e.kind), Some(EventKind::SimulationCompleted));
        let findings = job.findings.unwrap();
        prop_assert_eq!(findings.summary.steps_completed, job.steps_completed);
        prop_assert!(findings.metrics.error_rate <= 1.0);
    }
}
