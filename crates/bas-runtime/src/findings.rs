// SPDX-License-Identifier: MIT OR Apache-2.0
//! Findings computed when a job completes.

use bas_core::{Findings, FindingsMetrics, FindingsSummary, Job, Platform};

/// Runs at or beyond this many seconds have their efficiency halved.
pub const SLOW_RUN_SECS: f64 = 300.0;

/// Summarise a finished job.
pub fn compute_findings(job: &Job) -> Findings {
    let execution_time_seconds = match (job.start_time, job.end_time) {
        (Some(start), Some(end)) => (end - start).num_milliseconds().max(0) as f64 / 1000.0,
        _ => 0.0,
    };
    let denominator = job.total_steps.max(1) as f64;
    let success_rate = job.success_rate();

    let efficiency = if execution_time_seconds < SLOW_RUN_SECS { 1.0 } else { 0.5 };

    Findings {
        summary: FindingsSummary {
            scenario_name: job.scenario.name.clone(),
            execution_time_seconds,
            steps_completed: job.steps_completed,
            steps_failed: job.steps_failed,
            success_rate,
            overall_status: job.status,
        },
        metrics: FindingsMetrics {
            time_per_step: execution_time_seconds / denominator,
            error_rate: job.steps_failed as f64 / denominator,
            efficiency_score: success_rate * efficiency,
        },
        recommendations: recommendations(job, success_rate),
        artifacts: collect_artifacts(job),
    }
}

fn recommendations(job: &Job, success_rate: f64) -> Vec<String> {
    let mut out = Vec::new();
    if success_rate < 0.5 {
        out.push("High failure rate detected - review defensive controls".to_string());
    }
    if job.steps_failed > 0 {
        out.push("Some simulation steps failed - investigate target environment".to_string());
    }
    if success_rate > 0.8 {
        out.push("High success rate indicates potential security gaps".to_string());
    }
    if job.scenario.platform == Platform::Mock {
        out.push(
            "This was a mock simulation - integrate with real platforms for accurate results"
                .to_string(),
        );
    }
    out
}

/// Artifact names recorded in event metadata, in event order.
fn collect_artifacts(job: &Job) -> Vec<String> {
    job.events
        .iter()
        .filter_map(|e| e.metadata.get("artifacts"))
        .filter_map(|v| v.as_array())
        .flatten()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bas_core::{EventKind, JobStatus, Metadata, Scenario, Severity, Step};
    use chrono::Duration;
    use serde_json::json;

    fn finished(platform: Platform, total: usize, completed: usize, secs: i64) -> Job {
        let scenario = (0..total).fold(Scenario::new("f", "findings", platform), |s, i| {
            s.with_step(Step::new(format!("s{i}"), "x"))
        });
        let mut job = Job::new(scenario);
        job.steps_completed = completed;
        job.steps_failed = total - completed;
        job.status = JobStatus::Completed;
        let end = chrono::Utc::now();
        job.start_time = Some(end - Duration::seconds(secs));
        job.end_time = Some(end);
        job
    }

    #[test]
    fn all_green_mock_run() {
        let f = compute_findings(&finished(Platform::Mock, 4, 4, 10));
        assert_eq!(f.summary.success_rate, 1.0);
        assert_eq!(f.metrics.efficiency_score, 1.0);
        assert_eq!(f.metrics.error_rate, 0.0);
        assert_eq!(
            f.recommendations,
            vec![
                "High success rate indicates potential security gaps".to_string(),
                "This was a mock simulation - integrate with real platforms for accurate results"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn slow_failing_run_is_penalised() {
        let f = compute_findings(&finished(Platform::RemoteOperation, 4, 1, 600));
        assert_eq!(f.summary.success_rate, 0.25);
        assert_eq!(f.metrics.efficiency_score, 0.125);
        assert_eq!(f.metrics.time_per_step, 150.0);
        assert_eq!(f.recommendations.len(), 2);
        assert!(f.recommendations[0].starts_with("High failure rate"));
    }

    #[test]
    fn empty_scenario_guards_division() {
        let f = compute_findings(&finished(Platform::Custom, 0, 0, 1));
        assert_eq!(f.summary.success_rate, 0.0);
        assert_eq!(f.metrics.error_rate, 0.0);
        assert_eq!(f.metrics.time_per_step, 1.0);
    }

    #[test]
    fn artifacts_are_flattened_in_event_order() {
        let mut job = finished(Platform::Mock, 2, 2, 1);
        for name in ["a.log", "b.log"] {
            let mut meta = Metadata::new();
            meta.insert("artifacts".into(), json!([name]));
            job.add_event(EventKind::StepCompleted, "done", Severity::Info, meta);
        }
        assert_eq!(compute_findings(&job).artifacts, vec!["a.log", "b.log"]);
    }
}
