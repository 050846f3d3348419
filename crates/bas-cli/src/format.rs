// SPDX-License-Identifier: MIT OR Apache-2.0
//! Human-readable rendering of job snapshots.

use bas_core::{Event, Job};
use std::fmt::Write;

/// One line per event: `[SEVERITY] kind: description`.
pub fn format_event(event: &Event) -> String {
    format!("[{}] {}: {}", event.severity, event.kind, event.description)
}

/// Multi-line summary of a finished job, including findings when present.
pub fn format_job(job: &Job) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "job_id:    {}", job.job_id);
    let _ = writeln!(out, "scenario:  {} ({})", job.scenario.name, job.scenario.scenario_id);
    let _ = writeln!(out, "platform:  {}", job.scenario.platform);
    let _ = writeln!(out, "status:    {}", job.status);
    let _ = writeln!(
        out,
        "steps:     {}/{} completed, {} failed",
        job.steps_completed, job.total_steps, job.steps_failed
    );
    let _ = writeln!(out, "progress:  {:.1}%", job.progress_percentage);

    out.push_str("events:\n");
    for event in &job.events {
        let _ = writeln!(out, "  {}", format_event(event));
    }

    if let Some(findings) = &job.findings {
        out.push_str("findings:\n");
        let _ = writeln!(
            out,
            "  success_rate:    {:.2}",
            findings.summary.success_rate
        );
        let _ = writeln!(
            out,
            "  execution_time:  {:.3}s",
            findings.summary.execution_time_seconds
        );
        let _ = writeln!(
            out,
            "  efficiency:      {:.2}",
            findings.metrics.efficiency_score
        );
        for rec in &findings.recommendations {
            let _ = writeln!(out, "  - {rec}");
        }
        if !findings.artifacts.is_empty() {
            let _ = writeln!(out, "  artifacts: {}", findings.artifacts.join(", "));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bas_core::{EventKind, Metadata, Platform, Scenario, Severity, Step};

    #[test]
    fn event_line_shows_severity_and_kind() {
        let ev = Event::new(
            EventKind::StepFailed,
            "Failed step: recon",
            Severity::Error,
            Metadata::new(),
        );
        assert_eq!(format_event(&ev), "[ERROR] step_failed: Failed step: recon");
    }

    #[test]
    fn job_summary_lists_counters_and_events() {
        let mut job = Job::new(
            Scenario::new("s-9", "Discovery", Platform::Mock).with_step(Step::new("a", "A")),
        );
        job.add_event(
            EventKind::SimulationStarted,
            "Started simulation: Discovery",
            Severity::Info,
            Metadata::new(),
        );
        let text = format_job(&job);
        assert!(text.contains("scenario:  Discovery (s-9)"));
        assert!(text.contains("steps:     0/1 completed, 0 failed"));
        assert!(text.contains("[INFO] simulation_started"));
        assert!(!text.contains("findings:"));
    }
}
