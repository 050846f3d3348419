// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tests for job counters and the job state machine.

use bas_core::{Job, JobStatus, Platform, Scenario, Step};
use proptest::prelude::*;

fn scenario(steps: usize) -> Scenario {
    (0..steps).fold(Scenario::new("prop", "prop", Platform::Mock), |s, i| {
        s.with_step(Step::new(format!("s{i}"), format!("step {i}")))
    })
}

fn any_status() -> impl Strategy<Value = JobStatus> {
    prop_oneof![
        Just(JobStatus::Pending),
        Just(JobStatus::Initializing),
        Just(JobStatus::Running),
        Just(JobStatus::Paused),
        Just(JobStatus::Completed),
        Just(JobStatus::Failed),
        Just(JobStatus::Cancelled),
    ]
}

proptest! {
    #[test]
    fn progress_matches_counters(outcomes in proptest::collection::vec(any::<bool>(), 0..32)) {
        let mut job = Job::new(scenario(outcomes.len()));
        let mut last = 0.0;
        for ok in outcomes {
            if ok { job.steps_completed += 1 } else { job.steps_failed += 1 }
            job.update_progress();
            prop_assert!(job.steps_processed() <= job.total_steps);
            let expected = 100.0 * job.steps_completed as f64 / job.total_steps as f64;
            prop_assert!((job.progress_percentage - expected).abs() < 1e-9);
            prop_assert!(job.progress_percentage >= last);
            last = job.progress_percentage;
        }
    }

    #[test]
    fn terminal_status_is_never_left(path in proptest::collection::vec(any_status(), 1..24)) {
        let mut job = Job::new(scenario(1));
        let mut reached_terminal = None;
        for next in path {
            let before = job.status;
            match job.transition(next) {
                Ok(()) => {
                    prop_assert!(before.can_transition_to(next));
                    prop_assert!(reached_terminal.is_none());
                }
                Err(e) => {
                    prop_assert_eq!(e.from, before);
                    prop_assert_eq!(job.status, before);
                }
            }
            if job.is_terminal() {
                reached_terminal.get_or_insert(job.status);
            }
        }
        if let Some(t) = reached_terminal {
            prop_assert_eq!(job.status, t);
        }
    }
}

#[test]
fn happy_path_edges() {
    let mut job = Job::new(scenario(2));
    for next in [
        JobStatus::Initializing,
        JobStatus::Running,
        JobStatus::Paused,
        JobStatus::Running,
        JobStatus::Completed,
    ] {
        job.transition(next).unwrap();
    }
    assert_eq!(job.status, JobStatus::Completed);
}
