// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory job table with an optional retention bound.

use bas_config::RetentionPolicy;
use bas_core::Job;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A job shared between its execution task and status readers.
pub type SharedJob = Arc<RwLock<Job>>;

/// Jobs in creation order.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: HashMap<Uuid, SharedJob>,
    order: VecDeque<Uuid>,
}

impl JobTable {
    /// Insert a new job.
    pub fn insert(&mut self, job_id: Uuid, job: SharedJob) {
        if self.jobs.insert(job_id, job).is_none() {
            self.order.push_back(job_id);
        }
    }

    /// Look up a job.
    pub fn get(&self, job_id: &Uuid) -> Option<SharedJob> {
        self.jobs.get(job_id).cloned()
    }

    /// All jobs, oldest first.
    pub fn all(&self) -> Vec<SharedJob> {
        self.order
            .iter()
            .filter_map(|id| self.jobs.get(id).cloned())
            .collect()
    }

    /// Number of jobs held.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Evict the oldest terminal jobs until the policy holds. Returns the
    /// evicted ids.
    ///
    /// Jobs whose lock is currently held are treated as live.
    pub fn enforce(&mut self, policy: RetentionPolicy) -> Vec<Uuid> {
        let RetentionPolicy::MaxTerminalJobs(max) = policy else {
            return Vec::new();
        };
        let terminal: Vec<Uuid> = self
            .order
            .iter()
            .filter(|id| {
                self.jobs
                    .get(id)
                    .and_then(|j| j.try_read().ok().map(|g| g.is_terminal()))
                    .unwrap_or(false)
            })
            .copied()
            .collect();
        let excess = terminal.len().saturating_sub(max);
        let evicted: Vec<Uuid> = terminal.into_iter().take(excess).collect();
        for id in &evicted {
            self.jobs.remove(id);
        }
        self.order.retain(|id| self.jobs.contains_key(id));
        evicted
    }
}
