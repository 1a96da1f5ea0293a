//! Process-wide job registry.
//!
//! Built once at startup and shared as `Arc<JobRegistry>`. Jobs are never
//! removed; they live as long as the process.

use crate::error::{JobError, Result};
use crate::ids::JobId;
use crate::job::Job;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Maps job IDs to jobs. Safe for concurrent creation and lookup.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
    next_seq: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job for `label`.
    pub fn create(&self, label: impl Into<String>) -> Arc<Job> {
        let label = label.into();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);

        let mut id = JobId::new();
        while jobs.contains_key(&id) {
            id = JobId::new();
        }

        let job = Arc::new(Job::with_seq(id.clone(), label, seq));
        jobs.insert(id, Arc::clone(&job));
        drop(jobs);

        info!("Created job: {} ({})", job.id(), job.label());
        job
    }

    /// Look up a job. Unknown IDs yield [`JobError::NotFound`].
    pub fn get(&self, id: &JobId) -> Result<Arc<Job>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.clone()))
    }

    /// Jobs newest first, optionally filtered by status string.
    pub fn list(&self, status_filter: Option<&str>, limit: usize) -> Vec<Arc<Job>> {
        let mut jobs: Vec<Arc<Job>> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|job| status_filter.map_or(true, |s| job.status_str() == s))
            .cloned()
            .collect();

        jobs.sort_by(|a, b| b.seq().cmp(&a.seq()));
        jobs.truncate(limit);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.len())
            .finish()
    }
}
