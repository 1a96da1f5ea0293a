//! Judge service: the entry point an API layer calls.
//!
//! Owns the registry, the pipeline and the stream policy. Every method is
//! safe to call from any thread or task.

use crate::config::TribunalConfig;
use crate::coordinator::CoordinatorLimits;
use crate::error::Result;
use crate::event::JobEvent;
use crate::ids::JobId;
use crate::job::{JobSnapshot, JobStatus};
use crate::pipeline::{JudgingPipeline, Submission};
use crate::registry::JobRegistry;
use crate::stage::StageId;
use crate::stream::{event_stream, sse_stream, StreamPolicy};
use crate::verdict::Verdict;
use crate::worker::JobWorker;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Message reported for jobs still in flight.
pub const IN_PROGRESS_MESSAGE: &str = "Still processing...";

/// Answer to a result query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResult {
    Pending {
        message: String,
    },
    Running {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        current_stage: Option<StageId>,
    },
    Complete {
        result: Verdict,
    },
    Error {
        error: String,
    },
}

impl JobResult {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending { .. } | Self::Running { .. })
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Self::Complete { result } => Some(result),
            _ => None,
        }
    }
}

pub struct JudgeService {
    registry: Arc<JobRegistry>,
    pipeline: Arc<dyn JudgingPipeline>,
    policy: StreamPolicy,
    limits: CoordinatorLimits,
}

impl JudgeService {
    pub fn new(pipeline: Arc<dyn JudgingPipeline>) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            pipeline,
            policy: StreamPolicy::default(),
            limits: CoordinatorLimits::default(),
        }
    }

    pub fn from_config(pipeline: Arc<dyn JudgingPipeline>, config: &TribunalConfig) -> Self {
        Self::new(pipeline)
            .with_policy(config.policy())
            .with_limits(config.limits())
    }

    pub fn with_policy(mut self, policy: StreamPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limits(mut self, limits: CoordinatorLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Share an existing registry, e.g. between services with different pipelines.
    pub fn with_registry(mut self, registry: Arc<JobRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> StreamPolicy {
        self.policy
    }

    /// Register a job and launch its worker. Returns without waiting.
    pub fn start(&self, label: impl Into<String>, submission: Submission) -> Result<JobId> {
        let job = self.registry.create(label);
        let job_id = job.id().clone();

        let worker = JobWorker::new(
            Arc::clone(&job),
            submission,
            Arc::clone(&self.pipeline),
            self.limits,
        );
        if let Err(e) = worker.spawn() {
            error!("{}", e);
            if let Err(transition) = job.fail(e.to_string()) {
                error!("{}", transition);
            }
            return Err(e);
        }

        info!("Launched worker for job {}", job_id);
        Ok(job_id)
    }

    /// Live event stream, ending with the terminal event.
    pub fn stream(&self, id: &JobId) -> Result<BoxStream<'static, JobEvent>> {
        let job = self.registry.get(id)?;
        Ok(event_stream(job, self.policy))
    }

    /// [`Self::stream`] encoded as SSE frames.
    pub fn stream_sse(&self, id: &JobId) -> Result<BoxStream<'static, String>> {
        let job = self.registry.get(id)?;
        Ok(sse_stream(job, self.policy))
    }

    pub fn get_result(&self, id: &JobId) -> Result<JobResult> {
        let job = self.registry.get(id)?;
        let current_stage = job.current_stage();

        Ok(match job.status() {
            JobStatus::Pending { .. } => JobResult::Pending {
                message: IN_PROGRESS_MESSAGE.to_string(),
            },
            JobStatus::Running { .. } => JobResult::Running {
                message: IN_PROGRESS_MESSAGE.to_string(),
                current_stage,
            },
            JobStatus::Complete { result, .. } => JobResult::Complete { result },
            JobStatus::Error { error, .. } => JobResult::Error { error },
        })
    }

    /// Every event emitted so far, without consuming the live channel.
    pub fn events(&self, id: &JobId) -> Result<Vec<JobEvent>> {
        Ok(self.registry.get(id)?.events())
    }

    /// Jobs newest first, optionally filtered by status string.
    pub fn list(&self, status_filter: Option<&str>, limit: usize) -> Vec<JobSnapshot> {
        self.registry
            .list(status_filter, limit)
            .iter()
            .map(|job| job.snapshot())
            .collect()
    }
}

impl std::fmt::Debug for JudgeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JudgeService")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .field("limits", &self.limits)
            .finish()
    }
}
