//! Background worker: runs one pipeline for one job on its own OS thread.
//!
//! The pipeline is blocking, so it never runs on the async runtime. The
//! worker is the only writer of the job's status; stream consumers only read.

use crate::coordinator::{CoordinatorLimits, StageCoordinator};
use crate::error::{JobError, Result};
use crate::event::JobEvent;
use crate::job::Job;
use crate::pipeline::{JudgingPipeline, Submission};
use crate::verdict::interpret_output;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// Everything needed to execute one job.
pub struct JobWorker {
    job: Arc<Job>,
    submission: Submission,
    pipeline: Arc<dyn JudgingPipeline>,
    limits: CoordinatorLimits,
}

impl JobWorker {
    pub(crate) fn new(
        job: Arc<Job>,
        submission: Submission,
        pipeline: Arc<dyn JudgingPipeline>,
        limits: CoordinatorLimits,
    ) -> Self {
        Self {
            job,
            submission,
            pipeline,
            limits,
        }
    }

    /// Launch on a dedicated named thread and return immediately.
    pub fn spawn(self) -> Result<JoinHandle<()>> {
        let job_id = self.job.id().clone();
        let name = format!("tribunal-job-{}", short_id(job_id.as_str()));

        thread::Builder::new()
            .name(name)
            .spawn(move || self.run())
            .map_err(|source| JobError::WorkerSpawn { job_id, source })
    }

    /// Execute the pipeline to completion on the current thread.
    ///
    /// Exactly one terminal transition happens here, whatever the pipeline
    /// does, including panicking.
    pub fn run(self) {
        let job = Arc::clone(&self.job);
        if let Err(e) = job.start() {
            error!("Job {} not started: {}", job.id(), e);
            // Streams wait for a terminal status, so never leave one missing
            if !job.is_terminal() {
                if let Err(transition) = job.fail(format!("worker could not start: {}", e)) {
                    error!("{}", transition);
                }
            }
            return;
        }
        job.append(JobEvent::session_started(
            self.submission.team_name.clone(),
            job.id().clone(),
        ));

        let coordinator = StageCoordinator::new(Arc::clone(&job), self.limits);
        coordinator.announce_first_stage();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pipeline
                .run(&self.submission, &coordinator, &coordinator)
        }));

        let transition = match outcome {
            Ok(Ok(output)) => {
                let verdict = interpret_output(&output, &self.submission.team_name);
                info!(
                    "Job {} pipeline finished after {} stage(s)",
                    job.id(),
                    coordinator.completed()
                );
                job.complete(verdict)
            }
            Ok(Err(e)) => {
                error!("Job {} pipeline failed: {:#}", job.id(), e);
                job.fail(format!("{:#}", e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Job {} pipeline panicked: {}", job.id(), message);
                job.fail(format!("pipeline panicked: {}", message))
            }
        };

        if let Err(e) = transition {
            error!("Job {} terminal transition rejected: {}", job.id(), e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}
