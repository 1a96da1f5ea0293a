//! Error types for the job subsystem.
//!
//! Pipeline failures are not errors of this crate: they are recorded on the
//! job and surfaced as an `error` event and through `get_result`.

use crate::ids::JobId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    /// No job with this ID was ever created in this process
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Status transitions are monotonic
    #[error("Job {job_id} is already {status}")]
    AlreadyTerminal { job_id: JobId, status: &'static str },

    /// Only a pending job can start running
    #[error("Job {job_id} cannot start from status {status}")]
    NotPending { job_id: JobId, status: &'static str },

    #[error("Failed to spawn worker thread for job {job_id}: {source}")]
    WorkerSpawn {
        job_id: JobId,
        #[source]
        source: std::io::Error,
    },
}

impl JobError {
    /// True for errors a client caused by naming an unknown job.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, JobError>;
