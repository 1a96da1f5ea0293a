//! A judging job: status, ordered event log and live event channel.
//!
//! # Locking
//!
//! - `state` guards status and current stage. Terminal transitions append
//!   their terminal event while still holding the write lock, so a reader that
//!   observes a terminal status can always drain the terminal event (unless
//!   another consumer already took it).
//! - `log` guards the append-only log. Sending on the channel happens under
//!   the same lock, so log order and channel order are identical.
//! - `rx` is only touched by consumers, and only via `try_recv`.
//!
//! Lock order is always `state` before `log`. No lock is held across I/O or
//! an `.await`.

use crate::error::{JobError, Result};
use crate::event::JobEvent;
use crate::ids::JobId;
use crate::stage::StageId;
use crate::verdict::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Job status. Transitions only go `pending -> running -> complete | error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, worker not yet running
    Pending { queued_at: DateTime<Utc> },
    /// Pipeline is executing
    Running { started_at: DateTime<Utc> },
    /// Pipeline finished and produced a verdict
    Complete {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        result: Verdict,
    },
    /// Pipeline failed
    Error {
        started_at: Option<DateTime<Utc>>,
        failed_at: DateTime<Utc>,
        error: String,
    },
}

impl JobStatus {
    /// Get the status string
    pub fn status_str(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "pending",
            Self::Running { .. } => "running",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Pending { .. } => None,
            Self::Running { started_at } | Self::Complete { started_at, .. } => Some(*started_at),
            Self::Error { started_at, .. } => *started_at,
        }
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Complete { completed_at, .. } => Some(*completed_at),
            Self::Error { failed_at, .. } => Some(*failed_at),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct JobState {
    status: JobStatus,
    current_stage: Option<StageId>,
}

/// Point-in-time view of a job, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<StageId>,
    pub event_count: usize,
}

/// One end-to-end execution of the stage sequence for one submission.
pub struct Job {
    id: JobId,
    label: String,
    created_at: DateTime<Utc>,
    /// Registry insertion sequence; orders listings deterministically
    seq: u64,
    state: RwLock<JobState>,
    log: Mutex<Vec<JobEvent>>,
    tx: UnboundedSender<JobEvent>,
    rx: Mutex<UnboundedReceiver<JobEvent>>,
}

impl Job {
    /// Create a pending job. Normally done through [`crate::JobRegistry::create`].
    pub fn new(id: JobId, label: impl Into<String>) -> Self {
        Self::with_seq(id, label, 0)
    }

    pub(crate) fn with_seq(id: JobId, label: impl Into<String>, seq: u64) -> Self {
        let now = Utc::now();
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id,
            label: label.into(),
            created_at: now,
            seq,
            state: RwLock::new(JobState {
                status: JobStatus::Pending { queued_at: now },
                current_stage: None,
            }),
            log: Mutex::new(Vec::new()),
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Caller-supplied label (the team name).
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    // ------------------------------------------------------------------
    // State accessors
    // ------------------------------------------------------------------

    pub fn status(&self) -> JobStatus {
        self.read_state().status.clone()
    }

    pub fn status_str(&self) -> &'static str {
        self.read_state().status.status_str()
    }

    pub fn is_terminal(&self) -> bool {
        self.read_state().status.is_terminal()
    }

    pub fn current_stage(&self) -> Option<StageId> {
        self.read_state().current_stage
    }

    /// The verdict, present only once the job is complete.
    pub fn result(&self) -> Option<Verdict> {
        match &self.read_state().status {
            JobStatus::Complete { result, .. } => Some(result.clone()),
            _ => None,
        }
    }

    /// The failure description, present only once the job has failed.
    pub fn error(&self) -> Option<String> {
        match &self.read_state().status {
            JobStatus::Error { error, .. } => Some(error.clone()),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let (status, current_stage) = {
            let state = self.read_state();
            (state.status.status_str(), state.current_stage)
        };
        JobSnapshot {
            id: self.id.clone(),
            label: self.label.clone(),
            created_at: self.created_at,
            status,
            current_stage,
            event_count: self.lock_log().len(),
        }
    }

    // ------------------------------------------------------------------
    // Transitions (worker thread only, crate-private)
    // ------------------------------------------------------------------

    /// Transition from pending to running.
    pub(crate) fn start(&self) -> Result<()> {
        let mut state = self.write_state();
        if !matches!(state.status, JobStatus::Pending { .. }) {
            return Err(JobError::NotPending {
                job_id: self.id.clone(),
                status: state.status.status_str(),
            });
        }
        state.status = JobStatus::Running {
            started_at: Utc::now(),
        };
        drop(state);

        info!("Started job: {} ({})", self.id, self.label);
        Ok(())
    }

    pub(crate) fn set_current_stage(&self, stage: StageId) {
        self.write_state().current_stage = Some(stage);
    }

    /// Store the verdict, mark the job complete and emit the `verdict` event.
    pub(crate) fn complete(&self, result: Verdict) -> Result<()> {
        let mut state = self.write_state();
        self.ensure_not_terminal(&state.status)?;

        let started_at = state.status.started_at().unwrap_or(self.created_at);
        state.status = JobStatus::Complete {
            started_at,
            completed_at: Utc::now(),
            result: result.clone(),
        };
        self.append(JobEvent::verdict(result));
        drop(state);

        info!("Completed job: {}", self.id);
        Ok(())
    }

    /// Store the failure, mark the job failed and emit the `error` event.
    pub(crate) fn fail(&self, error: impl Into<String>) -> Result<()> {
        let error = error.into();
        let mut state = self.write_state();
        self.ensure_not_terminal(&state.status)?;

        let started_at = state.status.started_at();
        state.status = JobStatus::Error {
            started_at,
            failed_at: Utc::now(),
            error: error.clone(),
        };
        self.append(JobEvent::error(error.clone()));
        drop(state);

        warn!("Failed job {}: {}", self.id, error);
        Ok(())
    }

    fn ensure_not_terminal(&self, status: &JobStatus) -> Result<()> {
        if status.is_terminal() {
            return Err(JobError::AlreadyTerminal {
                job_id: self.id.clone(),
                status: status.status_str(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Event log and channel
    // ------------------------------------------------------------------

    /// Append to the log and publish on the live channel. Never blocks on consumers.
    ///
    /// The terminal event is always the last one: anything appended after it
    /// is dropped.
    pub(crate) fn append(&self, event: JobEvent) {
        let mut log = self.lock_log();
        if log.last().map_or(false, JobEvent::is_terminal) {
            warn!(
                "Job {} dropped {} event emitted after its terminal event",
                self.id,
                event.kind()
            );
            return;
        }
        debug!("Job {} event #{}: {}", self.id, log.len(), event.kind());
        log.push(event.clone());
        // The receiver lives as long as the job, so this cannot fail
        let _ = self.tx.send(event);
    }

    /// Next undelivered event, or `None` immediately if there is none.
    pub fn drain_nonblocking(&self) -> Option<JobEvent> {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        rx.try_recv().ok()
    }

    /// Snapshot of every event emitted so far, in order.
    pub fn events(&self) -> Vec<JobEvent> {
        self.lock_log().clone()
    }

    /// Terminal event rebuilt from stored state, for consumers that missed it.
    pub fn terminal_event(&self) -> Option<JobEvent> {
        match &self.read_state().status {
            JobStatus::Complete { result, .. } => Some(JobEvent::verdict(result.clone())),
            JobStatus::Error { error, .. } => Some(JobEvent::error(error.clone())),
            _ => None,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, JobState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, JobState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_log(&self) -> MutexGuard<'_, Vec<JobEvent>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("status", &self.status_str())
            .finish()
    }
}
