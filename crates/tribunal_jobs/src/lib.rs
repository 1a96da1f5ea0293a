//! Job execution and live progress streaming for Tribunal
//!
//! A judging job runs a five-stage analysis pipeline (code, pitch deck,
//! voice transcript, demo video, then a cross-referencing synthesis) over a
//! hackathon submission. This crate runs each job in the background and
//! streams its progress to a client while it executes.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                   API layer (HTTP, CLI, ...)                  │
//! └───────────────────────────────────────────────────────────────┘
//!        │ start / get_result / events / list      ▲ SSE frames
//!        ▼                                         │
//! ┌───────────────────────────────────────────────────────────────┐
//! │  JudgeService                                                 │
//! │    JobRegistry ── Arc<Job> ── status, event log, channel      │
//! └───────────────────────────────────────────────────────────────┘
//!        │ spawn                                   ▲ poll (non-blocking)
//!        ▼                                         │
//! ┌──────────────────────────────┐     ┌──────────────────────────┐
//! │ JobWorker (OS thread)        │     │ event_stream / sse_stream│
//! │   JudgingPipeline::run       │     │   (tokio task)           │
//! │   StageCoordinator (sinks) ──┼──►  │                          │
//! └──────────────────────────────┘     └──────────────────────────┘
//! ```
//!
//! # Guarantees
//!
//! 1. **Exactly one terminal event:** every stream ends with one `verdict` or
//!    one `error`, also for consumers that attach after the job finished.
//!
//! 2. **Order:** events reach a consumer in emission order. Each
//!    `agent_complete` is immediately followed by the next stage's
//!    `agent_started`.
//!
//! 3. **Failures stay inside the job:** pipeline errors and panics become an
//!    `error` event and a failed status; unreadable pipeline output becomes a
//!    placeholder verdict.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod event;
pub mod ids;
pub mod job;
pub mod pipeline;
pub mod registry;
pub mod scripted;
pub mod service;
pub mod stage;
pub mod stream;
pub mod verdict;
pub mod worker;

pub use config::{load_config, ConfigError, TribunalConfig};
pub use coordinator::{CoordinatorLimits, StageCoordinator};
pub use error::{JobError, Result};
pub use event::{EventKind, EventPayload, JobEvent};
pub use ids::JobId;
pub use job::{Job, JobSnapshot, JobStatus};
pub use pipeline::{
    JudgingPipeline, PipelineOutput, StageCompletionSink, StageOutput, StageProgressSink,
    Submission,
};
pub use registry::JobRegistry;
pub use scripted::ScriptedPipeline;
pub use service::{JobResult, JudgeService};
pub use stage::{StageDisplay, StageId, STAGE_ORDER};
pub use stream::{event_stream, sse_frame, sse_stream, StreamPolicy};
pub use verdict::{interpret_output, Verdict, VerdictError};
