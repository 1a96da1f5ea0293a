//! Boundary with the external judging pipeline.
//!
//! The pipeline itself (agents, prompts, repository/slide/video tooling) lives
//! outside this crate. It is handed two narrow sinks and reports into them
//! while it runs; it never sees a [`crate::Job`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Inputs for one judging run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub team_name: String,
    pub github_url: String,
    /// Voice transcription of the pitch
    pub transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pptx_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_path: Option<PathBuf>,
}

impl Submission {
    pub fn new(
        team_name: impl Into<String>,
        github_url: impl Into<String>,
        transcript: impl Into<String>,
    ) -> Self {
        Self {
            team_name: team_name.into(),
            github_url: github_url.into(),
            transcript: transcript.into(),
            pptx_path: None,
            video_path: None,
        }
    }

    pub fn with_pptx(mut self, path: impl Into<PathBuf>) -> Self {
        self.pptx_path = Some(path.into());
        self
    }

    pub fn with_video(mut self, path: impl Into<PathBuf>) -> Self {
        self.video_path = Some(path.into());
        self
    }
}

/// What a stage produced when it finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageOutput {
    pub raw: String,
}

impl StageOutput {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOutput {
    /// Raw text of the synthesis stage
    pub raw: String,
    /// JSON the pipeline already extracted, if any
    pub structured: Option<serde_json::Value>,
}

impl PipelineOutput {
    pub fn raw(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            structured: None,
        }
    }

    pub fn structured(value: serde_json::Value) -> Self {
        Self {
            raw: value.to_string(),
            structured: Some(value),
        }
    }
}

/// Receives fine-grained progress from inside a running stage.
pub trait StageProgressSink: Send + Sync {
    /// `attribution` is whatever the agent framework reports as the acting
    /// role; it may be absent or unrecognised.
    fn on_stage_progress(&self, excerpt: &str, attribution: Option<&str>);
}

/// Receives a signal each time a stage finishes.
///
/// Stages finish strictly in pipeline order, one at a time.
pub trait StageCompletionSink: Send + Sync {
    fn on_stage_complete(&self, output: &StageOutput);
}

/// A blocking, multi-stage judging pipeline.
pub trait JudgingPipeline: Send + Sync {
    /// Run every stage for `submission`. Called on a dedicated worker thread.
    fn run(
        &self,
        submission: &Submission,
        progress: &dyn StageProgressSink,
        completion: &dyn StageCompletionSink,
    ) -> anyhow::Result<PipelineOutput>;
}
