//! Scripted pipeline for deterministic runs without any model backend.
//!
//! Walks the five stages, reporting a few progress excerpts and one completion
//! per stage, then returns a verdict document. It can be told to fail or
//! panic when it reaches a given stage, or to return unreadable output.

use crate::pipeline::{
    JudgingPipeline, PipelineOutput, StageCompletionSink, StageOutput, StageProgressSink,
    Submission,
};
use crate::stage::{StageId, STAGE_ORDER};
use anyhow::bail;
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Canned stand-in for the real agent pipeline.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPipeline {
    step_delay: Duration,
    steps_per_stage: usize,
    fail_at: Option<StageId>,
    panic_at: Option<StageId>,
    malformed: bool,
}

impl ScriptedPipeline {
    pub fn new() -> Self {
        Self {
            steps_per_stage: 2,
            ..Self::default()
        }
    }

    /// Sleep between reports, to mimic slow stages.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_steps_per_stage(mut self, steps: usize) -> Self {
        self.steps_per_stage = steps;
        self
    }

    /// Return an error when `stage` starts.
    pub fn failing_at(mut self, stage: StageId) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Panic when `stage` starts.
    pub fn panicking_at(mut self, stage: StageId) -> Self {
        self.panic_at = Some(stage);
        self
    }

    /// Finish with prose instead of a verdict document.
    pub fn with_malformed_output(mut self) -> Self {
        self.malformed = true;
        self
    }

    fn pause(&self) {
        if !self.step_delay.is_zero() {
            thread::sleep(self.step_delay);
        }
    }
}

impl JudgingPipeline for ScriptedPipeline {
    fn run(
        &self,
        submission: &Submission,
        progress: &dyn StageProgressSink,
        completion: &dyn StageCompletionSink,
    ) -> anyhow::Result<PipelineOutput> {
        for stage in STAGE_ORDER {
            if self.fail_at == Some(stage) {
                bail!("{} analysis failed for {}", stage, submission.team_name);
            }
            if self.panic_at == Some(stage) {
                panic!("{} analysis crashed", stage);
            }

            for step in 1..=self.steps_per_stage {
                self.pause();
                let excerpt = format!(
                    "{} step {}/{}: {}",
                    stage,
                    step,
                    self.steps_per_stage,
                    step_text(stage, submission)
                );
                progress.on_stage_progress(&excerpt, stage.role_name());
            }

            self.pause();
            debug!("Scripted pipeline finished {}", stage);
            completion.on_stage_complete(&StageOutput::new(stage_summary(stage, submission)));
        }

        if self.malformed {
            return Ok(PipelineOutput::raw(format!(
                "{} gave a confident pitch. I could not settle on scores.",
                submission.team_name
            )));
        }
        Ok(PipelineOutput::structured(verdict_document(submission)))
    }
}

fn step_text(stage: StageId, submission: &Submission) -> String {
    match stage {
        StageId::Github => format!("reading repository {}", submission.github_url),
        StageId::Ppt => match &submission.pptx_path {
            Some(path) => format!("reviewing slides in {}", path.display()),
            None => "no deck supplied, checking claims from the transcript".to_string(),
        },
        StageId::Voice => format!(
            "analysing a {}-word transcript",
            submission.transcript.split_whitespace().count()
        ),
        StageId::Video => match &submission.video_path {
            Some(path) => format!("watching demo {}", path.display()),
            None => "no demo video supplied".to_string(),
        },
        StageId::Orchestrator | StageId::Unknown => {
            "cross-referencing the four analyses".to_string()
        }
    }
}

fn stage_summary(stage: StageId, submission: &Submission) -> String {
    format!(
        "{} analysis of {} complete: claims checked against the evidence available to this stage.",
        stage, submission.team_name
    )
}

fn analysis(stage: StageId) -> Value {
    json!({
        "summary": format!("{} looks consistent", stage),
        "key_findings": [format!("{} evidence reviewed", stage)],
        "concerns": [],
        "strengths": [format!("clear {} story", stage)],
    })
}

fn verdict_document(submission: &Submission) -> Value {
    json!({
        "team_name": submission.team_name,
        "scores": {
            "technical": 7.0,
            "business": 6.5,
            "presentation": 8.0,
            "demo_quality": 6.0,
            "innovation": 7.5,
            "overall": 7.0
        },
        "questions": [{
            "category": "technical",
            "priority": "HIGH",
            "question": "Which parts of the demo were running live code?",
            "reasoning": "The deck and the repository disagree on what is implemented",
            "source_evidence": "ppt, github"
        }],
        "key_strengths": ["Working prototype"],
        "key_concerns": ["Thin test coverage"],
        "voice_script": format!("Thank you {}. Let's start with the demo.", submission.team_name),
        "github_analysis": analysis(StageId::Github),
        "ppt_analysis": analysis(StageId::Ppt),
        "voice_analysis": analysis(StageId::Voice),
        "video_analysis": analysis(StageId::Video),
    })
}
