//! Structured judging result and the tolerant parser that produces it.
//!
//! The synthesis stage is asked for a JSON document, but language models do
//! not always comply. [`interpret_output`] tries, in order:
//!
//! 1. the structured JSON the pipeline already extracted,
//! 2. the raw text parsed as JSON,
//! 3. the first fenced code block, then the outermost `{...}` span of the text,
//!
//! and otherwise substitutes [`Verdict::placeholder`], keeping the raw text
//! in `raw_output`. A job whose pipeline succeeded is never failed because
//! its output could not be read.

use crate::pipeline::PipelineOutput;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound of every score.
pub const MAX_SCORE: f64 = 10.0;

/// Why raw pipeline output could not be read as a [`Verdict`].
#[derive(Debug, Error)]
pub enum VerdictError {
    #[error("output is empty")]
    Empty,

    #[error("output is not valid verdict JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("score '{field}' is {value}, expected 0-10")]
    ScoreOutOfRange { field: &'static str, value: f64 },
}

/// Question category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionCategory {
    Technical,
    Business,
    Innovation,
    Feasibility,
    Presentation,
}

/// Question priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A question a judge should put to the team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeQuestion {
    pub category: QuestionCategory,
    pub priority: Priority,
    pub question: String,
    pub reasoning: String,
    /// Which analyses flagged this
    pub source_evidence: String,
}

/// Condensed output of one analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageAnalysis {
    pub summary: String,
    pub key_findings: Vec<String>,
    pub concerns: Vec<String>,
    pub strengths: Vec<String>,
    #[serde(default)]
    pub raw_detail: String,
}

/// Scores, 0-10 each.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scores {
    pub technical: f64,
    pub business: f64,
    pub presentation: f64,
    pub demo_quality: f64,
    pub innovation: f64,
    pub overall: f64,
}

impl Scores {
    fn validate(&self) -> Result<(), VerdictError> {
        let fields = [
            ("technical", self.technical),
            ("business", self.business),
            ("presentation", self.presentation),
            ("demo_quality", self.demo_quality),
            ("innovation", self.innovation),
            ("overall", self.overall),
        ];
        for (field, value) in fields {
            // NaN fails the range check too
            if !(0.0..=MAX_SCORE).contains(&value) {
                return Err(VerdictError::ScoreOutOfRange { field, value });
            }
        }
        Ok(())
    }
}

/// Final structured result of a judging job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub team_name: String,
    pub scores: Scores,
    pub questions: Vec<JudgeQuestion>,
    pub key_strengths: Vec<String>,
    pub key_concerns: Vec<String>,
    /// Ready-to-read script for a voiced judge
    pub voice_script: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_analysis: Option<StageAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ppt_analysis: Option<StageAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_analysis: Option<StageAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_analysis: Option<StageAnalysis>,

    /// Unparsed synthesis output, kept when a placeholder was substituted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

impl Verdict {
    /// Validate and convert an already-parsed JSON value.
    ///
    /// `raw_output` is reserved for [`Verdict::placeholder`]; a value supplied
    /// by the model is discarded.
    pub fn from_value(value: Value) -> Result<Self, VerdictError> {
        let mut verdict: Verdict = serde_json::from_value(value)?;
        verdict.scores.validate()?;
        if verdict.raw_output.take().is_some() {
            debug!("Ignoring raw_output supplied in verdict for '{}'", verdict.team_name);
        }
        Ok(verdict)
    }

    /// Parse a verdict out of free-form model output.
    pub fn from_raw(raw: &str) -> Result<Self, VerdictError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(VerdictError::Empty);
        }

        let first_err = match Self::from_json_str(trimmed) {
            Ok(verdict) => return Ok(verdict),
            Err(e) => e,
        };

        for candidate in [fenced_block(trimmed), brace_span(trimmed)].into_iter().flatten() {
            if let Ok(verdict) = Self::from_json_str(candidate) {
                return Ok(verdict);
            }
        }

        Err(first_err)
    }

    fn from_json_str(text: &str) -> Result<Self, VerdictError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Stand-in verdict used when the synthesis output is unreadable.
    pub fn placeholder(team_name: impl Into<String>, raw_output: impl Into<String>) -> Self {
        Self {
            team_name: team_name.into(),
            scores: Scores::default(),
            questions: Vec::new(),
            key_strengths: vec!["Analysis completed, see raw output for details".to_string()],
            key_concerns: vec!["Structured parsing failed, review the raw output".to_string()],
            voice_script: "The analysis has been completed. Please review the detailed results."
                .to_string(),
            github_analysis: None,
            ppt_analysis: None,
            voice_analysis: None,
            video_analysis: None,
            raw_output: Some(raw_output.into()),
        }
    }

    /// True if this verdict is a parsing-failure stand-in.
    pub fn is_placeholder(&self) -> bool {
        self.raw_output.is_some()
    }
}

/// Turn pipeline output into a verdict, degrading to a placeholder.
pub fn interpret_output(output: &PipelineOutput, team_name: &str) -> Verdict {
    if let Some(structured) = &output.structured {
        match Verdict::from_value(structured.clone()) {
            Ok(verdict) => return verdict,
            Err(e) => debug!("Structured output rejected, falling back to raw text: {}", e),
        }
    }

    match Verdict::from_raw(&output.raw) {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!(
                "Could not parse verdict for team '{}' ({}), substituting placeholder",
                team_name, e
            );
            Verdict::placeholder(team_name, output.raw.clone())
        }
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    // Skip a language tag such as ```json
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
