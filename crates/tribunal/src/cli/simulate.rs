//! `tribunal simulate`: drive a scripted job through the judge service.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;
use tribunal_jobs::{JobResult, JudgeService, ScriptedPipeline, StageId, Submission, TribunalConfig};

#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub team: String,
    pub github_url: String,
    pub transcript: String,
    pub pptx: Option<PathBuf>,
    pub video: Option<PathBuf>,
    pub fail_at: Option<StageId>,
    pub panic_at: Option<StageId>,
    pub attach_delay_ms: u64,
    pub step_delay_ms: u64,
    pub steps: usize,
    pub malformed: bool,
}

impl SimulateArgs {
    fn pipeline(&self) -> ScriptedPipeline {
        let mut pipeline = ScriptedPipeline::new()
            .with_step_delay(Duration::from_millis(self.step_delay_ms))
            .with_steps_per_stage(self.steps);
        if let Some(stage) = self.fail_at {
            pipeline = pipeline.failing_at(stage);
        }
        if let Some(stage) = self.panic_at {
            pipeline = pipeline.panicking_at(stage);
        }
        if self.malformed {
            pipeline = pipeline.with_malformed_output();
        }
        pipeline
    }

    fn submission(&self) -> Submission {
        let mut submission = Submission::new(&self.team, &self.github_url, &self.transcript);
        if let Some(path) = &self.pptx {
            submission = submission.with_pptx(path);
        }
        if let Some(path) = &self.video {
            submission = submission.with_video(path);
        }
        submission
    }
}

pub async fn run(args: SimulateArgs, config: &TribunalConfig) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let result = stream_to(&args, config, &mut stdout).await?;
    info!("Simulation finished: {}", serde_json::to_string(&result)?);
    Ok(())
}

/// Start the job, attach after the configured delay and copy every SSE frame to `out`.
pub async fn stream_to<W>(args: &SimulateArgs, config: &TribunalConfig, out: &mut W) -> Result<JobResult>
where
    W: AsyncWrite + Unpin,
{
    let service = JudgeService::from_config(Arc::new(args.pipeline()), config);
    let job_id = service
        .start(&args.team, args.submission())
        .context("Failed to start judging job")?;
    info!("Simulating job {} for team {}", job_id, args.team);

    if args.attach_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(args.attach_delay_ms)).await;
    }

    let mut frames = service.stream_sse(&job_id)?;
    while let Some(frame) = frames.next().await {
        out.write_all(frame.as_bytes())
            .await
            .context("Failed to write SSE frame")?;
        out.flush().await?;
    }

    Ok(service.get_result(&job_id)?)
}
