//! Stage coordinator: turns pipeline callbacks into job events.
//!
//! Completion signals arrive in stage order. Each one produces an
//! `agent_complete` for the stage at the cursor, immediately followed by an
//! `agent_started` for the next stage (none after the last). Progress signals
//! become `agent_step` events tagged with a best-effort stage attribution.

use crate::event::JobEvent;
use crate::job::Job;
use crate::pipeline::{StageCompletionSink, StageOutput, StageProgressSink};
use crate::stage::{StageId, STAGE_ORDER};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Maximum characters kept from an intra-stage progress excerpt.
pub const DEFAULT_EXCERPT_LIMIT: usize = 600;

/// Maximum characters kept from a finished stage's output.
pub const DEFAULT_SUMMARY_LIMIT: usize = 800;

/// Size bounds applied to event text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorLimits {
    pub excerpt_limit: usize,
    pub summary_limit: usize,
}

impl Default for CoordinatorLimits {
    fn default() -> Self {
        Self {
            excerpt_limit: DEFAULT_EXCERPT_LIMIT,
            summary_limit: DEFAULT_SUMMARY_LIMIT,
        }
    }
}

/// Maps completion and progress signals onto a job's event stream.
pub struct StageCoordinator {
    job: Arc<Job>,
    stages: Vec<StageId>,
    /// Number of completed stages; never exceeds `stages.len()`
    cursor: Mutex<usize>,
    limits: CoordinatorLimits,
}

impl StageCoordinator {
    pub fn new(job: Arc<Job>, limits: CoordinatorLimits) -> Self {
        Self {
            job,
            stages: STAGE_ORDER.to_vec(),
            cursor: Mutex::new(0),
            limits,
        }
    }

    /// Mark the first stage active and emit its `agent_started`.
    pub fn announce_first_stage(&self) {
        if let Some(&first) = self.stages.first() {
            self.job.set_current_stage(first);
            self.job.append(JobEvent::agent_started(first));
        }
    }

    /// How many stages have reported completion.
    pub fn completed(&self) -> usize {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stage the next completion signal will be attributed to.
    pub fn active_stage(&self) -> Option<StageId> {
        self.stages.get(self.completed()).copied()
    }

    fn resolve_attribution(&self, attribution: Option<&str>) -> StageId {
        attribution
            .and_then(StageId::from_role)
            .or_else(|| self.job.current_stage())
            .unwrap_or(StageId::Unknown)
    }
}

impl StageCompletionSink for StageCoordinator {
    fn on_stage_complete(&self, output: &StageOutput) {
        // Held across both appends so complete/started stay adjacent
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);

        let finished = match self.stages.get(*cursor) {
            Some(&stage) => stage,
            None => {
                warn!(
                    "Job {} reported more stage completions than the {} known stages",
                    self.job.id(),
                    self.stages.len()
                );
                StageId::Unknown
            }
        };
        *cursor = (*cursor + 1).min(self.stages.len());

        let summary = truncate_chars(&output.raw, self.limits.summary_limit);
        self.job.append(JobEvent::agent_complete(finished, summary));
        debug!("Job {} finished stage {}", self.job.id(), finished);

        if finished == StageId::Unknown {
            return;
        }
        if let Some(&next) = self.stages.get(*cursor) {
            self.job.set_current_stage(next);
            self.job.append(JobEvent::agent_started(next));
        }
    }
}

impl StageProgressSink for StageCoordinator {
    fn on_stage_progress(&self, excerpt: &str, attribution: Option<&str>) {
        let stage = self.resolve_attribution(attribution);
        let content = truncate_chars(excerpt, self.limits.excerpt_limit);
        self.job.append(JobEvent::agent_step(stage, content));
    }
}

/// First `limit` characters of `text`, cut on a character boundary.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, EventPayload};
    use crate::ids::JobId;

    fn coordinator() -> (Arc<Job>, StageCoordinator) {
        let job = Arc::new(Job::new(JobId::new(), "Acme"));
        let coordinator = StageCoordinator::new(Arc::clone(&job), CoordinatorLimits::default());
        (job, coordinator)
    }

    fn kinds_and_stages(job: &Job) -> Vec<(EventKind, Option<StageId>)> {
        job.events()
            .iter()
            .map(|e| (e.kind(), e.payload.stage()))
            .collect()
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hi", 10), "hi");
        // Multi-byte characters are never split
        assert_eq!(truncate_chars("ééé", 2), "éé");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[test]
    fn test_completion_pairs() {
        let (job, coordinator) = coordinator();
        coordinator.announce_first_stage();
        coordinator.on_stage_complete(&StageOutput::new("code is fine"));

        assert_eq!(
            kinds_and_stages(&job),
            vec![
                (EventKind::AgentStarted, Some(StageId::Github)),
                (EventKind::AgentComplete, Some(StageId::Github)),
                (EventKind::AgentStarted, Some(StageId::Ppt)),
            ]
        );
        assert_eq!(job.current_stage(), Some(StageId::Ppt));
        assert_eq!(coordinator.active_stage(), Some(StageId::Ppt));
    }

    #[test]
    fn test_last_stage_has_no_successor() {
        let (job, coordinator) = coordinator();
        for _ in 0..STAGE_ORDER.len() {
            coordinator.on_stage_complete(&StageOutput::default());
        }

        let events = job.events();
        let last = events.last().unwrap();
        assert_eq!(last.kind(), EventKind::AgentComplete);
        assert_eq!(last.payload.stage(), Some(StageId::Orchestrator));
        assert_eq!(coordinator.completed(), STAGE_ORDER.len());
        assert_eq!(coordinator.active_stage(), None);
    }

    #[test]
    fn test_extra_completion_is_unknown() {
        let (job, coordinator) = coordinator();
        for _ in 0..STAGE_ORDER.len() + 1 {
            coordinator.on_stage_complete(&StageOutput::default());
        }

        let last = job.events().pop().unwrap();
        assert_eq!(last.payload.stage(), Some(StageId::Unknown));
        assert_eq!(coordinator.completed(), STAGE_ORDER.len());
    }

    #[test]
    fn test_summary_is_bounded() {
        let (job, coordinator) = coordinator();
        coordinator.on_stage_complete(&StageOutput::new("x".repeat(5_000)));

        match &job.events()[0].payload {
            EventPayload::AgentComplete { summary, .. } => {
                assert_eq!(summary.chars().count(), DEFAULT_SUMMARY_LIMIT)
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_progress_uses_role_table() {
        let (job, coordinator) = coordinator();
        coordinator.announce_first_stage();
        coordinator.on_stage_progress("checking slides", Some("Business Strategy & Pitch Deck Analyst"));

        let step = job.events().pop().unwrap();
        assert_eq!(step.payload.stage(), Some(StageId::Ppt));
    }

    #[test]
    fn test_progress_falls_back_to_current_stage() {
        let (job, coordinator) = coordinator();
        coordinator.announce_first_stage();
        coordinator.on_stage_progress("thinking", Some("Unlisted Helper Agent"));
        coordinator.on_stage_progress("still thinking", None);

        let events = job.events();
        assert_eq!(events[1].payload.stage(), Some(StageId::Github));
        assert_eq!(events[2].payload.stage(), Some(StageId::Github));
    }

    #[test]
    fn test_progress_without_any_stage_is_unknown() {
        let (job, coordinator) = coordinator();
        coordinator.on_stage_progress("early chatter", None);
        assert_eq!(job.events()[0].payload.stage(), Some(StageId::Unknown));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let (job, coordinator) = coordinator();
        coordinator.on_stage_progress(&"y".repeat(2_000), Some("github"));

        match &job.events()[0].payload {
            EventPayload::AgentStep { content, .. } => {
                assert_eq!(content.chars().count(), DEFAULT_EXCERPT_LIMIT)
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
