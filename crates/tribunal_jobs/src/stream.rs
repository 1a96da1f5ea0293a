//! Live event streaming for a job, plus Server-Sent Events framing.
//!
//! A stream polls the job's channel without blocking. When nothing is
//! pending it sleeps for the poll interval and tries again. It ends right
//! after delivering a terminal event (`verdict` or `error`).
//!
//! A consumer that attaches after the worker finished, or whose terminal
//! event was taken by another consumer, still gets exactly one terminal
//! event: it is rebuilt from the job's stored status.

use crate::event::JobEvent;
use crate::job::Job;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default delay between polls of an idle channel.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Message of the error event emitted when `max_idle` expires.
pub const IDLE_TIMEOUT_MESSAGE: &str = "stream gave up waiting";

/// Polling behaviour of an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPolicy {
    pub poll_interval: Duration,
    /// Give up after this long without any event; `None` waits forever
    pub max_idle: Option<Duration>,
}

impl Default for StreamPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_idle: None,
        }
    }
}

impl StreamPolicy {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = Some(max_idle);
        self
    }
}

struct Cursor {
    job: Arc<Job>,
    policy: StreamPolicy,
    finished: bool,
    idle: Duration,
}

impl Cursor {
    async fn next_event(&mut self) -> Option<JobEvent> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(event) = self.job.drain_nonblocking() {
                self.idle = Duration::ZERO;
                self.finished = event.is_terminal();
                return Some(event);
            }

            if let Some(synthesized) = self.job.terminal_event() {
                // The terminal event is appended before the status becomes
                // visible, so one more drain catches anything still queued.
                self.finished = true;
                return match self.job.drain_nonblocking() {
                    Some(event) => {
                        self.finished = event.is_terminal();
                        Some(event)
                    }
                    None => {
                        debug!(
                            "Job {} terminal event already consumed, rebuilding from status",
                            self.job.id()
                        );
                        Some(synthesized)
                    }
                };
            }

            if let Some(max_idle) = self.policy.max_idle {
                if self.idle >= max_idle {
                    warn!(
                        "Stream for job {} idle for {:?}, closing",
                        self.job.id(),
                        self.idle
                    );
                    self.finished = true;
                    return Some(JobEvent::error(IDLE_TIMEOUT_MESSAGE));
                }
            }

            tokio::time::sleep(self.policy.poll_interval).await;
            self.idle += self.policy.poll_interval;
        }
    }
}

/// Stream the job's events until (and including) its terminal event.
pub fn event_stream(job: Arc<Job>, policy: StreamPolicy) -> BoxStream<'static, JobEvent> {
    let cursor = Cursor {
        job,
        policy,
        finished: false,
        idle: Duration::ZERO,
    };

    stream::unfold(cursor, |mut cursor| async move {
        let event = cursor.next_event().await?;
        Some((event, cursor))
    })
    .boxed()
}

/// Encode one event as an SSE frame: `data: <json>\n\n`.
pub fn sse_frame(event: &JobEvent) -> String {
    match serde_json::to_string(event) {
        Ok(json) => format!("data: {}\n\n", json),
        Err(e) => {
            error!("Failed to encode {} event: {}", event.kind(), e);
            let fallback = JobEvent::error(format!("failed to encode event: {}", e));
            match serde_json::to_string(&fallback) {
                Ok(json) => format!("data: {}\n\n", json),
                Err(_) => "data: {\"type\":\"error\",\"message\":\"failed to encode event\"}\n\n"
                    .to_string(),
            }
        }
    }
}

/// [`event_stream`] framed as SSE text chunks.
pub fn sse_stream(job: Arc<Job>, policy: StreamPolicy) -> BoxStream<'static, String> {
    event_stream(job, policy)
        .map(|event| sse_frame(&event))
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, EventPayload};
    use crate::ids::JobId;
    use crate::stage::StageId;
    use crate::verdict::Verdict;

    fn fast() -> StreamPolicy {
        StreamPolicy::default().with_poll_interval(Duration::from_millis(5))
    }

    fn job() -> Arc<Job> {
        Arc::new(Job::new(JobId::new(), "Acme"))
    }

    #[test]
    fn test_default_policy() {
        let policy = StreamPolicy::default();
        assert_eq!(policy.poll_interval, Duration::from_millis(500));
        assert!(policy.max_idle.is_none());
    }

    #[test]
    fn test_sse_frame_format() {
        let frame = sse_frame(&JobEvent::error("boom"));
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));

        let json = frame.trim_start_matches("data: ").trim_end();
        let value: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "boom");
    }

    #[tokio::test]
    async fn test_stream_ends_after_terminal_event() {
        let job = job();
        job.start().unwrap();
        job.append(JobEvent::agent_started(StageId::Github));
        job.complete(Verdict::placeholder("Acme", "")).unwrap();
        // Anything after the terminal event is never delivered
        job.append(JobEvent::agent_step(StageId::Github, "late"));

        let kinds: Vec<EventKind> = event_stream(job, fast()).map(|e| e.kind()).collect().await;
        assert_eq!(kinds, vec![EventKind::AgentStarted, EventKind::Verdict]);
    }

    #[tokio::test]
    async fn test_stream_waits_for_live_events() {
        let job = job();
        job.start().unwrap();

        let writer = Arc::clone(&job);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            writer.append(JobEvent::agent_started(StageId::Github));
            std::thread::sleep(Duration::from_millis(30));
            writer.fail("github stage crashed").unwrap();
        });

        let events: Vec<JobEvent> = event_stream(job, fast()).collect().await;
        handle.join().unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind(), EventKind::Error);
    }

    #[tokio::test]
    async fn test_consumed_terminal_is_synthesized() {
        let job = job();
        job.start().unwrap();
        job.fail("video analysis timed out").unwrap();

        let first: Vec<JobEvent> = event_stream(Arc::clone(&job), fast()).collect().await;
        let second: Vec<JobEvent> = event_stream(job, fast()).collect().await;

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].kind(), EventKind::Error);
        assert_eq!(first[0].payload, second[0].payload);
    }

    #[tokio::test]
    async fn test_max_idle_closes_with_error() {
        let job = job();
        job.start().unwrap();

        let policy = fast().with_max_idle(Duration::from_millis(20));
        let events: Vec<JobEvent> = event_stream(job, policy).collect().await;

        assert_eq!(events.len(), 1);
        match &events[0].payload {
            EventPayload::Error { message } => assert_eq!(message, IDLE_TIMEOUT_MESSAGE),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sse_stream_frames_every_event() {
        let job = job();
        job.start().unwrap();
        job.append(JobEvent::session_started("Acme", job.id().clone()));
        job.complete(Verdict::placeholder("Acme", "")).unwrap();

        let frames: Vec<String> = sse_stream(job, fast()).collect().await;
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains("\"type\":\"session_started\""));
        assert!(frames[1].contains("\"type\":\"verdict\""));
    }
}
