//! Progress events emitted for a job.
//!
//! On the wire an event is a flat JSON object:
//!
//! ```text
//! {"timestamp": "2026-01-01T12:00:00Z", "type": "agent_step", "agent": "ppt", "content": "..."}
//! ```

use crate::ids::JobId;
use crate::stage::{StageDisplay, StageId};
use crate::verdict::Verdict;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionStarted,
    AgentStarted,
    AgentStep,
    AgentComplete,
    Verdict,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::AgentStarted => "agent_started",
            Self::AgentStep => "agent_step",
            Self::AgentComplete => "agent_complete",
            Self::Verdict => "verdict",
            Self::Error => "error",
        }
    }

    /// `verdict` and `error` end a job's stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verdict | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific event fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    SessionStarted {
        team_name: String,
        job_id: JobId,
    },
    AgentStarted {
        agent: StageId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display: Option<StageDisplay>,
    },
    AgentStep {
        agent: StageId,
        content: String,
    },
    AgentComplete {
        agent: StageId,
        summary: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display: Option<StageDisplay>,
    },
    Verdict {
        result: Verdict,
    },
    Error {
        message: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SessionStarted { .. } => EventKind::SessionStarted,
            Self::AgentStarted { .. } => EventKind::AgentStarted,
            Self::AgentStep { .. } => EventKind::AgentStep,
            Self::AgentComplete { .. } => EventKind::AgentComplete,
            Self::Verdict { .. } => EventKind::Verdict,
            Self::Error { .. } => EventKind::Error,
        }
    }

    /// Stage the event refers to, if any.
    pub fn stage(&self) -> Option<StageId> {
        match self {
            Self::AgentStarted { agent, .. }
            | Self::AgentStep { agent, .. }
            | Self::AgentComplete { agent, .. } => Some(*agent),
            _ => None,
        }
    }
}

/// A timestamped progress event. Events are never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl JobEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn session_started(team_name: impl Into<String>, job_id: JobId) -> Self {
        Self::new(EventPayload::SessionStarted {
            team_name: team_name.into(),
            job_id,
        })
    }

    pub fn agent_started(agent: StageId) -> Self {
        Self::new(EventPayload::AgentStarted {
            agent,
            display: agent.display(),
        })
    }

    pub fn agent_step(agent: StageId, content: impl Into<String>) -> Self {
        Self::new(EventPayload::AgentStep {
            agent,
            content: content.into(),
        })
    }

    pub fn agent_complete(agent: StageId, summary: impl Into<String>) -> Self {
        Self::new(EventPayload::AgentComplete {
            agent,
            summary: summary.into(),
            display: agent.display(),
        })
    }

    pub fn verdict(result: Verdict) -> Self {
        Self::new(EventPayload::Verdict { result })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventPayload::Error {
            message: message.into(),
        })
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_wire_shape_is_flat() {
        let event = JobEvent::agent_step(StageId::Ppt, "reading slide 3");
        let value: Value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "agent_step");
        assert_eq!(value["agent"], "ppt");
        assert_eq!(value["content"], "reading slide 3");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_agent_started_carries_display() {
        let value = serde_json::to_value(JobEvent::agent_started(StageId::Video)).unwrap();
        assert_eq!(value["display"]["title"], "Product Demo Witness");

        let unknown = serde_json::to_value(JobEvent::agent_complete(StageId::Unknown, "")).unwrap();
        assert!(unknown.get("display").is_none());
    }

    #[test]
    fn test_deserialize_from_wire() {
        let json = r#"{"type":"error","timestamp":"2026-01-01T00:00:00Z","message":"boom"}"#;
        let event: JobEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), EventKind::Error);
        assert!(event.is_terminal());
    }

    #[test]
    fn test_terminal_kinds() {
        let terminal: Vec<EventKind> = [
            EventKind::SessionStarted,
            EventKind::AgentStarted,
            EventKind::AgentStep,
            EventKind::AgentComplete,
            EventKind::Verdict,
            EventKind::Error,
        ]
        .into_iter()
        .filter(|kind| kind.is_terminal())
        .collect();
        assert_eq!(terminal, vec![EventKind::Verdict, EventKind::Error]);
    }
}
