//! Pipeline stages and their display metadata.
//!
//! The judging pipeline always runs the same five stages in the same order:
//! four independent analyses followed by the synthesis ("orchestrator") stage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Repository / code analysis
    Github,
    /// Pitch deck analysis
    Ppt,
    /// Voice transcript analysis
    Voice,
    /// Demo video analysis
    Video,
    /// Cross-referencing synthesis
    Orchestrator,
    /// Attribution could not be resolved
    Unknown,
}

/// Fixed execution order of the pipeline.
pub const STAGE_ORDER: [StageId; 5] = [
    StageId::Github,
    StageId::Ppt,
    StageId::Voice,
    StageId::Video,
    StageId::Orchestrator,
];

/// Role names the agent framework reports, mapped to our stages.
const ROLE_TABLE: [(&str, StageId); 5] = [
    ("Senior Code Reviewer & Architecture Analyst", StageId::Github),
    ("Business Strategy & Pitch Deck Analyst", StageId::Ppt),
    ("Communication & Pitch Delivery Analyst", StageId::Voice),
    ("Product Demo & UX Analyst", StageId::Video),
    ("Chief Judge & Cross-Reference Analyst", StageId::Orchestrator),
];

/// Display metadata shown next to a stage in the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDisplay {
    pub name: String,
    pub title: String,
    pub icon: String,
}

impl StageDisplay {
    fn new(name: &str, title: &str, icon: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            icon: icon.to_string(),
        }
    }
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Ppt => "ppt",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Orchestrator => "orchestrator",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a stage key such as `"video"`.
    pub fn from_key(key: &str) -> Option<Self> {
        STAGE_ORDER.iter().copied().find(|stage| stage.as_str() == key)
    }

    /// Resolve an attribution string from the agent framework.
    ///
    /// Accepts either a full role name from the role table or a bare stage key.
    pub fn from_role(role: &str) -> Option<Self> {
        let role = role.trim();
        ROLE_TABLE
            .iter()
            .find(|(name, _)| *name == role)
            .map(|(_, stage)| *stage)
            .or_else(|| Self::from_key(role))
    }

    /// Role name the agent framework uses for this stage.
    pub fn role_name(&self) -> Option<&'static str> {
        ROLE_TABLE
            .iter()
            .find(|(_, stage)| stage == self)
            .map(|(name, _)| *name)
    }

    /// Display metadata; `None` for [`StageId::Unknown`].
    pub fn display(&self) -> Option<StageDisplay> {
        let display = match self {
            Self::Github => StageDisplay::new("GitHub Agent", "Code & Architecture Witness", "code"),
            Self::Ppt => StageDisplay::new("PPT Agent", "Business Strategy Witness", "presentation"),
            Self::Voice => StageDisplay::new("Voice Agent", "Communication Witness", "mic"),
            Self::Video => StageDisplay::new("Video Agent", "Product Demo Witness", "video"),
            Self::Orchestrator => StageDisplay::new("Orchestrator", "Chief Judge", "gavel"),
            Self::Unknown => return None,
        };
        Some(display)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| {
            let known: Vec<&str> = STAGE_ORDER.iter().map(|stage| stage.as_str()).collect();
            format!("unknown stage '{}' (expected one of: {})", s, known.join(", "))
        })
    }
}
