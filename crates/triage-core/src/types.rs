//! Shared domain types for the helpline flows
//!
//! The wire vocabulary (`technical` / `non-technical`, `user` / `agent` /
//! `system`) matches what the realtime routing tool and the persistence
//! layer use, so these types serialize directly into those payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inferred competence category of a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Competence {
    /// Caller troubleshoots systematically and handles technical vocabulary
    Technical,
    /// Caller needs heavier guidance; the fail-safe default
    NonTechnical,
}

impl Competence {
    /// Whether this is the technical category
    pub fn is_technical(&self) -> bool {
        matches!(self, Competence::Technical)
    }

    /// Map a stored directory flag back to a category
    pub fn from_technical_flag(technical: bool) -> Self {
        if technical {
            Competence::Technical
        } else {
            Competence::NonTechnical
        }
    }

    /// The specialist tier this category routes to
    pub fn target_phase(&self) -> Phase {
        match self {
            Competence::Technical => Phase::TierTwo,
            Competence::NonTechnical => Phase::TierOne,
        }
    }

    /// Wire form used by the routing tool and credential requests
    pub fn as_wire(&self) -> &'static str {
        match self {
            Competence::Technical => "technical",
            Competence::NonTechnical => "non-technical",
        }
    }
}

/// Scripted behavior phase of a contact
///
/// Exactly one phase is active at a time per contact. `Triage` gathers
/// information; the tiers deliver specialist support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Information gathering before a competence category is known
    Triage,
    /// General support for non-technical callers
    TierOne,
    /// Advanced support for technical callers
    TierTwo,
}

impl Phase {
    /// Human-readable tier label, used for routing status displays
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Triage => "Triage",
            Phase::TierOne => "Tier 1 (General)",
            Phase::TierTwo => "Tier 2 (Advanced)",
        }
    }

    /// Whether this phase offers the routing tool to the realtime agent
    pub fn offers_routing_tool(&self) -> bool {
        matches!(self, Phase::Triage)
    }
}

/// Text-flow phase, including the pre-contact state
///
/// Only the turn-based chat flow has a `NotStarted` state; a voice call is
/// in a phase from the moment its first session connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPhase {
    /// No directory lookup has happened yet
    NotStarted,
    /// An active scripted phase
    Active(Phase),
}

impl ChatPhase {
    /// The active phase, if the contact has started
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ChatPhase::NotStarted => None,
            ChatPhase::Active(phase) => Some(*phase),
        }
    }
}

/// Who produced a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The caller
    User,
    /// The scripted agent
    Agent,
    /// Narrational entries (handoff notices); never sent to a completion call
    System,
}

/// One transcript entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier
    pub id: Uuid,
    /// Who spoke
    pub speaker: Speaker,
    /// Turn text
    pub text: String,
    /// When the turn was recorded
    pub occurred_at: DateTime<Utc>,
}

impl Turn {
    /// Create a turn timestamped now
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            text: text.into(),
            occurred_at: Utc::now(),
        }
    }
}

/// Append-only ordered record of one contact session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a caller turn
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Speaker::User, text));
    }

    /// Append an agent turn
    pub fn push_agent(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Speaker::Agent, text));
    }

    /// Append a narrational system turn
    pub fn push_system(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Speaker::System, text));
    }

    /// All turns in order
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns recorded
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether any turns have been recorded
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// All `User` turns joined with newlines, in order
    ///
    /// This is the single synthetic input the categorizer classifies.
    pub fn user_text(&self) -> String {
        self.turns
            .iter()
            .filter(|t| t.speaker == Speaker::User)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn competence_maps_to_tier() {
        assert_eq!(Competence::Technical.target_phase(), Phase::TierTwo);
        assert_eq!(Competence::NonTechnical.target_phase(), Phase::TierOne);
    }

    #[test]
    fn competence_wire_form() {
        assert_eq!(Competence::Technical.as_wire(), "technical");
        assert_eq!(Competence::NonTechnical.as_wire(), "non-technical");
        let parsed: Competence = serde_json::from_str("\"non-technical\"").unwrap();
        assert_eq!(parsed, Competence::NonTechnical);
    }

    #[test]
    fn routing_tool_is_triage_only() {
        assert!(Phase::Triage.offers_routing_tool());
        assert!(!Phase::TierOne.offers_routing_tool());
        assert!(!Phase::TierTwo.offers_routing_tool());
    }

    #[test]
    fn user_text_excludes_agent_and_system_turns() {
        let mut transcript = Transcript::new();
        transcript.push_agent("How can I help?");
        transcript.push_user("my internet is slow");
        transcript.push_system("Routing you to Tier 1");
        transcript.push_user("I haven't tried anything");

        assert_eq!(transcript.user_text(), "my internet is slow\nI haven't tried anything");
    }
}
