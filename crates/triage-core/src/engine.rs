//! Turn-based chat state machine
//!
//! Drives one text contact from `NotStarted` through `Triage` into a
//! specialist tier. The entry decision is made exactly once, at contact
//! start, by a directory lookup: a hit skips triage entirely and enters the
//! tier in direct mode; a miss (or a failed lookup) enters triage.
//!
//! While in triage, every user turn produces one completion call. The reply
//! is scanned for the completion marker; when present, the flow categorizes
//! the caller, persists the result best-effort, and performs the two-step
//! transition into the target tier. The specialist greeting call is
//! mandatory: until it succeeds, the phase does not advance, so a failure
//! surfaces as a recoverable notice with the machine still in triage.

use std::sync::Arc;

use tracing::{debug, info};

use helpline_directory_core::{lookup_or_unknown, upsert_best_effort, ContactDirectory};

use crate::categorizer::categorize;
use crate::completion::{ChatMessage, CompletionClient, CompletionOptions};
use crate::error::{TriageError, TriageResult};
use crate::prompts::{self, READY_MARKER};
use crate::types::{ChatPhase, Competence, Phase, Transcript};

/// Fixed opening turn for a contact that enters triage
const TRIAGE_GREETING: &str =
    "Hello! You've reached the support helpline. What technical problem can I help you with today?";

/// Outcome of starting a contact
#[derive(Debug, Clone)]
pub struct StartedContact {
    /// Phase the contact entered
    pub phase: Phase,
    /// Opening agent turn
    pub greeting: String,
    /// Whether a directory hit bypassed triage
    pub skipped_triage: bool,
}

/// Outcome of one user turn
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// An ordinary agent reply; phase unchanged
    Reply {
        /// Agent reply text
        text: String,
    },
    /// Triage completed and the contact was routed to a specialist tier
    Routed {
        /// Final triage reply, with the completion marker stripped
        reply: String,
        /// Opening turn of the specialist agent
        greeting: String,
        /// Inferred competence category
        category: Competence,
        /// Tier the contact is now in
        next_phase: Phase,
    },
}

/// State machine for one turn-based support contact
pub struct ChatFlow {
    completion: Arc<dyn CompletionClient>,
    directory: Arc<dyn ContactDirectory>,
    phone_key: String,
    phase: ChatPhase,
    has_triage_context: bool,
    transcript: Transcript,
}

impl ChatFlow {
    /// Create a flow for a contact identified by `phone_key`
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        directory: Arc<dyn ContactDirectory>,
        phone_key: impl Into<String>,
    ) -> Self {
        Self {
            completion,
            directory,
            phone_key: phone_key.into(),
            phase: ChatPhase::NotStarted,
            has_triage_context: true,
            transcript: Transcript::new(),
        }
    }

    /// Current phase
    pub fn phase(&self) -> ChatPhase {
        self.phase
    }

    /// Transcript recorded so far
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Phone key of this contact
    pub fn phone_key(&self) -> &str {
        &self.phone_key
    }

    /// Start the contact: decide the entry phase and produce the opening turn
    ///
    /// A directory hit enters the mapped tier directly with the "direct"
    /// script and an opening turn from the specialist; a miss or storage
    /// failure enters triage with the fixed intake greeting.
    pub async fn start(&mut self) -> TriageResult<StartedContact> {
        if self.phase != ChatPhase::NotStarted {
            return Err(TriageError::invalid_state("contact already started"));
        }

        let outcome = lookup_or_unknown(self.directory.as_ref(), &self.phone_key).await;

        if let Some(technical) = outcome.tech_competence.filter(|_| outcome.found) {
            let competence = Competence::from_technical_flag(technical);
            let phase = competence.target_phase();

            // Direct entry: the specialist opens without prior context
            let greeting = self
                .completion
                .complete(prompts::resolve(phase, false), &[], CompletionOptions::default())
                .await?;

            info!(
                "contact {} recognized as {:?}, entering {:?} directly",
                self.phone_key, competence, phase
            );
            self.has_triage_context = false;
            self.transcript.push_agent(&greeting);
            self.phase = ChatPhase::Active(phase);
            return Ok(StartedContact {
                phase,
                greeting,
                skipped_triage: true,
            });
        }

        debug!("contact {} unknown, entering triage", self.phone_key);
        self.transcript.push_agent(TRIAGE_GREETING);
        self.phase = ChatPhase::Active(Phase::Triage);
        Ok(StartedContact {
            phase: Phase::Triage,
            greeting: TRIAGE_GREETING.to_string(),
            skipped_triage: false,
        })
    }

    /// Process one user turn in the current phase
    pub async fn handle_user_turn(&mut self, text: impl Into<String>) -> TriageResult<TurnOutcome> {
        let phase = match self.phase {
            ChatPhase::Active(phase) => phase,
            ChatPhase::NotStarted => {
                return Err(TriageError::invalid_state("contact has not started"));
            }
        };

        self.transcript.push_user(text);

        match phase {
            Phase::Triage => self.triage_turn().await,
            tier => {
                let reply = self
                    .completion
                    .complete(
                        prompts::resolve(tier, self.has_triage_context),
                        &ChatMessage::from_transcript(&self.transcript),
                        CompletionOptions::default(),
                    )
                    .await?;
                self.transcript.push_agent(&reply);
                Ok(TurnOutcome::Reply { text: reply })
            }
        }
    }

    async fn triage_turn(&mut self) -> TriageResult<TurnOutcome> {
        let reply = self
            .completion
            .complete(
                prompts::resolve(Phase::Triage, true),
                &ChatMessage::from_transcript(&self.transcript),
                CompletionOptions::default(),
            )
            .await?;

        if !reply.contains(READY_MARKER) {
            self.transcript.push_agent(&reply);
            return Ok(TurnOutcome::Reply { text: reply });
        }

        // The marker must never reach the stored transcript or the
        // categorization input.
        let stripped = reply.replace(READY_MARKER, "").trim().to_string();

        let category = categorize(self.completion.as_ref(), &self.transcript).await;
        let next_phase = category.target_phase();

        // Fire-and-forget relative to the routing decision
        upsert_best_effort(self.directory.as_ref(), &self.phone_key, category.is_technical()).await;

        // The specialist greeting is mandatory before the transition is
        // complete. Run it against the would-be transcript so a failure
        // leaves the machine still in triage.
        let mut messages = ChatMessage::from_transcript(&self.transcript);
        messages.push(ChatMessage::assistant(&stripped));
        let greeting = self
            .completion
            .complete(
                prompts::resolve(next_phase, true),
                &messages,
                CompletionOptions::default(),
            )
            .await?;

        info!(
            "triage complete for {}: {:?} -> {:?}",
            self.phone_key, category, next_phase
        );

        self.transcript.push_agent(&stripped);
        self.transcript
            .push_system(format!("Routing you to {} support.", next_phase.label()));
        self.transcript.push_agent(&greeting);
        self.phase = ChatPhase::Active(next_phase);

        Ok(TurnOutcome::Routed {
            reply: stripped,
            greeting,
            category,
            next_phase,
        })
    }
}
