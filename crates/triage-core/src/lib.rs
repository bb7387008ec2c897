//! # Triage Engine for Helpline
//!
//! Core orchestration for routing a support contact through a triage phase
//! into one of two specialist tiers. This crate owns:
//!
//! - the shared domain types (phases, competence, transcript),
//! - the script resolver mapping a phase to its behavior prompt,
//! - the categorizer that turns a triage transcript into a competence label,
//! - the turn-based chat state machine that drives the text flow.
//!
//! The language-model completion call is an injected collaborator behind
//! [`CompletionClient`]; persistence is behind
//! [`helpline_directory_core::ContactDirectory`]. Both are constructed once
//! and passed by reference, which keeps the state machine testable in
//! isolation.
//!
//! ## Phase flow
//!
//! ```text
//! NotStarted ──lookup miss──► Triage ──categorized──► TierOne | TierTwo
//!      │
//!      └─────lookup hit────────────────direct────────► TierOne | TierTwo
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use helpline_triage_core::{ChatFlow, OpenAiCompletionClient, TurnOutcome};
//! use helpline_directory_core::MemoryDirectory;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let completion = Arc::new(OpenAiCompletionClient::from_env()?);
//! let directory = Arc::new(MemoryDirectory::new());
//!
//! let mut flow = ChatFlow::new(completion, directory, "+15551234567");
//! let started = flow.start().await?;
//! println!("opening turn: {}", started.greeting);
//!
//! match flow.handle_user_turn("my laptop won't boot").await? {
//!     TurnOutcome::Reply { text } => println!("agent: {}", text),
//!     TurnOutcome::Routed { greeting, next_phase, .. } => {
//!         println!("routed to {:?}: {}", next_phase, greeting);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod categorizer;
mod completion;
mod engine;
mod error;
pub mod prompts;
mod types;

pub use categorizer::{categorize, normalize_category_label};
pub use completion::{
    ChatMessage, ChatRole, CompletionClient, CompletionOptions, OpenAiCompletionClient,
};
pub use engine::{ChatFlow, StartedContact, TurnOutcome};
pub use error::{TriageError, TriageResult};
pub use types::{ChatPhase, Competence, Phase, Speaker, Transcript, Turn};
