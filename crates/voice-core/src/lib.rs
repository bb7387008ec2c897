//! Realtime voice support sessions
//!
//! This crate hosts the voice half of the helpline: negotiating a
//! bidirectional media session with a realtime speech agent, priming it
//! with the phase's behavior script, and performing the mid-call handoff
//! when the triage agent decides where the caller belongs.
//!
//! The pieces compose bottom-up:
//!
//! - [`capture`] acquires the local audio source,
//! - [`credentials`] mints the ephemeral per-session bearer,
//! - [`events`] speaks the control-channel protocol,
//! - [`negotiator`] owns the one live session and the connect protocol,
//! - [`call`] drives the whole call: entry, handoff, teardown.
//!
//! Scripts, phases, and the category model come from
//! [`helpline_triage_core`]; caller recognition comes from
//! [`helpline_directory_core`].

pub mod call;
pub mod capture;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod negotiator;

pub use call::{CallStatus, VoiceCall};
pub use capture::{AudioCapture, AudioFrame, CaptureControl, CaptureHandle, SilenceCapture};
pub use config::VoiceConfig;
pub use credentials::{
    route_tool_schema, CredentialIssuer, OpenAiCredentialIssuer, SessionCredentialRequest,
};
pub use error::{VoiceError, VoiceResult};
pub use events::{parse_server_event, ClientDirective, RouteInstruction, ServerEvent};
pub use negotiator::{
    AnswerExchange, HttpAnswerExchange, SessionInfo, SessionNegotiator, SessionProfile,
};

#[cfg(feature = "device-cpal")]
pub use capture::CpalCapture;
