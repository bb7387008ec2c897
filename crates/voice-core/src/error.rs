//! Error types for realtime voice sessions

use thiserror::Error;

/// Result type for voice session operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while negotiating or running a voice session
#[derive(Debug, Error)]
pub enum VoiceError {
    /// No local audio source could be acquired; aborts before any network step
    #[error("microphone unavailable: {message}")]
    MicrophoneUnavailable {
        /// Why the device could not be opened
        message: String,
    },

    /// ICE candidate gathering did not complete in time
    #[error("negotiation timed out after {seconds} seconds waiting for ICE gathering")]
    NegotiationTimeout {
        /// Configured wait in seconds
        seconds: u64,
    },

    /// The offer/answer exchange or the peer connection setup failed
    #[error("negotiation failed: {message}")]
    NegotiationFailed {
        /// Underlying failure description
        message: String,
    },

    /// The credential issuer rejected the session request
    #[error("credential issuance failed with status {status}: {message}")]
    CredentialIssuanceFailed {
        /// HTTP status returned by the issuer
        status: u16,
        /// Issuer error body
        message: String,
    },

    /// A phase was requested that the voice flow cannot host
    ///
    /// Configuration error, not user-recoverable.
    #[error("unknown phase for voice session: {phase}")]
    UnknownPhase {
        /// The offending phase description
        phase: String,
    },
}

impl VoiceError {
    /// Create a microphone error
    pub fn microphone(message: impl Into<String>) -> Self {
        Self::MicrophoneUnavailable {
            message: message.into(),
        }
    }

    /// Create a negotiation failure
    pub fn negotiation(message: impl Into<String>) -> Self {
        Self::NegotiationFailed {
            message: message.into(),
        }
    }

    /// Whether the caller can recover by dialing again
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnknownPhase { .. })
    }
}

impl From<webrtc::Error> for VoiceError {
    fn from(e: webrtc::Error) -> Self {
        Self::negotiation(e.to_string())
    }
}
