//! Voice session configuration

use std::time::Duration;

use helpline_triage_core::Phase;

/// Configuration for the session negotiator and the call controller
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STUN servers for NAT traversal; empty means host candidates only
    pub stun_servers: Vec<String>,
    /// Endpoint accepting the SDP offer for the realtime agent
    pub realtime_endpoint: String,
    /// Bound on the wait for ICE candidate gathering
    pub ice_gathering_timeout: Duration,
    /// Continuity pause between teardown and reconnect on a handoff
    pub handoff_pause: Duration,
    /// Pause before connecting a recognized returning caller
    pub welcome_back_pause: Duration,
    /// Voice used by the triage agent
    pub triage_voice: String,
    /// Voice used by the tier-one agent
    pub tier_one_voice: String,
    /// Voice used by the tier-two agent
    pub tier_two_voice: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            realtime_endpoint: "https://api.openai.com/v1/realtime/calls".to_string(),
            ice_gathering_timeout: Duration::from_secs(10),
            handoff_pause: Duration::from_millis(1500),
            welcome_back_pause: Duration::from_millis(1000),
            triage_voice: "ash".to_string(),
            tier_one_voice: "ballad".to_string(),
            tier_two_voice: "coral".to_string(),
        }
    }
}

impl VoiceConfig {
    /// The voice assigned to a phase's agent
    pub fn voice_for(&self, phase: Phase) -> &str {
        match phase {
            Phase::Triage => &self.triage_voice,
            Phase::TierOne => &self.tier_one_voice,
            Phase::TierTwo => &self.tier_two_voice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_phase_has_a_distinct_voice() {
        let config = VoiceConfig::default();
        let voices = [
            config.voice_for(Phase::Triage),
            config.voice_for(Phase::TierOne),
            config.voice_for(Phase::TierTwo),
        ];
        assert_eq!(voices.len(), 3);
        assert_ne!(voices[0], voices[1]);
        assert_ne!(voices[1], voices[2]);
    }
}
