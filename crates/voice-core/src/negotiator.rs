//! Realtime session negotiation
//!
//! Establishes one bidirectional media session bound to a phase and
//! mediates the control protocol over an auxiliary data channel. The
//! connect protocol is strictly ordered:
//!
//! 1. acquire the local audio source (abort before any network step),
//! 2. open a peer connection and register observers before negotiating,
//! 3. attach the local track and apply the current mute flag,
//! 4. open the `oai-events` control channel,
//! 5. on channel open, prime the session per the mute flag,
//! 6. produce the offer and wait (bounded) for ICE gathering to complete,
//! 7. obtain an ephemeral credential from the issuer,
//! 8. exchange the offer for an answer under that credential,
//! 9. apply the answer and mark the session connected.
//!
//! At most one session is live at a time; `close` is idempotent and always
//! runs before a reconnect. Every connect attempt takes a new generation
//! number, and anything arriving on behalf of a superseded generation is
//! discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use helpline_triage_core::{prompts, Phase};

use crate::capture::{AudioCapture, CaptureControl, CaptureHandle};
use crate::config::VoiceConfig;
use crate::credentials::{CredentialIssuer, SessionCredentialRequest};
use crate::error::{VoiceError, VoiceResult};
use crate::events::{parse_server_event, ClientDirective, RouteInstruction};

/// Context variant a session is connected with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProfile {
    /// Whether the script may assume triage knowledge
    pub has_prior_context: bool,
    /// Summary carried across a handoff; non-empty only with continuity
    pub carried_summary: Option<String>,
}

impl SessionProfile {
    /// Profile for the first session of a fresh contact (triage entry)
    pub fn initial() -> Self {
        Self {
            has_prior_context: true,
            carried_summary: None,
        }
    }

    /// Profile for direct tier entry of a recognized returning caller
    pub fn direct() -> Self {
        Self {
            has_prior_context: false,
            carried_summary: None,
        }
    }

    /// Profile for the session replacing triage after a handoff
    pub fn handoff(summary: impl Into<String>) -> Self {
        let summary = summary.into();
        Self {
            has_prior_context: true,
            carried_summary: (!summary.is_empty()).then_some(summary),
        }
    }
}

/// Read-only view of the live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Phase the session hosts
    pub phase: Phase,
    /// Context variant it was connected with
    pub profile: SessionProfile,
}

/// Injected seam for the offer/answer exchange with the remote endpoint
#[async_trait]
pub trait AnswerExchange: Send + Sync {
    /// Submit the finalized offer under the ephemeral bearer, returning the
    /// answer SDP
    async fn exchange(&self, offer_sdp: &str, bearer: &str) -> VoiceResult<String>;
}

/// Production [`AnswerExchange`] posting `application/sdp` over HTTP
pub struct HttpAnswerExchange {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpAnswerExchange {
    /// Create an exchange against the given realtime endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl AnswerExchange for HttpAnswerExchange {
    async fn exchange(&self, offer_sdp: &str, bearer: &str) -> VoiceResult<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(bearer)
            .header(reqwest::header::CONTENT_TYPE, "application/sdp")
            .body(offer_sdp.to_string())
            .send()
            .await
            .map_err(|e| VoiceError::negotiation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VoiceError::negotiation(format!(
                "offer exchange returned {}",
                status
            )));
        }
        response
            .text()
            .await
            .map_err(|e| VoiceError::negotiation(e.to_string()))
    }
}

struct ActiveSession {
    phase: Phase,
    profile: SessionProfile,
    generation: u64,
    peer: Arc<RTCPeerConnection>,
    channel: Arc<RTCDataChannel>,
    capture: CaptureControl,
}

/// Owns the one live realtime session of a contact
pub struct SessionNegotiator {
    config: VoiceConfig,
    issuer: Arc<dyn CredentialIssuer>,
    capture: Arc<dyn AudioCapture>,
    exchange: Arc<dyn AnswerExchange>,
    routes: mpsc::UnboundedSender<RouteInstruction>,
    muted: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionNegotiator {
    /// Create a negotiator and the stream of routing instructions it emits
    pub fn new(
        config: VoiceConfig,
        issuer: Arc<dyn CredentialIssuer>,
        capture: Arc<dyn AudioCapture>,
        exchange: Arc<dyn AnswerExchange>,
    ) -> (Self, mpsc::UnboundedReceiver<RouteInstruction>) {
        let (routes, routes_rx) = mpsc::unbounded_channel();
        let negotiator = Self {
            config,
            issuer,
            capture,
            exchange,
            routes,
            muted: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        };
        (negotiator, routes_rx)
    }

    /// Negotiator configuration
    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    /// Whether the local input is muted
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    /// Whether a session is currently live
    pub async fn is_connected(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Phase and profile of the live session, if any
    pub async fn session_info(&self) -> Option<SessionInfo> {
        self.active.lock().await.as_ref().map(|s| SessionInfo {
            phase: s.phase,
            profile: s.profile.clone(),
        })
    }

    /// Establish a session for `phase`, replacing any live session first
    pub async fn connect(&self, phase: Phase, profile: SessionProfile) -> VoiceResult<()> {
        // Teardown always precedes a connect, including on the handoff path
        self.close().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Step 1: local audio, before any network work
        let CaptureHandle { control, frames } = self.capture.open().await?;
        control.set_enabled(!self.is_muted());

        let outcome = self
            .establish(phase, &profile, generation, &control, frames)
            .await;
        let (peer, channel) = match outcome {
            Ok(parts) => parts,
            Err(e) => {
                control.stop();
                return Err(e);
            }
        };

        // The staleness check and the install share the lock, so a close
        // racing this connect can never leave a session installed after
        // its teardown ran.
        let mut active = self.active.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            drop(active);
            let _ = peer.close().await;
            control.stop();
            return Err(VoiceError::negotiation("connect attempt superseded"));
        }
        *active = Some(ActiveSession {
            phase,
            profile,
            generation,
            peer,
            channel,
            capture: control,
        });
        info!("realtime session connected for {:?} (generation {})", phase, generation);
        Ok(())
    }

    async fn establish(
        &self,
        phase: Phase,
        profile: &SessionProfile,
        generation: u64,
        control: &CaptureControl,
        frames: mpsc::Receiver<crate::capture::AudioFrame>,
    ) -> VoiceResult<(Arc<RTCPeerConnection>, Arc<RTCDataChannel>)> {
        // Step 2: peer connection with NAT traversal relays
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = if self.config.stun_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: self.config.stun_servers.clone(),
                ..Default::default()
            }]
        };
        let peer = Arc::new(
            api.new_peer_connection(RTCConfiguration {
                ice_servers,
                ..Default::default()
            })
            .await?,
        );

        match self
            .negotiate_on(&peer, phase, profile, generation, control, frames)
            .await
        {
            Ok(channel) => Ok((peer, channel)),
            Err(e) => {
                let _ = peer.close().await;
                Err(e)
            }
        }
    }

    async fn negotiate_on(
        &self,
        peer: &Arc<RTCPeerConnection>,
        phase: Phase,
        profile: &SessionProfile,
        generation: u64,
        control: &CaptureControl,
        mut frames: mpsc::Receiver<crate::capture::AudioFrame>,
    ) -> VoiceResult<Arc<RTCDataChannel>> {
        // Observers are registered before any negotiation begins
        peer.on_peer_connection_state_change(Box::new(move |state| {
            debug!("peer connection state: {}", state);
            Box::pin(async {})
        }));
        peer.on_ice_connection_state_change(Box::new(move |state| {
            debug!("ice connection state: {}", state);
            Box::pin(async {})
        }));
        peer.on_track(Box::new(move |track, _receiver, _transceiver| {
            debug!("remote track attached: {}", track.id());
            // Drain inbound media; playback is wired by the embedding
            // application.
            tokio::spawn(async move { while track.read_rtp().await.is_ok() {} });
            Box::pin(async {})
        }));

        // Step 3: local audio track, mute applied via the capture control
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48_000,
                channels: 1,
                ..Default::default()
            },
            "audio".to_owned(),
            "helpline-mic".to_owned(),
        ));
        peer.add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        let forward_control = control.clone();
        tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                if !forward_control.is_enabled() {
                    continue;
                }
                let sample = Sample {
                    data: frame.payload,
                    duration: frame.duration,
                    ..Default::default()
                };
                if track.write_sample(&sample).await.is_err() {
                    break;
                }
            }
        });

        // Step 4: auxiliary control channel
        let channel = peer.create_data_channel("oai-events", None).await?;

        // Step 5: prime the new session once the channel opens
        let open_channel = Arc::clone(&channel);
        let open_muted = Arc::clone(&self.muted);
        channel.on_open(Box::new(move || {
            let channel = Arc::clone(&open_channel);
            let muted = open_muted.load(Ordering::SeqCst);
            Box::pin(async move {
                let directives: &[ClientDirective] = if muted {
                    // Keep buffered silence from being read as speech
                    &[ClientDirective::ClearInputBuffer, ClientDirective::DisableTurnDetection]
                } else {
                    // The remote agent speaks first
                    &[ClientDirective::CreateResponse]
                };
                for directive in directives {
                    if let Err(e) = channel.send_text(directive.to_json()).await {
                        warn!("control-channel directive not delivered: {}", e);
                    }
                }
            })
        }));

        let routes = self.routes.clone();
        let generation_counter = Arc::clone(&self.generation);
        channel.on_message(Box::new(move |message| {
            let routes = routes.clone();
            let generation_counter = Arc::clone(&generation_counter);
            Box::pin(async move {
                if !message.is_string {
                    return;
                }
                let Ok(text) = std::str::from_utf8(&message.data) else {
                    return;
                };
                let Some(event) = parse_server_event(text) else {
                    return;
                };
                if let Some(instruction) = RouteInstruction::from_event(&event) {
                    forward_if_current(&generation_counter, generation, instruction, &routes);
                }
            })
        }));

        // Step 6: offer, then wait (bounded) for ICE gathering to complete
        // before reading the finalized description
        let offer = peer.create_offer(None).await?;
        let mut gather_complete = peer.gathering_complete_promise().await;
        peer.set_local_description(offer).await?;

        let seconds = self.config.ice_gathering_timeout.as_secs();
        tokio::time::timeout(self.config.ice_gathering_timeout, gather_complete.recv())
            .await
            .map_err(|_| VoiceError::NegotiationTimeout { seconds })?;

        let offer_sdp = peer
            .local_description()
            .await
            .ok_or_else(|| VoiceError::negotiation("local description missing after gathering"))?
            .sdp;

        // Step 7: ephemeral credential with the behavior baked in
        let request = SessionCredentialRequest {
            instructions: prompts::resolve_voice(
                phase,
                profile.has_prior_context,
                profile.carried_summary.as_deref(),
            ),
            voice: self.config.voice_for(phase).to_string(),
            phase,
        };
        let secret = self.issuer.issue(&request).await?;

        if self.generation.load(Ordering::SeqCst) != generation {
            return Err(VoiceError::negotiation("connect attempt superseded"));
        }

        // Steps 8-9: offer/answer exchange under the ephemeral bearer
        let answer_sdp = self.exchange.exchange(&offer_sdp, &secret).await?;
        let answer = RTCSessionDescription::answer(answer_sdp)?;
        peer.set_remote_description(answer).await?;

        Ok(channel)
    }

    /// Tear down the live session, if any
    ///
    /// Safe to call when no session is active; always runs before a
    /// subsequent connect.
    pub async fn close(&self) {
        // Invalidate anything still in flight for the torn-down session
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut active = self.active.lock().await;
        if let Some(session) = active.take() {
            if let Err(e) = session.peer.close().await {
                warn!("peer connection close failed: {}", e);
            }
            session.capture.stop();
            debug!(
                "session for {:?} closed (generation {})",
                session.phase, session.generation
            );
        }
    }

    /// Set the mute flag, applying it locally and, when the control channel
    /// is open, to the remote session's voice-activity detection
    ///
    /// With the channel not open the flag still applies to the local track;
    /// the server-side directive is simply not sent.
    pub async fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);

        let active = self.active.lock().await;
        let Some(session) = active.as_ref() else {
            return;
        };
        session.capture.set_enabled(!muted);

        if session.channel.ready_state() != RTCDataChannelState::Open {
            return;
        }
        let directives: &[ClientDirective] = if muted {
            &[ClientDirective::ClearInputBuffer, ClientDirective::DisableTurnDetection]
        } else {
            &[ClientDirective::EnableServerVad]
        };
        for directive in directives {
            if let Err(e) = session.channel.send_text(directive.to_json()).await {
                warn!("mute directive not delivered: {}", e);
            }
        }
    }
}

/// Forward a routing instruction unless its session has been superseded
///
/// `generation` is the counter value the session was connected under; every
/// close or reconnect bumps the shared counter, fencing off instructions
/// that a torn-down session delivers late.
fn forward_if_current(
    counter: &AtomicU64,
    generation: u64,
    instruction: RouteInstruction,
    routes: &mpsc::UnboundedSender<RouteInstruction>,
) -> bool {
    if counter.load(Ordering::SeqCst) != generation {
        debug!("discarding routing instruction from superseded session");
        return false;
    }
    routes.send(instruction).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpline_triage_core::Competence;

    fn instruction() -> RouteInstruction {
        RouteInstruction {
            category: Competence::Technical,
            summary: "vpn drops under load".to_string(),
        }
    }

    #[test]
    fn current_generation_instructions_are_forwarded() {
        let counter = AtomicU64::new(3);
        let (routes, mut routed) = mpsc::unbounded_channel();

        assert!(forward_if_current(&counter, 3, instruction(), &routes));
        assert_eq!(routed.try_recv().unwrap(), instruction());
    }

    #[test]
    fn instructions_from_a_superseded_session_are_dropped() {
        let counter = AtomicU64::new(3);
        let (routes, mut routed) = mpsc::unbounded_channel();

        // A close or reconnect bumped the counter after the session
        // connected under generation 3.
        counter.fetch_add(1, Ordering::SeqCst);

        assert!(!forward_if_current(&counter, 3, instruction(), &routes));
        assert!(routed.try_recv().is_err());
    }
}
