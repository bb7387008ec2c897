//! Voice call lifecycle and mid-call handoff
//!
//! [`VoiceCall`] drives the contact from dial to hang-up: directory-informed
//! entry (triage for unknown callers, direct tier entry for recognized
//! ones), the handoff triggered by a routing instruction, and teardown.
//! Status transitions are published over a watch channel so an embedding
//! application can render them.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use helpline_directory_core::{lookup_or_unknown, upsert_best_effort, ContactDirectory};
use helpline_triage_core::{Competence, Phase};

use crate::error::VoiceResult;
use crate::events::RouteInstruction;
use crate::negotiator::{SessionNegotiator, SessionProfile};

/// Externally visible state of the call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallStatus {
    /// No call in progress
    Idle,
    /// Dialing; the first session is being negotiated
    Connecting,
    /// A session is live
    Connected {
        /// Phase the live session hosts
        phase: Phase,
    },
    /// Between sessions during a handoff (or pre-connect for a recognized
    /// caller); the tier label is shown to the caller
    Routing {
        /// Human-readable label of the destination tier
        tier: &'static str,
    },
    /// The call is over
    Ended,
}

/// One support call, owning the negotiator and the routing loop
pub struct VoiceCall {
    negotiator: Arc<SessionNegotiator>,
    directory: Arc<dyn ContactDirectory>,
    phone_key: String,
    status: watch::Sender<CallStatus>,
    routes: Mutex<Option<mpsc::UnboundedReceiver<RouteInstruction>>>,
}

impl VoiceCall {
    /// Create a call for the given caller identity
    ///
    /// `routes` is the instruction stream produced by the negotiator;
    /// [`VoiceCall::spawn_route_loop`] consumes it.
    pub fn new(
        negotiator: Arc<SessionNegotiator>,
        routes: mpsc::UnboundedReceiver<RouteInstruction>,
        directory: Arc<dyn ContactDirectory>,
        phone_key: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(CallStatus::Idle);
        Self {
            negotiator,
            directory,
            phone_key: phone_key.into(),
            status,
            routes: Mutex::new(Some(routes)),
        }
    }

    /// Subscribe to status transitions
    pub fn status(&self) -> watch::Receiver<CallStatus> {
        self.status.subscribe()
    }

    fn set_status(&self, status: CallStatus) {
        let _ = self.status.send(status);
    }

    /// Start the call
    ///
    /// A recognized caller skips triage and lands directly in their stored
    /// tier; everyone else starts in triage. Failure is recoverable: the
    /// call returns to `Idle` and may be dialed again.
    pub async fn dial(&self) -> VoiceResult<()> {
        self.set_status(CallStatus::Connecting);

        let outcome = lookup_or_unknown(self.directory.as_ref(), &self.phone_key).await;
        let known_tier = outcome
            .tech_competence
            .filter(|_| outcome.found)
            .map(|technical| Competence::from_technical_flag(technical).target_phase());

        let attempted = match known_tier {
            Some(tier) => {
                info!("recognized caller, entering {:?} directly", tier);
                self.set_status(CallStatus::Routing { tier: tier.label() });
                tokio::time::sleep(self.negotiator.config().welcome_back_pause).await;
                self.negotiator
                    .connect(tier, SessionProfile::direct())
                    .await
                    .map(|_| tier)
            }
            None => self
                .negotiator
                .connect(Phase::Triage, SessionProfile::initial())
                .await
                .map(|_| Phase::Triage),
        };

        match attempted {
            Ok(phase) => {
                self.set_status(CallStatus::Connected { phase });
                Ok(())
            }
            Err(e) => {
                warn!("dial failed: {}", e);
                self.set_status(CallStatus::Idle);
                Err(e)
            }
        }
    }

    /// Perform the handoff demanded by a routing instruction
    ///
    /// The live triage session is torn down first, a continuity pause
    /// follows, then the tier session is negotiated with the carried
    /// summary. A failed handoff ends the call; it is never retried.
    pub async fn handle_route(&self, instruction: RouteInstruction) {
        let tier = instruction.category.target_phase();
        info!("routing caller to {:?}", tier);
        self.set_status(CallStatus::Routing { tier: tier.label() });

        upsert_best_effort(
            self.directory.as_ref(),
            &self.phone_key,
            instruction.category.is_technical(),
        )
        .await;

        self.negotiator.close().await;
        tokio::time::sleep(self.negotiator.config().handoff_pause).await;

        match self
            .negotiator
            .connect(tier, SessionProfile::handoff(instruction.summary))
            .await
        {
            Ok(()) => self.set_status(CallStatus::Connected { phase: tier }),
            Err(e) => {
                warn!("handoff to {:?} failed, ending call: {}", tier, e);
                self.set_status(CallStatus::Ended);
            }
        }
    }

    /// Consume routing instructions for the lifetime of the call
    ///
    /// The instruction stream can only be consumed once; a second spawn
    /// exits immediately.
    pub fn spawn_route_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let call = Arc::clone(self);
        tokio::spawn(async move {
            let receiver = call.routes.lock().await.take();
            let Some(mut receiver) = receiver else {
                return;
            };
            while let Some(instruction) = receiver.recv().await {
                call.handle_route(instruction).await;
            }
        })
    }

    /// Mute or unmute the caller's input
    pub async fn set_muted(&self, muted: bool) {
        self.negotiator.set_muted(muted).await;
    }

    /// Whether the caller's input is muted
    pub fn is_muted(&self) -> bool {
        self.negotiator.is_muted()
    }

    /// End the call
    pub async fn hang_up(&self) {
        self.negotiator.close().await;
        self.set_status(CallStatus::Ended);
        info!("call ended");
    }
}
