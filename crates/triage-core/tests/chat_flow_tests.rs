//! End-to-end tests of the turn-based chat state machine against a scripted
//! completion client and an in-memory directory.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use helpline_directory_core::{ContactDirectory, MemoryDirectory};
use helpline_triage_core::prompts::{self, READY_MARKER};
use helpline_triage_core::{
    ChatFlow, ChatMessage, ChatPhase, Competence, CompletionClient, CompletionOptions, Phase,
    Speaker, TriageError, TriageResult, TurnOutcome,
};

/// Completion client that replays a fixed script of replies and records
/// every call it receives.
#[derive(Default)]
struct ScriptedClient {
    replies: Mutex<Vec<Result<String, String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

#[derive(Clone)]
struct RecordedCall {
    system_prompt: String,
    message_count: usize,
}

impl ScriptedClient {
    fn with_replies(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn push_failure(&self, message: &str) {
        self.replies.lock().push(Err(message.to_string()));
    }

    fn push_reply(&self, reply: &str) {
        self.replies.lock().push(Ok(reply.to_string()));
    }

    fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        _options: CompletionOptions,
    ) -> TriageResult<String> {
        self.calls.lock().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            message_count: messages.len(),
        });
        let next = {
            let mut replies = self.replies.lock();
            if replies.is_empty() {
                panic!("scripted client ran out of replies");
            }
            replies.remove(0)
        };
        next.map_err(TriageError::completion_failed)
    }
}

fn flow_with(client: Arc<ScriptedClient>, directory: Arc<MemoryDirectory>) -> ChatFlow {
    ChatFlow::new(client, directory, "+15551234567")
}

#[tokio::test]
async fn unknown_caller_enters_triage_without_completion_calls() {
    let client = Arc::new(ScriptedClient::default());
    let flow_client = client.clone();
    let mut flow = flow_with(flow_client, Arc::new(MemoryDirectory::new()));

    let started = flow.start().await.unwrap();
    assert_eq!(started.phase, Phase::Triage);
    assert!(!started.skipped_triage);
    assert_eq!(flow.phase(), ChatPhase::Active(Phase::Triage));
    assert!(client.calls().is_empty(), "triage entry needs no completion call");
}

#[tokio::test]
async fn markerless_replies_never_advance_or_categorize() {
    let client = Arc::new(ScriptedClient::with_replies(&[
        "Sorry to hear that. What have you already tried?",
    ]));
    let mut flow = flow_with(client.clone(), Arc::new(MemoryDirectory::new()));
    flow.start().await.unwrap();

    let outcome = flow.handle_user_turn("my printer is broken").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Reply { .. }));
    assert_eq!(flow.phase(), ChatPhase::Active(Phase::Triage));

    let calls = client.calls();
    assert_eq!(calls.len(), 1, "exactly one completion call per triage turn");
    assert_eq!(calls[0].system_prompt, prompts::resolve(Phase::Triage, true));
}

#[tokio::test]
async fn technical_caller_routes_to_tier_two() {
    let client = Arc::new(ScriptedClient::with_replies(&[
        "Thanks. What have you tried so far?",
        "Got it, thanks for the details. One moment. [READY_TO_ROUTE]",
        "technical",
        "Hi, I'm Alex from Tier 2. Let's check the gateway ARP table next.",
    ]));
    let directory = Arc::new(MemoryDirectory::new());
    let mut flow = flow_with(client.clone(), directory.clone());
    flow.start().await.unwrap();

    let first = flow.handle_user_turn("I can't connect to Wi-Fi").await.unwrap();
    assert!(matches!(first, TurnOutcome::Reply { .. }));

    let second = flow
        .handle_user_turn("I restarted the router, IP is 10.0.0.5, still times out pinging the gateway")
        .await
        .unwrap();

    match second {
        TurnOutcome::Routed {
            reply,
            greeting,
            category,
            next_phase,
        } => {
            assert_eq!(category, Competence::Technical);
            assert_eq!(next_phase, Phase::TierTwo);
            assert!(!reply.contains(READY_MARKER), "marker must be stripped");
            assert!(greeting.contains("Alex"));
        }
        other => panic!("expected routing, got {other:?}"),
    }

    assert_eq!(flow.phase(), ChatPhase::Active(Phase::TierTwo));

    // Categorization was persisted
    let stored = directory.lookup("+15551234567").await.unwrap();
    assert_eq!(stored.tech_competence, Some(true));

    // Marker never reached the transcript; the handoff is narrated
    let transcript = flow.transcript();
    assert!(transcript.turns().iter().all(|t| !t.text.contains(READY_MARKER)));
    assert!(transcript
        .turns()
        .iter()
        .any(|t| t.speaker == Speaker::System && t.text.contains("Tier 2")));

    // The calls were: triage, triage, classification, greeting
    let calls = client.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[2].system_prompt, prompts::CATEGORIZATION_PROMPT);
    assert_eq!(calls[2].message_count, 1, "classification input is single-turn");
    assert_eq!(calls[3].system_prompt, prompts::resolve(Phase::TierTwo, true));
}

#[tokio::test]
async fn first_turn_marker_is_legitimate() {
    // A user message carrying both problem and remediation detail may
    // trigger the marker immediately.
    let client = Arc::new(ScriptedClient::with_replies(&[
        "Understood, you've covered the basics already. [READY_TO_ROUTE]",
        "non-technical",
        "Hi, I'm Sam from Tier 1. Let's start by power-cycling the printer.",
    ]));
    let mut flow = flow_with(client, Arc::new(MemoryDirectory::new()));
    flow.start().await.unwrap();

    let outcome = flow
        .handle_user_turn("printer offline, I already restarted it and checked the cable")
        .await
        .unwrap();

    match outcome {
        TurnOutcome::Routed { category, next_phase, .. } => {
            assert_eq!(category, Competence::NonTechnical);
            assert_eq!(next_phase, Phase::TierOne);
        }
        other => panic!("expected routing, got {other:?}"),
    }
}

#[tokio::test]
async fn known_caller_bypasses_triage_with_direct_script() {
    let directory = Arc::new(MemoryDirectory::with_records([(
        "+15551234567".to_string(),
        true,
    )]));
    let client = Arc::new(ScriptedClient::with_replies(&[
        "Hi, I'm Alex from Tier 2. What are you dealing with today?",
    ]));
    let mut flow = flow_with(client.clone(), directory);

    let started = flow.start().await.unwrap();
    assert_eq!(started.phase, Phase::TierTwo);
    assert!(started.skipped_triage);
    assert_eq!(flow.phase(), ChatPhase::Active(Phase::TierTwo));

    // Direct script variant, empty history, no triage turns recorded
    let calls = client.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].system_prompt, prompts::resolve(Phase::TierTwo, false));
    assert_eq!(calls[0].message_count, 0);
    assert_eq!(flow.transcript().len(), 1);
}

#[tokio::test]
async fn greeting_failure_leaves_machine_in_triage() {
    let client = Arc::new(ScriptedClient::default());
    client.push_reply("All set, routing you now. [READY_TO_ROUTE]");
    client.push_reply("non-technical");
    client.push_failure("provider returned 500");
    let directory = Arc::new(MemoryDirectory::new());
    let mut flow = flow_with(client.clone(), directory.clone());
    flow.start().await.unwrap();

    let err = flow
        .handle_user_turn("it's slow and I haven't tried anything")
        .await
        .unwrap_err();
    assert!(matches!(err, TriageError::CompletionCallFailed { .. }));

    // Phase did not advance; a fresh user turn retries triage
    assert_eq!(flow.phase(), ChatPhase::Active(Phase::Triage));

    // The categorization write is fire-and-forget and already happened
    let stored = directory.lookup("+15551234567").await.unwrap();
    assert_eq!(stored.tech_competence, Some(false));

    // Retry succeeds end to end
    client.push_reply("Thanks for your patience. [READY_TO_ROUTE]");
    client.push_reply("non-technical");
    client.push_reply("Hi, I'm Sam from Tier 1. Let's restart the router together.");
    let outcome = flow.handle_user_turn("still slow").await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Routed { next_phase: Phase::TierOne, .. }));
}

#[tokio::test]
async fn tier_turn_failure_keeps_phase() {
    let directory = Arc::new(MemoryDirectory::with_records([(
        "+15551234567".to_string(),
        false,
    )]));
    let client = Arc::new(ScriptedClient::with_replies(&["Hi, I'm Sam from Tier 1."]));
    let mut flow = flow_with(client.clone(), directory);
    flow.start().await.unwrap();

    client.push_failure("timeout");
    let err = flow.handle_user_turn("ok what now").await.unwrap_err();
    assert!(matches!(err, TriageError::CompletionCallFailed { .. }));
    assert_eq!(flow.phase(), ChatPhase::Active(Phase::TierOne));
}

#[tokio::test]
async fn turns_before_start_are_rejected() {
    let client = Arc::new(ScriptedClient::default());
    let mut flow = flow_with(client, Arc::new(MemoryDirectory::new()));

    let err = flow.handle_user_turn("hello?").await.unwrap_err();
    assert!(matches!(err, TriageError::InvalidState { .. }));
}

#[tokio::test]
async fn lookup_failure_degrades_to_triage() {
    /// Directory that always fails lookups
    struct DownDirectory;

    #[async_trait]
    impl ContactDirectory for DownDirectory {
        async fn lookup(
            &self,
            phone_key: &str,
        ) -> helpline_directory_core::DirectoryResult<helpline_directory_core::LookupOutcome>
        {
            Err(helpline_directory_core::DirectoryError::malformed_record(phone_key))
        }

        async fn upsert(
            &self,
            _phone_key: &str,
            _technical: bool,
        ) -> helpline_directory_core::DirectoryResult<()> {
            Ok(())
        }
    }

    let client = Arc::new(ScriptedClient::default());
    let mut flow = ChatFlow::new(client, Arc::new(DownDirectory), "+15550009999");

    let started = flow.start().await.unwrap();
    assert_eq!(started.phase, Phase::Triage);
}
