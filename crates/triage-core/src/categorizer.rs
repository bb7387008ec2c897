//! Competence categorization
//!
//! Turns a triage transcript into a binary competence label with a single
//! low-temperature classification call. The post-processing is deliberately
//! fail-safe: only an exact `technical` answer routes to the advanced tier,
//! and any ambiguity, malformed output, or transport failure routes to the
//! guided tier instead.

use tracing::{debug, warn};

use crate::completion::{ChatMessage, CompletionClient, CompletionOptions};
use crate::prompts::CATEGORIZATION_PROMPT;
use crate::types::{Competence, Transcript};

/// Normalize a raw classification reply into a competence label
///
/// Accepts `technical` or the quoted literal `"technical"`, after
/// lowercasing and trimming. Everything else is `NonTechnical`.
pub fn normalize_category_label(raw: &str) -> Competence {
    let normalized = raw.to_lowercase();
    let normalized = normalized.trim();
    if normalized == "technical" || normalized == "\"technical\"" {
        Competence::Technical
    } else {
        Competence::NonTechnical
    }
}

/// Classify the caller from the triage transcript
///
/// Builds one synthetic input from the `User` turns (in order, joined with
/// newlines) and submits it with classification settings. Never fails: a
/// failed call is logged and categorized as `NonTechnical`.
pub async fn categorize(client: &dyn CompletionClient, transcript: &Transcript) -> Competence {
    let conversation = transcript.user_text();

    let raw = client
        .complete(
            CATEGORIZATION_PROMPT,
            &[ChatMessage::user(conversation)],
            CompletionOptions::classification(),
        )
        .await;

    match raw {
        Ok(label) => {
            let competence = normalize_category_label(&label);
            debug!("categorized caller as {:?} (raw label: {:?})", competence, label);
            competence
        }
        Err(e) => {
            warn!("classification call failed: {}, defaulting to non-technical", e);
            Competence::NonTechnical
        }
    }
}
