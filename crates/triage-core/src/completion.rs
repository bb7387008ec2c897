//! Completion-call client seam
//!
//! The flows treat the language model as an opaque function
//! `complete(system_prompt, history, options) -> text`. [`CompletionClient`]
//! is the injected seam; [`OpenAiCompletionClient`] is the production
//! implementation over the chat-completions HTTP API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TriageError, TriageResult};
use crate::types::{Speaker, Transcript};

/// Role of a completion-call message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Caller turn
    User,
    /// Agent turn
    Assistant,
}

/// One message of a completion-call conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: ChatRole,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Build a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Build an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    /// Project a transcript into completion-call messages
    ///
    /// System turns are narrational only and are excluded; agent turns map
    /// to the assistant role.
    pub fn from_transcript(transcript: &Transcript) -> Vec<ChatMessage> {
        transcript
            .turns()
            .iter()
            .filter(|t| t.speaker != Speaker::System)
            .map(|t| match t.speaker {
                Speaker::User => ChatMessage::user(&t.text),
                _ => ChatMessage::assistant(&t.text),
            })
            .collect()
    }
}

/// Sampling options for a completion call
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionOptions {
    /// Sampling temperature; provider default when unset
    pub temperature: Option<f32>,
    /// Output token cap; provider default when unset
    pub max_output_tokens: Option<u32>,
}

impl CompletionOptions {
    /// Fixed low-temperature, short-output settings for classification
    pub fn classification() -> Self {
        Self {
            temperature: Some(0.1),
            max_output_tokens: Some(10),
        }
    }
}

/// Injected seam for the language-model completion call
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Submit a conversation under a system prompt and return the reply text
    ///
    /// Fails with [`TriageError::EmptyCompletion`] when the provider returns
    /// no content.
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> TriageResult<String>;
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 300;

/// Production [`CompletionClient`] over the chat-completions HTTP API
pub struct OpenAiCompletionClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCompletionClient {
    /// Create a client for the given API key with default endpoint and model
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from the `OPENAI_API_KEY` environment variable
    pub fn from_env() -> TriageResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| TriageError::completion_failed("OPENAI_API_KEY is not set"))?;
        Ok(Self::new(api_key))
    }

    /// Override the API base URL (useful for compatible providers and tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the completion model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> TriageResult<String> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(WireMessage {
            role: "system",
            content: system_prompt,
        });
        wire.extend(messages.iter().map(|m| WireMessage {
            role: match m.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            },
            content: &m.content,
        }));

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: wire,
            temperature: options.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: options.max_output_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };

        debug!("completion call: model = {}, {} messages", self.model, messages.len());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::completion_failed(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(TriageError::EmptyCompletion);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_projection_drops_system_turns() {
        let mut transcript = Transcript::new();
        transcript.push_agent("How can I help?");
        transcript.push_user("wifi is down");
        transcript.push_system("Routing you to Tier 2");

        let messages = ChatMessage::from_transcript(&transcript);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::Assistant);
        assert_eq!(messages[1].role, ChatRole::User);
        assert_eq!(messages[1].content, "wifi is down");
    }

    #[test]
    fn classification_options_are_low_temperature_short_output() {
        let options = CompletionOptions::classification();
        assert_eq!(options.temperature, Some(0.1));
        assert_eq!(options.max_output_tokens, Some(10));
    }
}
