//! Ephemeral session credential issuance
//!
//! Connecting a realtime session requires a short-lived bearer value scoped
//! to one SDP exchange. The issuer receives the full session configuration
//! (resolved script, voice, tool availability) so the credential has the
//! behavior baked in and the media endpoint needs nothing else.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use helpline_triage_core::prompts::ROUTE_TOOL_NAME;
use helpline_triage_core::Phase;

use crate::error::{VoiceError, VoiceResult};

/// What the issuer needs to mint a credential for one session
#[derive(Debug, Clone)]
pub struct SessionCredentialRequest {
    /// Resolved behavior script for the session
    pub instructions: String,
    /// Voice the agent speaks with
    pub voice: String,
    /// Phase the session hosts; decides tool availability
    pub phase: Phase,
}

/// Injected seam for the external credential issuer
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    /// Mint an ephemeral bearer value for one session
    async fn issue(&self, request: &SessionCredentialRequest) -> VoiceResult<String>;
}

/// JSON schema of the routing tool offered to the triage agent
pub fn route_tool_schema() -> Value {
    json!({
        "type": "function",
        "name": ROUTE_TOOL_NAME,
        "description": "Route the caller to the appropriate support tier. Call this after \
gathering both the problem description and what troubleshooting they have tried.",
        "parameters": {
            "type": "object",
            "properties": {
                "category": {
                    "type": "string",
                    "enum": ["technical", "non-technical"],
                    "description": "Whether the caller is technical or non-technical based on \
their problem description and troubleshooting attempts"
                },
                "summary": {
                    "type": "string",
                    "description": "Brief summary of the caller's problem and troubleshooting \
attempts"
                }
            },
            "required": ["category", "summary"]
        }
    })
}

/// Full session configuration submitted to the issuer
///
/// The routing tool is offered only in triage; tier sessions get no tools.
pub(crate) fn session_config(request: &SessionCredentialRequest, model: &str) -> Value {
    let (tools, tool_choice) = if request.phase.offers_routing_tool() {
        (json!([route_tool_schema()]), json!("auto"))
    } else {
        (json!([]), json!("none"))
    };

    json!({
        "session": {
            "type": "realtime",
            "model": model,
            "instructions": request.instructions,
            "audio": { "output": { "voice": request.voice } },
            "tools": tools,
            "tool_choice": tool_choice,
        }
    })
}

const DEFAULT_ISSUER_URL: &str = "https://api.openai.com/v1/realtime/client_secrets";
const DEFAULT_REALTIME_MODEL: &str = "gpt-realtime";

/// Production [`CredentialIssuer`] over the realtime client-secrets API
pub struct OpenAiCredentialIssuer {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAiCredentialIssuer {
    /// Create an issuer for the given API key with default endpoint and model
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: DEFAULT_ISSUER_URL.to_string(),
            model: DEFAULT_REALTIME_MODEL.to_string(),
        }
    }

    /// Create an issuer from the `OPENAI_API_KEY` environment variable
    pub fn from_env() -> VoiceResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| VoiceError::CredentialIssuanceFailed {
            status: 0,
            message: "OPENAI_API_KEY is not set".to_string(),
        })?;
        Ok(Self::new(api_key))
    }

    /// Override the issuer endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Override the realtime model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl CredentialIssuer for OpenAiCredentialIssuer {
    async fn issue(&self, request: &SessionCredentialRequest) -> VoiceResult<String> {
        debug!("requesting session credential for {:?}", request.phase);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&session_config(request, &self.model))
            .send()
            .await
            .map_err(|e| VoiceError::CredentialIssuanceFailed {
                status: 0,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(VoiceError::CredentialIssuanceFailed {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await.map_err(|e| VoiceError::CredentialIssuanceFailed {
            status: status.as_u16(),
            message: e.to_string(),
        })?;

        // The issuer has returned the secret at the top level or nested,
        // depending on API revision.
        let value = body
            .get("value")
            .and_then(Value::as_str)
            .or_else(|| body.pointer("/client_secret/value").and_then(Value::as_str));

        match value {
            Some(secret) if !secret.is_empty() => Ok(secret.to_string()),
            _ => Err(VoiceError::CredentialIssuanceFailed {
                status: status.as_u16(),
                message: "no ephemeral value in issuer response".to_string(),
            }),
        }
    }
}
