//! Control-channel protocol
//!
//! The auxiliary data channel carries JSON events in both directions.
//! Inbound events are parsed into [`ServerEvent`]; anything malformed or of
//! an unrecognized kind is ignored rather than crashing the session. Exactly
//! one inbound event kind is actionable: a completed function invocation
//! naming the routing tool.

use serde::Deserialize;
use serde_json::json;
use tracing::trace;

use helpline_triage_core::prompts::ROUTE_TOOL_NAME;
use helpline_triage_core::Competence;

/// Inbound event from the realtime agent
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// A structured function invocation has completed
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        /// Name of the invoked tool
        name: String,
        /// Raw JSON argument payload
        #[serde(default)]
        arguments: String,
    },
    /// Every other event kind; carried through so dispatch stays exhaustive
    #[serde(other)]
    Unhandled,
}

/// Parse one raw control-channel message
///
/// Returns `None` for non-JSON payloads; those are dropped silently.
pub fn parse_server_event(raw: &str) -> Option<ServerEvent> {
    match serde_json::from_str(raw) {
        Ok(event) => Some(event),
        Err(e) => {
            trace!("ignoring malformed control-channel message: {}", e);
            None
        }
    }
}

/// A routing instruction extracted from the routing tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInstruction {
    /// Inferred competence category; `NonTechnical` when absent or malformed
    pub category: Competence,
    /// Carried summary of the triage conversation; may be empty
    pub summary: String,
}

impl RouteInstruction {
    /// Decode the routing tool's argument payload
    ///
    /// Tolerates a missing or unparsable payload by defaulting to the
    /// guided tier with no summary.
    pub fn from_tool_arguments(raw: &str) -> Self {
        #[derive(Deserialize, Default)]
        struct RouteArgs {
            category: Option<String>,
            summary: Option<String>,
        }

        let args: RouteArgs = serde_json::from_str(raw).unwrap_or_default();
        let category = match args.category.as_deref() {
            Some("technical") => Competence::Technical,
            _ => Competence::NonTechnical,
        };
        Self {
            category,
            summary: args.summary.unwrap_or_default(),
        }
    }

    /// Extract a routing instruction from an inbound event, if it is one
    pub fn from_event(event: &ServerEvent) -> Option<Self> {
        match event {
            ServerEvent::FunctionCallArgumentsDone { name, arguments }
                if name == ROUTE_TOOL_NAME =>
            {
                Some(Self::from_tool_arguments(arguments))
            }
            _ => None,
        }
    }
}

/// Outbound directive to the realtime agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientDirective {
    /// Drop any buffered input audio
    ClearInputBuffer,
    /// Disable server-side voice-activity detection
    DisableTurnDetection,
    /// Re-enable server-side voice-activity detection
    EnableServerVad,
    /// Ask the agent to produce its opening turn
    CreateResponse,
}

impl ClientDirective {
    /// Wire form of the directive
    pub fn to_json(&self) -> String {
        let value = match self {
            ClientDirective::ClearInputBuffer => json!({ "type": "input_audio_buffer.clear" }),
            ClientDirective::DisableTurnDetection => json!({
                "type": "session.update",
                "session": { "turn_detection": null }
            }),
            ClientDirective::EnableServerVad => json!({
                "type": "session.update",
                "session": { "turn_detection": { "type": "server_vad" } }
            }),
            ClientDirective::CreateResponse => json!({ "type": "response.create" }),
        };
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_tool_completion_is_actionable() {
        let raw = r#"{
            "type": "response.function_call_arguments.done",
            "name": "route_caller",
            "call_id": "call_1",
            "arguments": "{\"category\":\"non-technical\",\"summary\":\"printer offline\"}"
        }"#;
        let event = parse_server_event(raw).unwrap();
        let instruction = RouteInstruction::from_event(&event).unwrap();
        assert_eq!(instruction.category, Competence::NonTechnical);
        assert_eq!(instruction.summary, "printer offline");
    }

    #[test]
    fn other_tool_completions_are_ignored() {
        let raw = r#"{
            "type": "response.function_call_arguments.done",
            "name": "lookup_weather",
            "arguments": "{}"
        }"#;
        let event = parse_server_event(raw).unwrap();
        assert!(RouteInstruction::from_event(&event).is_none());
    }

    #[test]
    fn unknown_event_kinds_are_unhandled() {
        let event = parse_server_event(r#"{"type":"response.audio.delta","delta":"xxxx"}"#).unwrap();
        assert!(matches!(event, ServerEvent::Unhandled));
        assert!(RouteInstruction::from_event(&event).is_none());
    }

    #[test]
    fn non_json_payloads_are_dropped() {
        assert!(parse_server_event("not json at all").is_none());
        assert!(parse_server_event("").is_none());
    }

    #[test]
    fn malformed_arguments_default_to_non_technical() {
        let instruction = RouteInstruction::from_tool_arguments("{broken");
        assert_eq!(instruction.category, Competence::NonTechnical);
        assert_eq!(instruction.summary, "");

        let instruction = RouteInstruction::from_tool_arguments("{}");
        assert_eq!(instruction.category, Competence::NonTechnical);
    }

    #[test]
    fn unexpected_category_values_default_to_non_technical() {
        let instruction =
            RouteInstruction::from_tool_arguments(r#"{"category":"wizard","summary":"s"}"#);
        assert_eq!(instruction.category, Competence::NonTechnical);
    }

    #[test]
    fn directives_have_fixed_wire_forms() {
        assert_eq!(
            ClientDirective::ClearInputBuffer.to_json(),
            r#"{"type":"input_audio_buffer.clear"}"#
        );
        assert_eq!(ClientDirective::CreateResponse.to_json(), r#"{"type":"response.create"}"#);

        let disable: serde_json::Value =
            serde_json::from_str(&ClientDirective::DisableTurnDetection.to_json()).unwrap();
        assert!(disable["session"]["turn_detection"].is_null());

        let enable: serde_json::Value =
            serde_json::from_str(&ClientDirective::EnableServerVad.to_json()).unwrap();
        assert_eq!(enable["session"]["turn_detection"]["type"], "server_vad");
    }
}
