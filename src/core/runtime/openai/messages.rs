//! OpenAI Realtime API WebSocket message types.
//!
//! Only the events the gateway sends or reacts to are modelled; every other
//! server event deserializes to [`ServerEvent::Other`].

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::coordinator::ToolSchema;

// =============================================================================
// Session Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
}

/// Server-side voice activity detection.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename = "server_vad")]
pub struct TurnDetection {
    pub threshold: f32,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
    pub create_response: bool,
    pub interrupt_response: bool,
}

impl Default for TurnDetection {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
            create_response: true,
            interrupt_response: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&ToolSchema> for ToolDef {
    fn from(schema: &ToolSchema) -> Self {
        Self {
            tool_type: "function",
            name: schema.name.to_string(),
            description: schema.description.to_string(),
            parameters: schema.parameters.clone(),
        }
    }
}

// =============================================================================
// Conversation Items
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    /// Item carrying the result of a function call.
    pub fn function_call_output(call_id: &str, output: &str) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            call_id: Some(call_id.to_string()),
            output: Some(output.to_string()),
            ..Default::default()
        }
    }
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append base64 audio to the input buffer.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    #[serde(rename = "session.created")]
    SessionCreated { session: Session },

    /// Server VAD heard the user start speaking.
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: u64,
        #[serde(default)]
        item_id: String,
    },

    /// Tracks function names; the arguments event omits them.
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded { item: ConversationItem },

    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        call_id: String,
        arguments: String,
        #[serde(default)]
        name: Option<String>,
    },

    /// Base64-encoded audio chunk.
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        response_id: String,
        delta: String,
    },

    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: Option<ResponseInfo>,
    },

    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseInfo {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_call_output_shape() {
        let event = ClientEvent::ConversationItemCreate {
            item: ConversationItem::function_call_output("call_1", "Backups run nightly."),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "conversation.item.create");
        assert_eq!(json["item"]["type"], "function_call_output");
        assert_eq!(json["item"]["call_id"], "call_1");
        assert_eq!(json["item"]["output"], "Backups run nightly.");
        assert!(json["item"].get("name").is_none());
    }

    #[test]
    fn test_response_create_shape() {
        let json = serde_json::to_string(&ClientEvent::ResponseCreate).unwrap();
        assert_eq!(json, r#"{"type":"response.create"}"#);
    }

    #[test]
    fn test_session_update_tools() {
        let session = SessionConfig {
            modalities: None,
            instructions: None,
            voice: Some("alloy".into()),
            input_audio_format: None,
            output_audio_format: None,
            turn_detection: Some(TurnDetection::default()),
            tools: crate::core::coordinator::tool_schemas()
                .iter()
                .map(ToolDef::from)
                .collect(),
            tool_choice: Some("auto".into()),
        };
        let json = serde_json::to_value(ClientEvent::SessionUpdate { session }).unwrap();
        assert_eq!(json["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(json["session"]["tools"][0]["type"], "function");
        assert_eq!(json["session"]["tools"][0]["name"], "query_knowledge_base");
    }

    #[test]
    fn test_server_events_parse() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"response.audio.delta","response_id":"r1","item_id":"i1","output_index":0,"content_index":0,"delta":"AAA="}"#,
        )
        .unwrap();
        assert!(matches!(event, ServerEvent::AudioDelta { .. }));

        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"response.function_call_arguments.done","call_id":"c1","arguments":"{}","item_id":"i","output_index":0,"response_id":"r"}"#,
        )
        .unwrap();
        assert!(matches!(event, ServerEvent::FunctionCallArgumentsDone { .. }));

        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert!(matches!(event, ServerEvent::Other));
    }
}
