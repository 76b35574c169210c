//! OpenAI Realtime API WebSocket message types.
//!
//! Only the subset of the protocol the concierge speaks is modelled. Every
//! server frame the session does not act on deserializes to
//! [`ServerEvent::Other`] instead of failing.
//!
//! Client events (sent to server):
//! - session.update
//! - input_audio_buffer.append (server VAD commits the buffer)
//! - conversation.item.create
//! - response.create / response.cancel
//! - output_audio_buffer.clear
//!
//! Server events (received from server):
//! - input_audio_buffer.speech_started / speech_stopped
//! - conversation.item.input_audio_transcription.{delta,completed,failed}
//! - response.created / response.done
//! - response.audio_transcript.{delta,done} (and the text modality equivalents)
//! - response.audio.{delta,done}
//! - error

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration sent with `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// "pcm16", "g711_ulaw", "g711_alaw"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    #[serde(rename = "server_vad")]
    ServerVad {
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        create_response: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        interrupt_response: Option<bool>,
    },

    #[serde(rename = "none")]
    None,
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item (message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// "message", "function_call", "function_call_output"
    #[serde(rename = "type")]
    pub item_type: String,

    /// "user", "assistant", "system"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
}

impl ConversationItem {
    /// A user message carrying a single `input_text` part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            id: None,
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: Some(vec![ContentPart {
                content_type: "input_text".to_string(),
                text: Some(text.into()),
            }]),
        }
    }
}

/// Content part of a conversation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    /// "input_text", "input_audio", "text", "audio"
    #[serde(rename = "type")]
    pub content_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// =============================================================================
// Response Configuration
// =============================================================================

/// Per-response overrides for `response.create`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Base64-encoded PCM16 chunk
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        item: ConversationItem,
    },

    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },

    #[serde(rename = "response.cancel")]
    ResponseCancel,

    /// Drop model audio the server has buffered but not yet streamed.
    /// Only media-channel sessions buffer output server-side.
    #[serde(rename = "output_audio_buffer.clear")]
    OutputAudioBufferClear,
}

impl ClientEvent {
    /// Create an audio append event from raw PCM bytes.
    pub fn audio_append(audio_data: &[u8]) -> Self {
        Self::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(audio_data),
        }
    }

    /// Add a user text message at the end of the conversation.
    pub fn user_text(text: &str) -> Self {
        Self::ConversationItemCreate {
            previous_item_id: None,
            item: ConversationItem::user_text(text),
        }
    }

    /// Request a generation, optionally steering it with inline instructions.
    pub fn response_create(instructions: Option<String>) -> Self {
        Self::ResponseCreate {
            response: instructions.map(|instructions| ResponseConfig {
                modalities: Some(vec!["text".to_string(), "audio".to_string()]),
                instructions: Some(instructions),
            }),
        }
    }

    /// Wire name of the event, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate { .. } => "response.create",
            Self::ResponseCancel => "response.cancel",
            Self::OutputAudioBufferClear => "output_audio_buffer.clear",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
///
/// Fields the session can live without are optional so a sparse frame still
/// parses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error { error: ApiError },

    /// Server VAD detected the start of user speech
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Partial transcription of the user's speech
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    TranscriptionDelta {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    TranscriptionFailed {
        #[serde(default)]
        item_id: Option<String>,
        #[serde(default)]
        error: Option<ApiError>,
    },

    #[serde(rename = "response.created")]
    ResponseCreated { response: Response },

    #[serde(rename = "response.done")]
    ResponseDone { response: Response },

    /// Incremental assistant transcript (audio or text modality)
    #[serde(
        rename = "response.audio_transcript.delta",
        alias = "response.output_audio_transcript.delta",
        alias = "response.text.delta",
        alias = "response.output_text.delta"
    )]
    TranscriptDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        delta: String,
    },

    #[serde(
        rename = "response.audio_transcript.done",
        alias = "response.output_audio_transcript.done",
        alias = "response.text.done",
        alias = "response.output_text.done"
    )]
    TranscriptDone {
        #[serde(default)]
        response_id: Option<String>,
        /// `text` on the text modality
        #[serde(default, alias = "text")]
        transcript: Option<String>,
    },

    /// Base64-encoded audio chunk
    #[serde(rename = "response.audio.delta", alias = "response.output_audio.delta")]
    AudioDelta {
        #[serde(default)]
        response_id: Option<String>,
        #[serde(default)]
        delta: String,
    },

    #[serde(rename = "response.audio.done", alias = "response.output_audio.done")]
    AudioDone {
        #[serde(default)]
        response_id: Option<String>,
    },

    /// Any event type the session does not act on
    #[serde(other)]
    Other,
}

impl ServerEvent {
    /// Decode base64 audio delta to bytes.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

/// API error details.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,

    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub message: String,
}

/// Response information.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<String>,

    /// "in_progress", "completed", "cancelled", "failed", "incomplete"
    #[serde(default)]
    pub status: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_client_event_serialization() {
        let json = serde_json::to_string(&ClientEvent::OutputAudioBufferClear).unwrap();
        assert_eq!(json, r#"{"type":"output_audio_buffer.clear"}"#);

        let json = serde_json::to_string(&ClientEvent::ResponseCancel).unwrap();
        assert_eq!(json, r#"{"type":"response.cancel"}"#);
    }

    #[test]
    fn test_audio_append() {
        let data = vec![0u8, 1, 2, 3];
        match ClientEvent::audio_append(&data) {
            ClientEvent::InputAudioBufferAppend { audio } => {
                let decoded = BASE64_STANDARD.decode(&audio).unwrap();
                assert_eq!(decoded, data);
            }
            other => panic!("Wrong event type: {other:?}"),
        }
    }

    #[test]
    fn test_user_text_item_shape() {
        let value = serde_json::to_value(ClientEvent::user_text("hello")).unwrap();
        assert_eq!(value["type"], "conversation.item.create");
        assert_eq!(value["item"]["type"], "message");
        assert_eq!(value["item"]["role"], "user");
        assert_eq!(value["item"]["content"][0]["type"], "input_text");
        assert_eq!(value["item"]["content"][0]["text"], "hello");
        assert!(value.get("previous_item_id").is_none());
    }

    #[test]
    fn test_response_create_with_and_without_instructions() {
        let bare = serde_json::to_value(ClientEvent::response_create(None)).unwrap();
        assert_eq!(bare, serde_json::json!({"type": "response.create"}));

        let steered =
            serde_json::to_value(ClientEvent::response_create(Some("Greet".to_string()))).unwrap();
        assert_eq!(steered["response"]["instructions"], "Greet");
        assert_eq!(
            steered["response"]["modalities"],
            Value::from(vec!["text", "audio"])
        );
    }

    #[test]
    fn test_server_error_deserialization() {
        let json = r#"{
            "type": "error",
            "error": {"type": "invalid_request_error", "message": "Test error"}
        }"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::Error { error } => {
                assert_eq!(error.message, "Test error");
                assert_eq!(error.error_type.as_deref(), Some("invalid_request_error"));
            }
            other => panic!("Wrong event type: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_event_is_other() {
        let json = r#"{"type": "rate_limits.updated", "rate_limits": []}"#;
        assert_eq!(
            serde_json::from_str::<ServerEvent>(json).unwrap(),
            ServerEvent::Other
        );
    }

    #[test]
    fn test_text_modality_aliases() {
        let delta: ServerEvent =
            serde_json::from_str(r#"{"type":"response.text.delta","response_id":"r1","delta":"hi"}"#)
                .unwrap();
        assert_eq!(
            delta,
            ServerEvent::TranscriptDelta {
                response_id: Some("r1".to_string()),
                delta: "hi".to_string(),
            }
        );

        let done: ServerEvent =
            serde_json::from_str(r#"{"type":"response.text.done","text":"hi there"}"#).unwrap();
        assert_eq!(
            done,
            ServerEvent::TranscriptDone {
                response_id: None,
                transcript: Some("hi there".to_string()),
            }
        );
    }

    #[test]
    fn test_sparse_response_created() {
        let json = r#"{"type":"response.created","response":{"id":"resp_1"}}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::ResponseCreated { response } => {
                assert_eq!(response.id.as_deref(), Some("resp_1"));
                assert!(response.status.is_none());
            }
            other => panic!("Wrong event type: {other:?}"),
        }
    }

    #[test]
    fn test_audio_delta_decode() {
        let original = vec![0u8, 1, 2, 3, 4, 5];
        let encoded = BASE64_STANDARD.encode(&original);
        let decoded = ServerEvent::decode_audio_delta(&encoded).unwrap();
        assert_eq!(decoded, original);
    }
}
