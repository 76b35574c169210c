//! OpenAI Realtime API configuration types.
//!
//! Model and voice selection plus the session defaults the concierge sends
//! right after the channel opens.

use serde::{Deserialize, Serialize};

use super::messages::{InputAudioTranscription, SessionConfig, TurnDetection};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default audio sample rate for OpenAI Realtime API.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// Default realtime model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-12-17";

/// Default input transcription model.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

// =============================================================================
// Voices
// =============================================================================

/// Available voices for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RealtimeVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl RealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse a voice name; `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "alloy" => Some(Self::Alloy),
            "ash" => Some(Self::Ash),
            "ballad" => Some(Self::Ballad),
            "coral" => Some(Self::Coral),
            "echo" => Some(Self::Echo),
            "sage" => Some(Self::Sage),
            "shimmer" => Some(Self::Shimmer),
            "verse" => Some(Self::Verse),
            _ => None,
        }
    }
}

impl std::fmt::Display for RealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Session Defaults
// =============================================================================

/// Settings applied to every session with `session.update`.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeSessionSettings {
    pub model: String,
    pub voice: RealtimeVoice,
    pub instructions: Option<String>,
    pub transcription_model: String,
}

impl Default for RealtimeSessionSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: RealtimeVoice::default(),
            instructions: None,
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
        }
    }
}

impl RealtimeSessionSettings {
    /// Build the `session.update` payload.
    ///
    /// Server VAD stays on so the remote side detects barge-in and produces
    /// user transcription events.
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: self.instructions.clone(),
            voice: Some(self.voice.as_str().to_string()),
            input_audio_format: Some("pcm16".to_string()),
            output_audio_format: Some("pcm16".to_string()),
            input_audio_transcription: Some(InputAudioTranscription {
                model: self.transcription_model.clone(),
            }),
            turn_detection: Some(TurnDetection::ServerVad {
                threshold: Some(0.5),
                prefix_padding_ms: Some(300),
                silence_duration_ms: Some(500),
                create_response: Some(true),
                interrupt_response: Some(true),
            }),
        }
    }

    /// WebSocket URL with the model query parameter.
    pub fn ws_url(&self) -> String {
        format!("{}?model={}", OPENAI_REALTIME_URL, self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_parse() {
        assert_eq!(RealtimeVoice::parse("SHIMMER"), Some(RealtimeVoice::Shimmer));
        assert_eq!(RealtimeVoice::parse(" coral "), Some(RealtimeVoice::Coral));
        assert_eq!(RealtimeVoice::parse("nova"), None);
    }

    #[test]
    fn test_ws_url_carries_model() {
        let settings = RealtimeSessionSettings::default();
        let url = settings.ws_url();
        assert!(url.starts_with("wss://api.openai.com/v1/realtime?model="));
        assert!(url.ends_with(DEFAULT_REALTIME_MODEL));
    }

    #[test]
    fn test_session_config_enables_transcription() {
        let settings = RealtimeSessionSettings {
            voice: RealtimeVoice::Verse,
            instructions: Some("Be brief.".to_string()),
            ..Default::default()
        };
        let session = settings.to_session_config();

        assert_eq!(session.voice.as_deref(), Some("verse"));
        assert_eq!(session.instructions.as_deref(), Some("Be brief."));
        assert_eq!(
            session.input_audio_transcription.map(|t| t.model),
            Some("whisper-1".to_string())
        );
        assert!(matches!(
            session.turn_detection,
            Some(TurnDetection::ServerVad { .. })
        ));
    }
}
