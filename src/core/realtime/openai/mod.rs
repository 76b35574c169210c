//! OpenAI Realtime API transport.
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse
//!
//! # Audio Format
//!
//! Input and output audio is PCM 16-bit signed little-endian at 24kHz.

mod client;
mod config;
pub mod messages;
mod negotiate;

pub use client::{OpenAIRealtimeChannel, OpenAIRealtimeTransport};
pub use config::{
    DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_SAMPLE_RATE,
    OPENAI_REALTIME_URL, RealtimeSessionSettings, RealtimeVoice,
};
pub use messages::{ClientEvent, ServerEvent};
pub use negotiate::{extract_client_secret, negotiate_credential};
