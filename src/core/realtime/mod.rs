//! Realtime speech-to-speech transport.
//!
//! The conversation core depends only on the traits in `base`; `openai`
//! provides the WebSocket implementation used in production.

mod base;
pub mod openai;

pub use base::{
    AudioSink, ConnectionStatus, EventSink, RealtimeAudioData, RealtimeChannel, RealtimeError,
    RealtimeResult, SessionEvent, Transport,
};
pub use openai::{ClientEvent, OpenAIRealtimeTransport, RealtimeSessionSettings, ServerEvent};
