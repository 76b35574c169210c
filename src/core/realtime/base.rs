//! Base traits and types for the realtime transport boundary.
//!
//! The conversation core never talks to a socket directly. It sees two seams:
//!
//! - [`Transport`] opens a session and hands back a [`RealtimeChannel`] for
//!   outbound events. Inbound traffic is pushed into the session's event queue
//!   through the [`EventSink`] it was given.
//! - [`AudioSink`] receives decoded model audio and buffer-clear requests.
//!
//! # Audio Format
//!
//! Model audio is PCM 16-bit signed little-endian at 24kHz.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use super::openai::messages::ClientEvent;
use crate::core::availability::AvailabilityOutcome;
use crate::core::conversation::TimeOfDay;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur on the realtime transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// No usable credential could be negotiated
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Provider-reported error
    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Session Events
// =============================================================================

/// Everything the conversation event loop consumes.
///
/// Transport frames and tool completions share one queue so that every state
/// mutation is serialized. `epoch` identifies the connection the event belongs
/// to; events from a torn-down connection are discarded.
#[derive(Debug)]
pub enum SessionEvent {
    /// Raw JSON text frame from the realtime channel
    Transport { epoch: u64, payload: String },
    /// The channel closed without being asked to
    ChannelClosed { epoch: u64, reason: Option<String> },
    /// The availability lookup finished (successfully or not)
    ToolCompleted {
        epoch: u64,
        time: TimeOfDay,
        outcome: AvailabilityOutcome,
    },
}

impl SessionEvent {
    /// Connection epoch this event was produced under.
    pub fn epoch(&self) -> u64 {
        match self {
            SessionEvent::Transport { epoch, .. }
            | SessionEvent::ChannelClosed { epoch, .. }
            | SessionEvent::ToolCompleted { epoch, .. } => *epoch,
        }
    }
}

/// Handle a transport uses to deliver inbound traffic to the session.
#[derive(Debug, Clone)]
pub struct EventSink {
    epoch: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { epoch, tx }
    }

    /// Epoch of the connection this sink was created for.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Forward a raw inbound text frame.
    ///
    /// Returns `false` once the session has been dropped.
    pub fn transport(&self, payload: impl Into<String>) -> bool {
        self.tx
            .send(SessionEvent::Transport {
                epoch: self.epoch,
                payload: payload.into(),
            })
            .is_ok()
    }

    /// Report that the underlying channel went away.
    pub fn closed(&self, reason: Option<String>) {
        let _ = self.tx.send(SessionEvent::ChannelClosed {
            epoch: self.epoch,
            reason,
        });
    }

    pub(crate) fn tool_completed(&self, time: TimeOfDay, outcome: AvailabilityOutcome) {
        let _ = self.tx.send(SessionEvent::ToolCompleted {
            epoch: self.epoch,
            time,
            outcome,
        });
    }
}

// =============================================================================
// Channel and Transport Traits
// =============================================================================

/// Outbound half of an open realtime session.
#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    /// Queue a client event for delivery.
    async fn send(&self, event: ClientEvent) -> RealtimeResult<()>;

    /// Whether the channel still accepts events.
    fn is_open(&self) -> bool;

    /// Close the channel. Safe to call more than once.
    async fn close(&self);

    /// Ask the model to stop its current generation.
    async fn cancel_response(&self) -> RealtimeResult<()> {
        self.send(ClientEvent::ResponseCancel).await
    }

    /// Discard model audio that was produced but not yet played.
    ///
    /// Transports without a server-side output buffer override this.
    async fn clear_output_audio(&self) -> RealtimeResult<()> {
        self.send(ClientEvent::OutputAudioBufferClear).await
    }

    /// Add a user-side text message to the conversation.
    async fn send_user_text(&self, text: &str) -> RealtimeResult<()> {
        self.send(ClientEvent::user_text(text)).await
    }

    /// Request a new generation, optionally with inline instructions.
    async fn create_response(&self, instructions: Option<String>) -> RealtimeResult<()> {
        self.send(ClientEvent::response_create(instructions)).await
    }
}

/// Opens realtime sessions.
///
/// Implementations negotiate credentials and media, then forward every
/// inbound frame to `sink` until the channel closes.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, sink: EventSink) -> RealtimeResult<Arc<dyn RealtimeChannel>>;
}

// =============================================================================
// Audio Output
// =============================================================================

/// Audio data from the model.
#[derive(Debug, Clone)]
pub struct RealtimeAudioData {
    /// Raw audio bytes (PCM 16-bit, 24kHz, mono, little-endian)
    pub data: Bytes,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Generation that produced this chunk
    pub response_id: Option<String>,
}

/// Local playback device.
pub trait AudioSink: Send + Sync {
    /// Queue a chunk for playback.
    fn play(&self, audio: RealtimeAudioData);

    /// Drop everything queued but not yet played.
    fn clear(&self);
}

// =============================================================================
// Connection Phase
// =============================================================================

/// Connectivity phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "error"),
        }
    }
}
