//! Mutable per-session state owned by the orchestrator.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::realtime::ConnectionStatus;

/// What the conversation is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationPhase {
    #[default]
    Idle,
    Listening,
    Processing,
    Responding,
}

impl fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversationPhase::Idle => "idle",
            ConversationPhase::Listening => "listening",
            ConversationPhase::Processing => "processing",
            ConversationPhase::Responding => "responding",
        };
        f.write_str(name)
    }
}

/// Text accumulated for one speaker's in-progress utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accumulator {
    pub text: String,
    /// When the first fragment arrived, in ms since the Unix epoch
    pub started_at: Option<u64>,
}

impl Accumulator {
    /// Append a fragment, stamping the start time on the first one.
    pub fn push(&mut self, fragment: &str) {
        if self.started_at.is_none() {
            self.started_at = Some(now_ms());
        }
        self.text.push_str(fragment);
    }

    /// Start time, or now if nothing was accumulated.
    pub fn timestamp(&self) -> u64 {
        self.started_at.unwrap_or_else(now_ms)
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn take(&mut self) -> Accumulator {
        std::mem::take(self)
    }
}

/// Everything the event handler mutates between events.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub connection: ConnectionStatus,
    pub conversation: ConversationPhase,
    /// An availability lookup is outstanding
    pub tool_in_flight: bool,
    /// A resume was requested and its generation has not started yet
    pub awaiting_resume: bool,
    /// Most recently started generation
    pub response_id: Option<String>,
    /// A generation is between `response.created` and `response.done`
    pub response_active: bool,
    pub audio_muted: bool,
    pub microphone_enabled: bool,
    pub user: Accumulator,
    pub assistant: Accumulator,
    /// Bumped on every connect and disconnect
    pub epoch: u64,
}

impl SessionState {
    /// Return to the disconnected state, keeping only a fresh epoch.
    pub fn reset(&mut self, epoch: u64) {
        *self = SessionState {
            epoch,
            ..Default::default()
        };
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
