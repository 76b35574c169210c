pub mod availability;
pub mod conversation;
pub mod realtime;

// Re-export commonly used types for convenience
pub use availability::{
    AvailabilityLookup, AvailabilityOutcome, AvailabilityResult, HttpAvailabilityClient,
    TOOL_NAME, ToolError,
};

pub use conversation::{
    ConversationOrchestrator, ConversationPhase, DetectionStrategy, InterruptDiscipline,
    OrchestratorConfig, Role, TimeOfDay, ToolPhase, Transcript, Turn,
};

pub use realtime::{
    AudioSink, ConnectionStatus, EventSink, OpenAIRealtimeTransport, RealtimeAudioData,
    RealtimeChannel, RealtimeError, RealtimeResult, RealtimeSessionSettings, SessionEvent,
    Transport,
};
