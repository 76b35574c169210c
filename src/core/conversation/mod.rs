//! Conversation logic: transcript reconciliation, intent detection, the
//! tool-flow interrupt state machine and the orchestrator that ties them to
//! a realtime channel.

pub mod intent;
pub mod interrupt;
pub mod orchestrator;
pub mod session;
pub mod time_expr;
pub mod transcript;

pub use intent::{
    DEFAULT_TRIGGER_PHRASES, Detection, DetectionStrategy, Intent, IntentDetector, IntentSource,
    looks_like_command,
};
pub use interrupt::{InterruptController, InterruptDiscipline, ToolPhase, sentence_end};
pub use orchestrator::{
    ConversationOrchestrator, DEFAULT_INJECTION_DELAY, ErrorCallback, MessageCallback,
    OrchestratorConfig,
};
pub use session::{Accumulator, ConversationPhase, SessionState, now_ms};
pub use time_expr::{TimeMatch, TimeOfDay, extract_time};
pub use transcript::{PENDING_ASSISTANT_ID, PENDING_USER_ID, Role, Transcript, Turn};
