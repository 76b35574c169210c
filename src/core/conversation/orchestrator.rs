//! Conversation orchestrator.
//!
//! Owns all session state and routes every inbound event, one at a time, to
//! the transcript, the intent detector and the interrupt controller. Transport
//! frames, channel closure and lookup completions all arrive through one
//! queue, so nothing here needs a lock.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut orchestrator = ConversationOrchestrator::new(config, transport, lookup);
//! orchestrator.on_message(Arc::new(|turn| Box::pin(async move {
//!     println!("[{}] {}", turn.role, turn.content);
//! })));
//! orchestrator.connect().await?;
//! while orchestrator.process_next().await {}
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use super::intent::{DEFAULT_TRIGGER_PHRASES, Detection, DetectionStrategy, Intent, IntentDetector, IntentSource};
use super::interrupt::{InterruptController, InterruptDiscipline, ToolPhase};
use super::session::{ConversationPhase, SessionState, now_ms};
use super::time_expr::TimeOfDay;
use super::transcript::{PENDING_ASSISTANT_ID, PENDING_USER_ID, Role, Transcript, Turn};
use crate::core::availability::{AvailabilityLookup, AvailabilityOutcome, outcome_token};
use crate::core::realtime::openai::messages::{ApiError, Response};
use crate::core::realtime::openai::{OPENAI_REALTIME_SAMPLE_RATE, RealtimeSessionSettings};
use crate::core::realtime::{
    AudioSink, ClientEvent, ConnectionStatus, EventSink, RealtimeAudioData, RealtimeChannel,
    RealtimeError, RealtimeResult, ServerEvent, SessionEvent, Transport,
};

/// Default pause between clearing buffered audio and injecting a result.
pub const DEFAULT_INJECTION_DELAY: Duration = Duration::from_millis(150);

/// Invoked once per finalized turn.
pub type MessageCallback =
    Arc<dyn Fn(Turn) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Invoked on connection failures and provider errors.
pub type ErrorCallback =
    Arc<dyn Fn(RealtimeError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Behaviour knobs for one orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub session: RealtimeSessionSettings,
    /// Scripted opening line, sent as inline instructions on connect
    pub greeting: Option<String>,
    pub strategy: DetectionStrategy,
    pub trigger_phrases: Vec<String>,
    pub discipline: InterruptDiscipline,
    /// Minimum time between dispatching a lookup and injecting its result
    pub injection_delay: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            session: RealtimeSessionSettings::default(),
            greeting: None,
            strategy: DetectionStrategy::default(),
            trigger_phrases: DEFAULT_TRIGGER_PHRASES.iter().map(|p| p.to_string()).collect(),
            discipline: InterruptDiscipline::default(),
            injection_delay: DEFAULT_INJECTION_DELAY,
        }
    }
}

/// Drives one realtime conversation.
pub struct ConversationOrchestrator {
    config: OrchestratorConfig,
    transport: Arc<dyn Transport>,
    lookup: Arc<dyn AvailabilityLookup>,
    detector: IntentDetector,
    controller: InterruptController,
    state: SessionState,
    transcript: Transcript,
    channel: Option<Arc<dyn RealtimeChannel>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    audio_sink: Option<Arc<dyn AudioSink>>,
    message_callback: Option<MessageCallback>,
    error_callback: Option<ErrorCallback>,
}

impl ConversationOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        transport: Arc<dyn Transport>,
        lookup: Arc<dyn AvailabilityLookup>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            detector: IntentDetector::new(config.strategy, config.trigger_phrases.clone()),
            controller: InterruptController::new(config.discipline),
            config,
            transport,
            lookup,
            state: SessionState::default(),
            transcript: Transcript::new(),
            channel: None,
            events_tx,
            events_rx,
            audio_sink: None,
            message_callback: None,
            error_callback: None,
        }
    }

    /// Route model audio to `sink`.
    pub fn with_audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.audio_sink = Some(sink);
        self
    }

    pub fn on_message(&mut self, callback: MessageCallback) {
        self.message_callback = Some(callback);
    }

    pub fn on_error(&mut self, callback: ErrorCallback) {
        self.error_callback = Some(callback);
    }

    // =========================================================================
    // Observers
    // =========================================================================

    pub fn connection_status(&self) -> ConnectionStatus {
        self.state.connection
    }

    pub fn conversation_phase(&self) -> ConversationPhase {
        self.state.conversation
    }

    /// Live transcript: finalized turns plus any pending turns.
    pub fn messages(&self) -> &[Turn] {
        self.transcript.turns()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn tool_phase(&self) -> ToolPhase {
        self.controller.phase()
    }

    pub fn is_tool_in_flight(&self) -> bool {
        self.state.tool_in_flight
    }

    pub fn is_awaiting_resume(&self) -> bool {
        self.state.awaiting_resume
    }

    pub fn is_audio_muted(&self) -> bool {
        self.state.audio_muted
    }

    pub fn is_listening(&self) -> bool {
        self.state.microphone_enabled
    }

    pub fn current_response_id(&self) -> Option<&str> {
        self.state.response_id.as_deref()
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Open a realtime session and configure it.
    pub async fn connect(&mut self) -> RealtimeResult<()> {
        if matches!(
            self.state.connection,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        ) {
            return Ok(());
        }

        let epoch = self.state.epoch + 1;
        self.state.reset(epoch);
        self.controller.reset();
        self.state.connection = ConnectionStatus::Connecting;
        info!(epoch, "Connecting realtime session");

        let sink = EventSink::new(epoch, self.events_tx.clone());
        let channel = match self.transport.open(sink).await {
            Ok(channel) => channel,
            Err(e) => return Err(self.fail_connect(e).await),
        };

        self.channel = Some(channel.clone());
        self.state.connection = ConnectionStatus::Connected;
        self.state.conversation = ConversationPhase::Idle;

        let session = ClientEvent::SessionUpdate {
            session: self.config.session.to_session_config(),
        };
        if let Err(e) = channel.send(session).await {
            channel.close().await;
            self.channel = None;
            return Err(self.fail_connect(e).await);
        }

        if let Some(greeting) = self.config.greeting.clone()
            && let Err(e) = channel.create_response(Some(greeting)).await
        {
            warn!(error = %e, "Failed to request greeting");
        }

        self.state.microphone_enabled = true;
        self.state.conversation = ConversationPhase::Listening;
        info!("Realtime session ready");
        Ok(())
    }

    /// Tear everything down. Safe to call in any state, repeatedly.
    pub async fn disconnect(&mut self) {
        let was = self.state.connection;
        let epoch = self.state.epoch + 1;

        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        if let Some(sink) = &self.audio_sink {
            sink.clear();
        }

        self.state.reset(epoch);
        self.controller.reset();
        self.transcript.clear();

        if was != ConnectionStatus::Disconnected {
            info!("Realtime session disconnected");
        }
    }

    /// Resume forwarding microphone audio.
    pub fn start_listening(&mut self) {
        if self.state.connection != ConnectionStatus::Connected {
            debug!("start_listening ignored while {}", self.state.connection);
            return;
        }
        self.state.microphone_enabled = true;
        if self.state.conversation == ConversationPhase::Idle {
            self.state.conversation = ConversationPhase::Listening;
        }
    }

    /// Stop forwarding microphone audio; the session stays up.
    pub fn stop_listening(&mut self) {
        self.state.microphone_enabled = false;
    }

    /// Forward a PCM16 microphone chunk while listening.
    pub async fn send_audio(&self, pcm: &[u8]) -> RealtimeResult<()> {
        if !self.state.microphone_enabled {
            return Ok(());
        }
        let channel = self.open_channel().ok_or(RealtimeError::NotConnected)?;
        channel.send(ClientEvent::audio_append(pcm)).await
    }

    /// Record a typed user message and forward it to the model.
    ///
    /// The local turn stays even if forwarding fails.
    pub async fn send_message(&mut self, text: &str) {
        let content = text.trim();
        if content.is_empty() {
            return;
        }

        let turn = Turn::with_prefix("text", Role::User, content, now_ms());
        self.transcript.push(turn.clone());
        self.emit_message(turn).await;

        let Some(channel) = self.open_channel() else {
            debug!("Channel not open; message kept locally");
            return;
        };
        if let Err(e) = channel.send_user_text(content).await {
            warn!(error = %e, "Failed to forward text message");
            return;
        }
        match channel.create_response(None).await {
            Ok(()) => self.state.conversation = ConversationPhase::Processing,
            Err(e) => warn!(error = %e, "Failed to request response for text message"),
        }
    }

    /// Empty the transcript, including pending turns.
    pub fn clear_messages(&mut self) {
        self.transcript.clear();
        self.state.user.take();
        self.state.assistant.take();
    }

    // =========================================================================
    // Event loop
    // =========================================================================

    /// Wait for the next queued event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Wait for and handle one event. Returns `false` if the queue is closed.
    pub async fn process_next(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        if event.epoch() != self.state.epoch {
            debug!(
                event_epoch = event.epoch(),
                epoch = self.state.epoch,
                "Dropping event from a closed session"
            );
            return;
        }

        match event {
            SessionEvent::Transport { payload, .. } => {
                self.handle_transport_payload(&payload).await
            }
            SessionEvent::ChannelClosed { reason, .. } => self.handle_channel_closed(reason).await,
            SessionEvent::ToolCompleted { time, outcome, .. } => {
                self.handle_tool_completed(time, outcome).await
            }
        }
    }

    /// Parse and route one raw frame. Malformed frames are logged and dropped.
    pub async fn handle_transport_payload(&mut self, payload: &str) {
        match serde_json::from_str::<ServerEvent>(payload) {
            Ok(event) => self.handle_server_event(event).await,
            Err(e) => warn!(error = %e, len = payload.len(), "Dropping malformed realtime event"),
        }
    }

    pub async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Error { error } => self.on_provider_error(error).await,
            ServerEvent::SpeechStarted { .. } => self.on_speech_started().await,
            ServerEvent::SpeechStopped { .. } => trace!("Speech stopped"),
            ServerEvent::TranscriptionDelta { delta, .. } => self.on_user_delta(&delta),
            ServerEvent::TranscriptionCompleted { transcript, .. } => {
                self.on_user_completed(transcript).await
            }
            ServerEvent::TranscriptionFailed { error, .. } => self.on_user_failed(error),
            ServerEvent::ResponseCreated { response } => self.on_response_created(response).await,
            ServerEvent::ResponseDone { response } => self.on_response_done(response).await,
            ServerEvent::TranscriptDelta { response_id, delta } => {
                self.on_assistant_delta(response_id, &delta).await
            }
            ServerEvent::TranscriptDone {
                response_id,
                transcript,
            } => self.on_assistant_done(response_id, transcript).await,
            ServerEvent::AudioDelta { response_id, delta } => self.on_audio_delta(response_id, &delta),
            ServerEvent::AudioDone { .. } => trace!("Audio done"),
            ServerEvent::Other => trace!("Ignoring unhandled realtime event"),
        }
    }

    // =========================================================================
    // Lifecycle events
    // =========================================================================

    async fn handle_channel_closed(&mut self, reason: Option<String>) {
        warn!(reason = ?reason, "Realtime channel closed unexpectedly");

        self.channel = None;
        // Anything still queued for this connection is now stale.
        self.state.epoch += 1;
        self.state.connection = ConnectionStatus::Error;
        self.state.conversation = ConversationPhase::Idle;
        self.state.microphone_enabled = false;
        self.state.tool_in_flight = false;
        self.state.awaiting_resume = false;
        self.state.audio_muted = false;
        self.state.response_active = false;
        self.controller.abandon();

        let detail = reason.unwrap_or_else(|| "channel closed".to_string());
        self.emit_error(RealtimeError::ConnectionFailed(detail)).await;
    }

    async fn on_provider_error(&mut self, error: ApiError) {
        if is_routine_rejection(&error) {
            debug!(code = ?error.code, message = %error.message, "Ignoring rejected interrupt");
            return;
        }
        warn!(code = ?error.code, message = %error.message, "Realtime provider error");
        self.emit_error(RealtimeError::ProviderError(error.message)).await;
    }

    async fn on_response_created(&mut self, response: Response) {
        let id = response.id;
        self.state.response_active = true;

        match self.controller.phase() {
            ToolPhase::AwaitingResume => {
                if self.controller.confirm_resume(id.as_deref()) {
                    self.state.awaiting_resume = false;
                    self.state.audio_muted = false;
                    info!(response_id = ?id, "Resumed generation confirmed");
                }
            }
            ToolPhase::Triggered | ToolPhase::Running | ToolPhase::ResultInjected => {
                // Unsolicited generation while the lookup runs; keep it silent.
                if let Some(id) = &id {
                    self.controller.mark_cancelled(id.clone());
                }
                if let Some(channel) = self.open_channel()
                    && let Err(e) = channel.cancel_response().await
                {
                    warn!(error = %e, "Failed to cancel unsolicited response");
                }
                debug!(response_id = ?id, "Cancelled generation started during lookup");
            }
            ToolPhase::Normal => {
                self.state.awaiting_resume = false;
                self.state.audio_muted = false;
            }
        }

        self.state.response_id = id;
    }

    async fn on_response_done(&mut self, response: Response) {
        let id = response.id;
        if id.is_none() || id == self.state.response_id {
            self.state.response_active = false;
        }
        if self.controller.finish_response(id.as_deref()) {
            return;
        }

        // Interrupted generations end without a transcript.done.
        if !self.state.assistant.is_empty() {
            self.on_assistant_done(id, None).await;
        }
        if self.state.conversation == ConversationPhase::Responding {
            self.state.conversation = ConversationPhase::Listening;
        }
    }

    async fn on_speech_started(&mut self) {
        if self.controller.tool_in_flight() {
            debug!("Ignoring barge-in while a lookup runs");
            return;
        }

        if self.controller.phase() == ToolPhase::AwaitingResume {
            // The caller spoke before the resumed generation began. Audio
            // stays muted until the next generation starts.
            self.controller.abandon();
            self.state.awaiting_resume = false;
        }

        if self.state.response_active || !self.state.assistant.is_empty() {
            info!(response_id = ?self.state.response_id, "Barge-in: interrupting response");
            if let Some(id) = self.state.response_id.clone() {
                self.controller.mark_cancelled(id);
            }
            self.interrupt_output().await;
            self.state.response_active = false;

            let text = self.state.assistant.text.clone();
            if self.detector.detect(&text, true) == Detection::PossibleCommand {
                self.state.assistant.take();
                self.transcript.discard_pending(Role::Assistant);
            } else {
                self.finalize_assistant().await;
            }
        }

        self.state.conversation = ConversationPhase::Listening;
    }

    // =========================================================================
    // User speech
    // =========================================================================

    fn on_user_delta(&mut self, delta: &str) {
        self.state.user.push(delta);
        let user = &self.state.user;
        self.transcript
            .upsert_pending(Role::User, &user.text, user.timestamp(), None);
    }

    async fn on_user_completed(&mut self, transcript: String) {
        let acc = self.state.user.take();
        let text = if transcript.trim().is_empty() {
            acc.text.as_str()
        } else {
            transcript.as_str()
        };
        let content = text.trim();

        if content.is_empty() {
            self.transcript.discard_pending(Role::User);
        } else {
            let turn = Turn::finalized(Role::User, content, acc.timestamp());
            self.transcript
                .finalize_pending(Role::User, turn.clone(), Some(PENDING_ASSISTANT_ID));
            self.emit_message(turn).await;
        }
        self.state.conversation = ConversationPhase::Processing;
    }

    fn on_user_failed(&mut self, error: Option<ApiError>) {
        warn!(
            message = error.as_ref().map(|e| e.message.as_str()).unwrap_or(""),
            "Input transcription failed"
        );
        self.state.user.take();
        self.transcript.discard_pending(Role::User);
    }

    // =========================================================================
    // Assistant speech
    // =========================================================================

    async fn on_assistant_delta(&mut self, response_id: Option<String>, delta: &str) {
        if self.controller.is_stale(response_id.as_deref()) {
            return;
        }

        if !self.controller.can_trigger() {
            // Only the not-yet-cut triggering utterance keeps streaming.
            if self.controller.tool_in_flight() && !self.controller.is_cut_off() {
                self.state.assistant.push(delta);
                self.show_tool_utterance();
                if let Some(at) = self.controller.cut_point(&self.state.assistant.text, false) {
                    self.cut_off(at).await;
                }
            }
            return;
        }

        self.state.assistant.push(delta);
        self.state.conversation = ConversationPhase::Responding;

        let text = self.state.assistant.text.clone();
        match self.detector.detect(&text, false) {
            Detection::Matched(intent) => self.start_tool(intent, response_id, false).await,
            Detection::PossibleCommand => {
                self.transcript.discard_pending(Role::Assistant);
            }
            Detection::Nothing => self.show_assistant_pending(),
        }
    }

    async fn on_assistant_done(&mut self, response_id: Option<String>, transcript: Option<String>) {
        if self.controller.is_stale(response_id.as_deref()) {
            return;
        }

        if !self.controller.can_trigger() {
            if self.controller.tool_in_flight() && !self.controller.is_cut_off() {
                if let Some(full) = transcript.filter(|t| !t.trim().is_empty()) {
                    self.state.assistant.text = full;
                }
                let text_len = self.state.assistant.text.len();
                let at = self
                    .controller
                    .cut_point(&self.state.assistant.text, true)
                    .unwrap_or(text_len);
                self.cut_off(at).await;
            }
            return;
        }

        if let Some(full) = transcript.filter(|t| !t.trim().is_empty()) {
            self.state.assistant.text = full;
        }
        let text = self.state.assistant.text.clone();

        if text.trim().is_empty() {
            self.state.assistant.take();
            self.transcript.discard_pending(Role::Assistant);
        } else {
            match self.detector.detect(&text, true) {
                Detection::Matched(intent) => {
                    self.start_tool(intent, response_id, true).await;
                    return;
                }
                Detection::PossibleCommand => {
                    debug!("Discarding unparseable tool command");
                    self.state.assistant.take();
                    self.transcript.discard_pending(Role::Assistant);
                }
                Detection::Nothing => self.finalize_assistant().await,
            }
        }
        self.state.conversation = ConversationPhase::Listening;
    }

    fn on_audio_delta(&self, response_id: Option<String>, delta: &str) {
        if self.state.audio_muted
            || self.controller.phase() == ToolPhase::AwaitingResume
            || self.controller.is_stale(response_id.as_deref())
        {
            return;
        }
        let Some(sink) = &self.audio_sink else {
            return;
        };
        match ServerEvent::decode_audio_delta(delta) {
            Ok(pcm) => sink.play(RealtimeAudioData {
                data: Bytes::from(pcm),
                sample_rate: OPENAI_REALTIME_SAMPLE_RATE,
                response_id,
            }),
            Err(e) => warn!(error = %e, "Dropping undecodable audio delta"),
        }
    }

    fn show_assistant_pending(&mut self) {
        let assistant = &self.state.assistant;
        self.transcript.upsert_pending(
            Role::Assistant,
            &assistant.text,
            assistant.timestamp(),
            Some(PENDING_USER_ID),
        );
    }

    fn show_tool_utterance(&mut self) {
        if self.controller.intent().map(|i| i.source) == Some(IntentSource::TriggerPhrase) {
            self.show_assistant_pending();
        }
    }

    async fn finalize_assistant(&mut self) {
        let acc = self.state.assistant.take();
        let content = acc.text.trim();
        if content.is_empty() {
            self.transcript.discard_pending(Role::Assistant);
            return;
        }
        let turn = Turn::finalized(Role::Assistant, content, acc.timestamp());
        self.transcript
            .finalize_pending(Role::Assistant, turn.clone(), None);
        self.emit_message(turn).await;
    }

    // =========================================================================
    // Tool flow
    // =========================================================================

    async fn start_tool(&mut self, intent: Intent, response_id: Option<String>, complete: bool) {
        let trigger_id = response_id.or_else(|| self.state.response_id.clone());
        if !self.controller.trigger(intent, trigger_id) {
            return;
        }
        info!(time = %intent.time, source = ?intent.source, "Availability intent detected");

        self.state.tool_in_flight = true;
        self.state.conversation = ConversationPhase::Processing;
        match intent.source {
            IntentSource::TriggerPhrase => self.show_assistant_pending(),
            IntentSource::StructuredCommand => {
                self.transcript.discard_pending(Role::Assistant);
            }
        }

        self.dispatch_lookup(intent.time);
        self.controller.dispatched();

        if let Some(at) = self.controller.cut_point(&self.state.assistant.text, complete) {
            self.cut_off(at).await;
        }
    }

    fn dispatch_lookup(&self, time: TimeOfDay) {
        let lookup = self.lookup.clone();
        let sink = EventSink::new(self.state.epoch, self.events_tx.clone());
        let delay = self.config.injection_delay;

        debug!(time = %time, "Dispatching availability lookup");
        tokio::spawn(async move {
            let (outcome, ()) = tokio::join!(lookup.check(time), tokio::time::sleep(delay));
            sink.tool_completed(time, outcome);
        });
    }

    /// Stop the triggering generation and settle its visible text.
    async fn cut_off(&mut self, at: usize) {
        self.interrupt_output().await;
        self.state.audio_muted = true;
        self.state.response_active = false;
        self.controller.mark_cut_off();

        let acc = self.state.assistant.take();
        let spoken = acc.text.get(..at).unwrap_or(&acc.text).trim();
        let source = self.controller.intent().map(|i| i.source);
        debug!(at, "Cut off triggering utterance");

        if source == Some(IntentSource::TriggerPhrase) && !spoken.is_empty() {
            let turn = Turn::finalized(Role::Assistant, spoken, acc.timestamp());
            self.transcript
                .finalize_pending(Role::Assistant, turn.clone(), None);
            self.emit_message(turn).await;
        } else {
            self.transcript.discard_pending(Role::Assistant);
        }
    }

    async fn handle_tool_completed(&mut self, time: TimeOfDay, outcome: AvailabilityOutcome) {
        if self.controller.phase() != ToolPhase::Running {
            warn!(time = %time, "Ignoring lookup result with no flow waiting for it");
            return;
        }

        if !self.controller.is_cut_off() {
            let text_len = self.state.assistant.text.len();
            let at = self
                .controller
                .cut_point(&self.state.assistant.text, true)
                .unwrap_or(text_len);
            self.cut_off(at).await;
        }

        match &outcome {
            Ok(result) => info!(
                time = %time,
                unavailable = result.unavailable,
                "Availability lookup finished"
            ),
            Err(e) => warn!(time = %time, error = %e, "Availability lookup failed"),
        }

        let token = outcome_token(time, &outcome);
        self.controller.result_injected();
        self.state.tool_in_flight = false;

        if let Err(e) = self.inject_and_resume(&token).await {
            warn!(error = %e, "Could not inject lookup result");
            self.controller.abandon();
            self.state.audio_muted = false;
            self.state.conversation = ConversationPhase::Listening;
            return;
        }

        self.controller.resume_requested();
        self.state.awaiting_resume = true;
        self.state.conversation = ConversationPhase::Listening;
    }

    async fn inject_and_resume(&self, token: &str) -> RealtimeResult<()> {
        let channel = self.open_channel().ok_or(RealtimeError::NotConnected)?;
        channel.send_user_text(token).await?;
        channel.create_response(None).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn open_channel(&self) -> Option<Arc<dyn RealtimeChannel>> {
        self.channel.as_ref().filter(|c| c.is_open()).cloned()
    }

    /// Cancel the active generation and drop buffered audio on both ends.
    async fn interrupt_output(&mut self) {
        if let Some(channel) = self.open_channel() {
            if self.state.response_active
                && let Err(e) = channel.cancel_response().await
            {
                warn!(error = %e, "Failed to cancel response");
            }
            if let Err(e) = channel.clear_output_audio().await {
                warn!(error = %e, "Failed to clear output audio");
            }
        }
        if let Some(sink) = &self.audio_sink {
            sink.clear();
        }
    }

    async fn fail_connect(&mut self, error: RealtimeError) -> RealtimeError {
        tracing::error!(error = %error, "Realtime connection failed");
        self.state.connection = ConnectionStatus::Error;
        self.state.conversation = ConversationPhase::Idle;
        self.emit_error(error.clone()).await;
        error
    }

    async fn emit_message(&self, turn: Turn) {
        if let Some(callback) = self.message_callback.clone() {
            callback(turn).await;
        }
    }

    async fn emit_error(&self, error: RealtimeError) {
        if let Some(callback) = self.error_callback.clone() {
            callback(error).await;
        }
    }
}

/// Rejections of the interrupt events themselves: a cancel that arrived after
/// the generation ended, or a buffer clear on a transport without one.
fn is_routine_rejection(error: &ApiError) -> bool {
    error.code.as_deref() == Some("response_cancel_not_active")
        || error.message.contains("output_audio_buffer")
}
