//! In-process stand-ins for the realtime transport, the availability lookup
//! and the playback device.
//!
//! The mock transport hands every opened session a [`MockChannel`] that
//! records outbound client events, and keeps the session's [`EventSink`] so a
//! test can push raw server frames exactly as the WebSocket reader would.

// Not every test file uses every helper
#![allow(dead_code)]

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::timeout;

use waav_concierge::core::availability::{AvailabilityLookup, AvailabilityOutcome};
use waav_concierge::core::conversation::{ConversationOrchestrator, OrchestratorConfig, Turn};
use waav_concierge::core::realtime::openai::messages::ConversationItem;
use waav_concierge::core::realtime::{
    AudioSink, ClientEvent, EventSink, RealtimeAudioData, RealtimeChannel, RealtimeError,
    RealtimeResult, Transport,
};
use waav_concierge::{AvailabilityResult, TimeOfDay};

// =============================================================================
// Transport
// =============================================================================

/// Records outbound events instead of writing them to a socket.
#[derive(Default)]
pub struct MockChannel {
    sent: Mutex<Vec<ClientEvent>>,
    closed: AtomicBool,
    fail_sends: AtomicBool,
}

impl MockChannel {
    pub fn sent(&self) -> Vec<ClientEvent> {
        self.sent.lock().clone()
    }

    /// Wire names of everything sent so far.
    pub fn sent_kinds(&self) -> Vec<&'static str> {
        self.sent.lock().iter().map(ClientEvent::kind).collect()
    }

    /// Text of every `conversation.item.create` sent so far.
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|event| match event {
                ClientEvent::ConversationItemCreate { item, .. } => user_text(item),
                _ => None,
            })
            .collect()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn user_text(item: &ConversationItem) -> Option<String> {
    item.content
        .as_ref()?
        .iter()
        .find_map(|part| part.text.clone())
}

#[async_trait]
impl RealtimeChannel for MockChannel {
    async fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        if self.is_closed() {
            return Err(RealtimeError::NotConnected);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(RealtimeError::WebSocketError("send failed".to_string()));
        }
        self.sent.lock().push(event);
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.is_closed()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct TransportState {
    sessions: Vec<(EventSink, Arc<MockChannel>)>,
    fail_next: Option<RealtimeError>,
}

/// Opens [`MockChannel`]s and lets the test play the server side.
#[derive(Default, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` fail with `error`.
    pub fn fail_next_open(&self, error: RealtimeError) {
        self.state.lock().fail_next = Some(error);
    }

    pub fn opened(&self) -> usize {
        self.state.lock().sessions.len()
    }

    /// Channel of the most recently opened session.
    pub fn channel(&self) -> Arc<MockChannel> {
        self.state
            .lock()
            .sessions
            .last()
            .map(|(_, channel)| channel.clone())
            .expect("no session opened")
    }

    fn sink(&self) -> EventSink {
        self.state
            .lock()
            .sessions
            .last()
            .map(|(sink, _)| sink.clone())
            .expect("no session opened")
    }

    /// Deliver one server frame to the most recent session.
    pub fn emit(&self, event: Value) {
        self.sink().transport(event.to_string());
    }

    /// Deliver a raw, possibly malformed, frame.
    pub fn emit_raw(&self, payload: &str) {
        self.sink().transport(payload);
    }

    /// Simulate the server dropping the connection.
    pub fn drop_connection(&self, reason: &str) {
        self.sink().closed(Some(reason.to_string()));
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, sink: EventSink) -> RealtimeResult<Arc<dyn RealtimeChannel>> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }
        let channel = Arc::new(MockChannel::default());
        state.sessions.push((sink, channel.clone()));
        Ok(channel)
    }
}

// =============================================================================
// Availability lookup
// =============================================================================

/// Returns a fixed outcome, optionally holding it until released.
pub struct ScriptedLookup {
    outcome: AvailabilityOutcome,
    gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<TimeOfDay>>,
}

impl ScriptedLookup {
    pub fn new(outcome: AvailabilityOutcome) -> Self {
        Self {
            outcome,
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Lookup that answers "available" immediately.
    pub fn available() -> Self {
        Self::new(Ok(AvailabilityResult {
            unavailable: false,
            time: String::new(),
            message: None,
        }))
    }

    /// Hold every answer until the returned handle is notified.
    pub fn gated(outcome: AvailabilityOutcome) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let mut lookup = Self::new(outcome);
        lookup.gate = Some(gate.clone());
        (lookup, gate)
    }

    pub fn calls(&self) -> Vec<TimeOfDay> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AvailabilityLookup for ScriptedLookup {
    async fn check(&self, time: TimeOfDay) -> AvailabilityOutcome {
        self.calls.lock().push(time);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.outcome {
            Ok(result) if result.time.is_empty() => Ok(AvailabilityResult {
                time: time.to_string(),
                ..result.clone()
            }),
            other => other.clone(),
        }
    }
}

// =============================================================================
// Playback
// =============================================================================

/// Counts what would have been played.
#[derive(Default)]
pub struct RecordingAudioSink {
    played: Mutex<Vec<RealtimeAudioData>>,
    clears: AtomicUsize,
}

impl RecordingAudioSink {
    pub fn played(&self) -> Vec<RealtimeAudioData> {
        self.played.lock().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

impl AudioSink for RecordingAudioSink {
    fn play(&self, audio: RealtimeAudioData) {
        self.played.lock().push(audio);
    }

    fn clear(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Harness
// =============================================================================

/// An orchestrator wired to mocks, with every emitted turn and error captured.
pub struct Harness {
    pub orchestrator: ConversationOrchestrator,
    pub transport: MockTransport,
    pub lookup: Arc<ScriptedLookup>,
    pub audio: Arc<RecordingAudioSink>,
    pub emitted: Arc<Mutex<Vec<Turn>>>,
    pub errors: Arc<Mutex<Vec<RealtimeError>>>,
}

impl Harness {
    pub fn new(config: OrchestratorConfig, lookup: ScriptedLookup) -> Self {
        let transport = MockTransport::new();
        let lookup = Arc::new(lookup);
        let audio = Arc::new(RecordingAudioSink::default());
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(Mutex::new(Vec::new()));

        let mut orchestrator =
            ConversationOrchestrator::new(config, Arc::new(transport.clone()), lookup.clone())
                .with_audio_sink(audio.clone());

        let sink = emitted.clone();
        orchestrator.on_message(Arc::new(move |turn: Turn| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().push(turn);
            }) as Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        }));
        let sink = errors.clone();
        orchestrator.on_error(Arc::new(move |error: RealtimeError| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().push(error);
            }) as Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        }));

        Self {
            orchestrator,
            transport,
            lookup,
            audio,
            emitted,
            errors,
        }
    }

    /// Default orchestrator settings with no injection delay.
    pub fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            injection_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    pub async fn connected(config: OrchestratorConfig, lookup: ScriptedLookup) -> Self {
        let mut harness = Self::new(config, lookup);
        harness
            .orchestrator
            .connect()
            .await
            .expect("mock connect should succeed");
        harness.transport.channel().clear_sent();
        harness
    }

    /// Emit a server frame and handle everything queued.
    pub async fn server(&mut self, event: Value) {
        self.transport.emit(event);
        self.drain().await;
    }

    /// Handle queued events until the queue stays empty for a moment.
    pub async fn drain(&mut self) {
        while let Ok(true) = timeout(Duration::from_millis(25), self.orchestrator.process_next()).await {}
    }

    /// Wait for the next event, e.g. a lookup completion. Returns `false` on timeout.
    pub async fn next(&mut self) -> bool {
        matches!(
            timeout(Duration::from_secs(2), self.orchestrator.process_next()).await,
            Ok(true)
        )
    }

    /// Content of every finalized turn, in transcript order.
    pub fn finalized(&self) -> Vec<String> {
        self.orchestrator
            .transcript()
            .finalized()
            .map(|turn| turn.content.clone())
            .collect()
    }

    pub fn emitted(&self) -> Vec<String> {
        self.emitted
            .lock()
            .iter()
            .map(|turn| turn.content.clone())
            .collect()
    }
}

// =============================================================================
// Server frames
// =============================================================================

pub mod frames {
    use serde_json::{Value, json};

    pub fn response_created(id: &str) -> Value {
        json!({ "type": "response.created", "response": { "id": id, "status": "in_progress" } })
    }

    pub fn response_done(id: &str) -> Value {
        json!({ "type": "response.done", "response": { "id": id, "status": "completed" } })
    }

    pub fn transcript_delta(id: &str, delta: &str) -> Value {
        json!({ "type": "response.audio_transcript.delta", "response_id": id, "delta": delta })
    }

    pub fn transcript_done(id: &str, transcript: &str) -> Value {
        json!({ "type": "response.audio_transcript.done", "response_id": id, "transcript": transcript })
    }

    pub fn audio_delta(id: &str, base64: &str) -> Value {
        json!({ "type": "response.audio.delta", "response_id": id, "delta": base64 })
    }

    pub fn speech_started() -> Value {
        json!({ "type": "input_audio_buffer.speech_started", "item_id": "item_user" })
    }

    pub fn user_delta(delta: &str) -> Value {
        json!({ "type": "conversation.item.input_audio_transcription.delta", "item_id": "item_user", "delta": delta })
    }

    pub fn user_completed(transcript: &str) -> Value {
        json!({ "type": "conversation.item.input_audio_transcription.completed", "item_id": "item_user", "transcript": transcript })
    }

    pub fn error(code: &str, message: &str) -> Value {
        json!({ "type": "error", "error": { "type": "invalid_request_error", "code": code, "message": message } })
    }
}
