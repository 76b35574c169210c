//! OpenAI Realtime WebSocket transport.
//!
//! [`OpenAIRealtimeTransport::open`] negotiates an ephemeral credential,
//! opens the socket and spawns one task that owns both halves of it. Outbound
//! [`ClientEvent`]s arrive over an `mpsc` channel; inbound text frames are
//! handed to the session's [`EventSink`] untouched so that parsing happens on
//! the conversation event loop.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use zeroize::Zeroizing;

use super::config::RealtimeSessionSettings;
use super::messages::ClientEvent;
use super::negotiate::negotiate_credential;
use crate::core::realtime::base::{
    EventSink, RealtimeChannel, RealtimeError, RealtimeResult, Transport,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Transport
// =============================================================================

/// Opens OpenAI Realtime sessions over WebSocket.
pub struct OpenAIRealtimeTransport {
    http: reqwest::Client,
    bootstrap_url: String,
    settings: RealtimeSessionSettings,
}

impl OpenAIRealtimeTransport {
    pub fn new(bootstrap_url: impl Into<String>, settings: RealtimeSessionSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            bootstrap_url: bootstrap_url.into(),
            settings,
        }
    }

    fn build_request(
        &self,
        credential: &Zeroizing<String>,
    ) -> RealtimeResult<http::Request<()>> {
        let ws_url = self.settings.ws_url();
        let parsed = url::Url::parse(&ws_url)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("{ws_url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| RealtimeError::InvalidConfiguration(format!("{ws_url}: no host")))?;

        http::Request::builder()
            .uri(ws_url.as_str())
            .header("Authorization", format!("Bearer {}", credential.as_str()))
            .header("OpenAI-Beta", "realtime=v1")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", host)
            .body(())
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))
    }
}

#[async_trait]
impl Transport for OpenAIRealtimeTransport {
    async fn open(&self, sink: EventSink) -> RealtimeResult<Arc<dyn RealtimeChannel>> {
        let credential = negotiate_credential(&self.http, &self.bootstrap_url).await?;
        let request = self.build_request(&credential)?;

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        tracing::info!(model = %self.settings.model, "Connected to OpenAI Realtime API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        let open = Arc::new(AtomicBool::new(true));
        let task_open = open.clone();

        let handle = tokio::spawn(async move {
            let reason: Option<String> = loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        let Some(event) = outgoing else {
                            // Sender dropped: the session closed us on purpose.
                            let _ = ws_sink.send(Message::Close(None)).await;
                            task_open.store(false, Ordering::SeqCst);
                            return;
                        };

                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!("Failed to serialize {}: {}", event.kind(), e);
                                continue;
                            }
                        };

                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            tracing::error!("Failed to send WebSocket message: {}", e);
                            break Some(e.to_string());
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                if !sink.transport(text.as_str()) {
                                    // Session is gone; nobody is listening.
                                    task_open.store(false, Ordering::SeqCst);
                                    return;
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                tracing::info!("WebSocket closed by server");
                                break frame.map(|f| f.reason.as_str().to_string());
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::error!("WebSocket error: {}", e);
                                break Some(e.to_string());
                            }
                            None => break None,
                        }
                    }
                }
            };

            task_open.store(false, Ordering::SeqCst);
            sink.closed(reason);
        });

        Ok(Arc::new(OpenAIRealtimeChannel {
            sender: Mutex::new(Some(tx)),
            open,
            task: Mutex::new(Some(handle)),
        }))
    }
}

// =============================================================================
// Channel
// =============================================================================

/// Outbound handle for one OpenAI Realtime WebSocket.
pub struct OpenAIRealtimeChannel {
    sender: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    open: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl RealtimeChannel for OpenAIRealtimeChannel {
    async fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or(RealtimeError::NotConnected)?;

        let kind = event.kind();
        sender.send(event).await.map_err(|_| {
            tracing::warn!("Dropping {}: socket task has exited", kind);
            RealtimeError::NotConnected
        })
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && self.sender.lock().is_some()
    }

    /// WebSocket sessions stream audio as it is generated and have no
    /// server-side output buffer; `output_audio_buffer.clear` is rejected
    /// here. Playback is dropped locally through the audio sink instead.
    async fn clear_output_audio(&self) -> RealtimeResult<()> {
        if !self.is_open() {
            return Err(RealtimeError::NotConnected);
        }
        tracing::debug!("Output buffer is client-side on WebSocket sessions");
        Ok(())
    }

    async fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        // Dropping the sender lets the task send a close frame and exit.
        if self.sender.lock().take().is_some() {
            tracing::info!("Closing OpenAI Realtime channel");
        }
        self.task.lock().take();
    }
}

impl Drop for OpenAIRealtimeChannel {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
    }
}
