use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::anyhow;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use waav_concierge::{
    AudioSink, ConciergeConfig, ConversationOrchestrator, HttpAvailabilityClient,
    OpenAIRealtimeTransport, RealtimeAudioData, RealtimeError, Turn,
};

/// WaaV Concierge - realtime voice concierge with availability lookups
#[derive(Parser, Debug)]
#[command(name = "waav-concierge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Counts model audio instead of playing it.
#[derive(Default)]
struct LoggingAudioSink {
    chunks: AtomicUsize,
}

impl AudioSink for LoggingAudioSink {
    fn play(&self, audio: RealtimeAudioData) {
        let n = self.chunks.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            bytes = audio.data.len(),
            sample_rate = audio.sample_rate,
            chunks = n,
            "Model audio"
        );
    }

    fn clear(&self) {
        debug!("Playback buffer cleared");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Must happen before any TLS connection is attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        ConciergeConfig::from_file(&config_path)?
    } else {
        ConciergeConfig::from_env()?
    };

    let transport = Arc::new(OpenAIRealtimeTransport::new(
        config.bootstrap_url.clone(),
        config.session.clone(),
    ));
    let lookup = Arc::new(
        HttpAvailabilityClient::new(config.availability_url.clone())
            .with_timeout(config.availability_timeout),
    );

    let mut orchestrator =
        ConversationOrchestrator::new(config.to_orchestrator_config(), transport, lookup)
            .with_audio_sink(Arc::new(LoggingAudioSink::default()));

    orchestrator.on_message(Arc::new(|turn: Turn| {
        Box::pin(async move {
            println!("[{}] {}", turn.role, turn.content);
        }) as Pin<Box<dyn std::future::Future<Output = ()> + Send>>
    }));
    orchestrator.on_error(Arc::new(|error: RealtimeError| {
        Box::pin(async move {
            eprintln!("error: {error}");
        }) as Pin<Box<dyn std::future::Future<Output = ()> + Send>>
    }));

    orchestrator.connect().await?;
    println!("Connected. Type a message, or /listen, /mute, /clear, /quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "/quit" => break,
                    "/clear" => orchestrator.clear_messages(),
                    "/mute" => orchestrator.stop_listening(),
                    "/listen" => orchestrator.start_listening(),
                    "" => {}
                    text => orchestrator.send_message(text).await,
                }
            }
            event = orchestrator.next_event() => {
                let Some(event) = event else {
                    warn!("Event queue closed");
                    break;
                };
                orchestrator.handle_event(event).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    orchestrator.disconnect().await;
    Ok(())
}
