//! Configuration for the concierge.
//!
//! Configuration comes from .env files, YAML files and environment variables.
//! Priority: YAML > ENV vars > .env values > defaults. The .env file is loaded
//! into the process environment by `main` before anything here runs.
//!
//! # Example
//! ```rust,no_run
//! use waav_concierge::config::ConciergeConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ConciergeConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = ConciergeConfig::from_file(Path::new("concierge.yaml"))?;
//! println!("Lookups go to {}", config.availability_url);
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::core::availability::DEFAULT_LOOKUP_TIMEOUT;
use crate::core::conversation::{
    DEFAULT_INJECTION_DELAY, DEFAULT_TRIGGER_PHRASES, DetectionStrategy, InterruptDiscipline,
    OrchestratorConfig,
};
use crate::core::realtime::openai::{
    DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL, RealtimeSessionSettings, RealtimeVoice,
};

mod yaml;

pub use yaml::YamlConfig;

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("Failed to parse YAML config: {0}")]
    Yaml(String),
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Concierge configuration
#[derive(Debug, Clone)]
pub struct ConciergeConfig {
    /// Endpoint that hands out short-lived realtime credentials
    pub bootstrap_url: String,
    /// Endpoint the availability lookup POSTs to
    pub availability_url: String,
    pub availability_timeout: Duration,
    pub session: RealtimeSessionSettings,
    pub greeting: Option<String>,
    pub strategy: DetectionStrategy,
    pub trigger_phrases: Vec<String>,
    pub discipline: InterruptDiscipline,
    pub injection_delay: Duration,
}

impl ConciergeConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::merge(None)
    }

    /// Load configuration from a YAML file on top of the environment.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, a required URL
    /// is missing from both sources, or any value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = YamlConfig::from_file(path)?;
        Self::merge(Some(yaml))
    }

    /// Settings for one orchestrator built from this configuration.
    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            session: self.session.clone(),
            greeting: self.greeting.clone(),
            strategy: self.strategy,
            trigger_phrases: self.trigger_phrases.clone(),
            discipline: self.discipline,
            injection_delay: self.injection_delay,
        }
    }

    fn merge(yaml: Option<YamlConfig>) -> Result<Self, ConfigError> {
        let yaml = yaml.unwrap_or_default();
        let realtime = yaml.realtime.unwrap_or_default();
        let availability = yaml.availability.unwrap_or_default();
        let intent = yaml.intent.unwrap_or_default();
        let interrupt = yaml.interrupt.unwrap_or_default();

        let bootstrap_url = realtime
            .bootstrap_url
            .or_else(|| env_var("BOOTSTRAP_URL"))
            .ok_or(ConfigError::Missing("bootstrap_url"))?;
        validate_url("bootstrap_url", &bootstrap_url)?;

        let availability_url = availability
            .url
            .or_else(|| env_var("AVAILABILITY_URL"))
            .ok_or(ConfigError::Missing("availability_url"))?;
        validate_url("availability_url", &availability_url)?;

        let availability_timeout = match availability.timeout_ms {
            Some(ms) => Duration::from_millis(ms),
            None => env_millis("AVAILABILITY_TIMEOUT_MS", "availability_timeout_ms")?
                .unwrap_or(DEFAULT_LOOKUP_TIMEOUT),
        };
        if availability_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "availability_timeout_ms",
                "must be greater than zero".to_string(),
            ));
        }

        let voice = match realtime.voice.or_else(|| env_var("REALTIME_VOICE")) {
            Some(raw) => RealtimeVoice::parse(&raw)
                .ok_or_else(|| ConfigError::Invalid("voice", format!("unknown voice '{raw}'")))?,
            None => RealtimeVoice::default(),
        };

        let session = RealtimeSessionSettings {
            model: realtime
                .model
                .or_else(|| env_var("REALTIME_MODEL"))
                .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
            voice,
            instructions: realtime
                .instructions
                .or_else(|| env_var("REALTIME_INSTRUCTIONS")),
            transcription_model: realtime
                .transcription_model
                .or_else(|| env_var("TRANSCRIPTION_MODEL"))
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
        };

        let strategy = match intent.strategy.or_else(|| env_var("INTENT_STRATEGY")) {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::Invalid("strategy", e))?,
            None => DetectionStrategy::default(),
        };

        let trigger_phrases = intent
            .trigger_phrases
            .or_else(|| env_var("TRIGGER_PHRASES").map(|raw| split_list(&raw)))
            .unwrap_or_else(|| DEFAULT_TRIGGER_PHRASES.iter().map(|p| p.to_string()).collect());
        if strategy != DetectionStrategy::Command
            && trigger_phrases.iter().all(|p| p.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "trigger_phrases",
                format!("at least one phrase is required for the {strategy:?} strategy"),
            ));
        }

        let discipline = match interrupt.discipline.or_else(|| env_var("INTERRUPT_DISCIPLINE")) {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::Invalid("discipline", e))?,
            None => InterruptDiscipline::default(),
        };

        let injection_delay = match interrupt.injection_delay_ms {
            Some(ms) => Duration::from_millis(ms),
            None => env_millis("INJECTION_DELAY_MS", "injection_delay_ms")?
                .unwrap_or(DEFAULT_INJECTION_DELAY),
        };

        Ok(Self {
            bootstrap_url,
            availability_url,
            availability_timeout,
            session,
            greeting: realtime.greeting.or_else(|| env_var("REALTIME_GREETING")),
            strategy,
            trigger_phrases,
            discipline,
            injection_delay,
        })
    }
}

/// Non-empty environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_millis(name: &str, field: &'static str) -> Result<Option<Duration>, ConfigError> {
    env_var(name)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigError::Invalid(field, format!("'{raw}': {e}")))
        })
        .transpose()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// URLs must parse and use http or https.
fn validate_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let parsed =
        url::Url::parse(value).map_err(|e| ConfigError::Invalid(field, format!("'{value}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(
            field,
            format!("unsupported scheme '{other}'"),
        )),
    }
}
