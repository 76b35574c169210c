use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional; environment variables fill whatever is missing.
///
/// # Example YAML structure
/// ```yaml
/// realtime:
///   bootstrap_url: "https://concierge.example.com/session"
///   model: "gpt-4o-realtime-preview-2024-12-17"
///   voice: "alloy"
///   instructions: "You are a restaurant concierge."
///   greeting: "Welcome! How can I help you today?"
///   transcription_model: "whisper-1"
///
/// availability:
///   url: "https://concierge.example.com/availability"
///   timeout_ms: 10000
///
/// intent:
///   strategy: "phrase"
///   trigger_phrases: ["查一下", "let me check"]
///
/// interrupt:
///   discipline: "deferred"
///   injection_delay_ms: 150
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub realtime: Option<RealtimeYaml>,
    pub availability: Option<AvailabilityYaml>,
    pub intent: Option<IntentYaml>,
    pub interrupt: Option<InterruptYaml>,
}

/// Realtime session settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub bootstrap_url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub greeting: Option<String>,
    pub transcription_model: Option<String>,
}

/// Availability lookup settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AvailabilityYaml {
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Intent detection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct IntentYaml {
    pub strategy: Option<String>,
    pub trigger_phrases: Option<Vec<String>>,
}

/// Interrupt settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InterruptYaml {
    pub discipline: Option<String>,
    pub injection_delay_ms: Option<u64>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Yaml(e.to_string()))
    }
}
