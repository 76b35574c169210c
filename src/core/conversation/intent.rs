//! Tool-intent detection in assistant speech.
//!
//! Two strategies, selectable per session:
//!
//! - **phrase**: the assistant is scripted to announce a lookup with a fixed
//!   preamble ("let me check") followed by a spoken time.
//! - **command**: the assistant emits an inline JSON fragment such as
//!   `{"action":"check_availability","time":"19:00"}`.
//!
//! Detection is pure; the caller decides whether to act on a match.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::time_expr::{TimeOfDay, extract_time};
use crate::core::availability::TOOL_NAME;

/// Default trigger phrases.
pub const DEFAULT_TRIGGER_PHRASES: &[&str] = &["查一下", "let me check"];

/// Which signatures count as a tool request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStrategy {
    #[default]
    Phrase,
    Command,
    Both,
}

impl DetectionStrategy {
    fn phrases(self) -> bool {
        matches!(self, Self::Phrase | Self::Both)
    }

    fn commands(self) -> bool {
        matches!(self, Self::Command | Self::Both)
    }
}

impl FromStr for DetectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "phrase" => Ok(Self::Phrase),
            "command" => Ok(Self::Command),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown intent strategy '{other}'")),
        }
    }
}

/// How an intent was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    TriggerPhrase,
    StructuredCommand,
}

/// A recognised availability request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intent {
    pub time: TimeOfDay,
    pub source: IntentSource,
    /// Byte offset just past the recognised expression
    pub span_end: usize,
}

/// Result of scanning one snapshot of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Matched(Intent),
    /// Looks like the start of a JSON command; keep it off screen
    PossibleCommand,
    Nothing,
}

/// Scans assistant text for tool requests.
#[derive(Debug, Clone)]
pub struct IntentDetector {
    strategy: DetectionStrategy,
    trigger_phrases: Vec<String>,
}

impl Default for IntentDetector {
    fn default() -> Self {
        Self::new(
            DetectionStrategy::default(),
            DEFAULT_TRIGGER_PHRASES.iter().map(|p| p.to_string()).collect(),
        )
    }
}

impl IntentDetector {
    pub fn new(strategy: DetectionStrategy, trigger_phrases: Vec<String>) -> Self {
        let trigger_phrases = trigger_phrases
            .into_iter()
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            strategy,
            trigger_phrases,
        }
    }

    pub fn strategy(&self) -> DetectionStrategy {
        self.strategy
    }

    /// Scan the cumulative text of the current utterance.
    ///
    /// `is_final` is set once the utterance is complete.
    pub fn detect(&self, text: &str, is_final: bool) -> Detection {
        if self.strategy.phrases()
            && let Some(intent) = self.detect_phrase(text, is_final)
        {
            return Detection::Matched(intent);
        }

        if self.strategy.commands() {
            if let Some(intent) = detect_command(text) {
                return Detection::Matched(intent);
            }
            if looks_like_command(text) {
                return Detection::PossibleCommand;
            }
        }

        Detection::Nothing
    }

    fn detect_phrase(&self, text: &str, is_final: bool) -> Option<Intent> {
        // ASCII folding keeps byte offsets aligned with `text`.
        let folded = text.to_ascii_lowercase();

        let mut anchors: Vec<usize> = self
            .trigger_phrases
            .iter()
            .flat_map(|phrase| {
                folded
                    .match_indices(phrase.as_str())
                    .map(move |(at, p)| at + p.len())
            })
            .collect();
        anchors.sort_unstable();
        anchors.dedup();

        anchors.into_iter().find_map(|after| {
            extract_time(&text[after..], is_final).map(|m| Intent {
                time: m.time,
                source: IntentSource::TriggerPhrase,
                span_end: after + m.end,
            })
        })
    }
}

/// Text that may be a partially streamed command.
pub fn looks_like_command(text: &str) -> bool {
    text.contains("\"action\"")
        || (text.contains('{') && text.contains("\"time\""))
        || text.contains(TOOL_NAME)
}

fn detect_command(text: &str) -> Option<Intent> {
    json_fragments(text).find_map(|(start, end)| {
        let fragment = &text[start..end];
        if !fragment.contains("action") {
            return None;
        }
        let value: Value = serde_json::from_str(fragment).ok()?;
        if value.get("action").and_then(Value::as_str) != Some(TOOL_NAME) {
            return None;
        }
        let raw = ["time", "params", "parameters", "arguments"]
            .iter()
            .find_map(|key| match value.get(*key) {
                Some(Value::String(s)) if *key == "time" => Some(s.clone()),
                Some(Value::Object(nested)) => nested
                    .get("time")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })?;
        let time = TimeOfDay::parse_hhmm(&raw).or_else(|| extract_time(&raw, true).map(|m| m.time))?;
        Some(Intent {
            time,
            source: IntentSource::StructuredCommand,
            span_end: end,
        })
    })
}

/// Balanced `{...}` spans, outermost first, ignoring braces inside strings.
fn json_fragments(text: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    let bytes = text.as_bytes();
    let mut cursor = 0;
    std::iter::from_fn(move || {
        while cursor < bytes.len() {
            let start = cursor + text[cursor..].find('{')?;
            let mut depth = 0usize;
            let mut in_string = false;
            let mut escaped = false;
            let mut close = None;

            for (offset, &b) in bytes[start..].iter().enumerate() {
                if in_string {
                    match b {
                        _ if escaped => escaped = false,
                        b'\\' => escaped = true,
                        b'"' => in_string = false,
                        _ => {}
                    }
                    continue;
                }
                match b {
                    b'"' => in_string = true,
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            close = Some(start + offset + 1);
                            break;
                        }
                    }
                    _ => {}
                }
            }

            match close {
                Some(end) => {
                    cursor = end;
                    return Some((start, end));
                }
                // Unterminated: try the next opening brace.
                None => cursor = start + 1,
            }
        }
        None
    })
}
