//! Availability lookup tool.
//!
//! The single external tool the concierge can call. A lookup takes a time of
//! day and yields an [`AvailabilityOutcome`]; both success and failure are
//! rendered into a result token that is fed back to the model.

mod client;
mod normalize;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::core::conversation::TimeOfDay;

pub use client::{DEFAULT_LOOKUP_TIMEOUT, HttpAvailabilityClient};
pub use normalize::normalize_response;

/// Name the tool is known by on the wire and in result tokens.
pub const TOOL_NAME: &str = "check_availability";

/// Errors surfaced by the lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Request never produced a response (DNS, connect, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status
    #[error("Lookup returned HTTP {0}")]
    Status(u16),

    /// Body was not a usable availability payload
    #[error("Invalid lookup response: {0}")]
    InvalidResponse(String),
}

/// Normalized lookup answer.
///
/// `unavailable` keeps the upstream polarity: `true` means the slot is taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityResult {
    pub unavailable: bool,
    /// Canonical time the answer applies to, as reported upstream
    pub time: String,
    pub message: Option<String>,
}

/// What one lookup produced.
pub type AvailabilityOutcome = Result<AvailabilityResult, ToolError>;

#[derive(Serialize)]
struct ResultToken<'a> {
    tool: &'a str,
    time: &'a str,
    unavailable: bool,
    message: Option<&'a str>,
}

#[derive(Serialize)]
struct ErrorToken<'a> {
    tool: &'a str,
    time: &'a str,
    error: String,
}

impl AvailabilityResult {
    /// `[tool_result] {...}` message injected on success.
    pub fn to_token(&self) -> String {
        let body = ResultToken {
            tool: TOOL_NAME,
            time: &self.time,
            unavailable: self.unavailable,
            message: self.message.as_deref(),
        };
        format!(
            "[tool_result] {}",
            serde_json::to_string(&body).unwrap_or_default()
        )
    }
}

/// `[tool_error] {...}` message injected when the lookup failed.
pub fn error_token(time: TimeOfDay, error: &ToolError) -> String {
    let time = time.to_string();
    let body = ErrorToken {
        tool: TOOL_NAME,
        time: &time,
        error: error.to_string(),
    };
    format!(
        "[tool_error] {}",
        serde_json::to_string(&body).unwrap_or_default()
    )
}

/// Render whichever token an outcome calls for.
pub fn outcome_token(time: TimeOfDay, outcome: &AvailabilityOutcome) -> String {
    match outcome {
        Ok(result) => result.to_token(),
        Err(e) => error_token(time, e),
    }
}

/// Performs availability lookups.
#[async_trait]
pub trait AvailabilityLookup: Send + Sync {
    async fn check(&self, time: TimeOfDay) -> AvailabilityOutcome;
}
