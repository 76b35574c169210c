//! Short-lived credential negotiation.
//!
//! A bootstrap endpoint mints an ephemeral realtime credential. Depending on
//! how it is deployed it answers with the raw OpenAI session object, a wrapped
//! variant of it, or an HTML page with the key embedded in a script.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use zeroize::Zeroizing;

use crate::core::realtime::base::{RealtimeError, RealtimeResult};

/// Credential assignments recognised in non-JSON bodies, tried in order.
static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"EPHEMERAL_KEY\s*=\s*["']([^"']+)["']"#,
        r#"clientSecret\s*=\s*["']([^"']+)["']"#,
        r#"client_secret["']?\s*:\s*["']([^"']+)["']"#,
        r#"client_secret["']?\s*=\s*["']([^"']+)["']"#,
    ]
    .iter()
    .map(|pattern| {
        Regex::new(pattern).unwrap_or_else(|err| panic!("invalid secret regex {pattern:?}: {err}"))
    })
    .collect()
});

/// Fetch a credential from `bootstrap_url`.
pub async fn negotiate_credential(
    client: &reqwest::Client,
    bootstrap_url: &str,
) -> RealtimeResult<Zeroizing<String>> {
    let response = client
        .get(bootstrap_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| RealtimeError::ConnectionFailed(format!("bootstrap request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RealtimeError::ConnectionFailed(format!(
            "bootstrap endpoint returned {status}"
        )));
    }

    let body = Zeroizing::new(
        response
            .text()
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(format!("bootstrap body: {e}")))?,
    );

    match extract_client_secret(&body) {
        Some(secret) => {
            tracing::debug!("Negotiated realtime credential");
            Ok(Zeroizing::new(secret))
        }
        None => {
            tracing::error!(body_len = body.len(), "No client secret in bootstrap response");
            Err(RealtimeError::AuthenticationFailed(
                "could not find client_secret in bootstrap response".to_string(),
            ))
        }
    }
}

/// Pull the credential out of a bootstrap response body.
///
/// A body that parses as JSON is never searched with the text patterns.
pub fn extract_client_secret(body: &str) -> Option<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => from_json(&json),
        Err(_) => SECRET_PATTERNS.iter().find_map(|pattern| {
            pattern
                .captures(body)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        }),
    }
}

fn from_json(json: &Value) -> Option<String> {
    if let Some(items) = json.as_array() {
        return items
            .first()
            .and_then(|first| first.pointer("/client_secret/value"))
            .and_then(non_empty_str);
    }

    if let Some(secret) = json.get("client_secret") {
        if let Some(value) = non_empty_str(secret) {
            return Some(value);
        }
        if let Some(value) = secret.get("value").and_then(non_empty_str) {
            return Some(value);
        }
    }

    json.get("clientSecret")
        .and_then(non_empty_str)
        .or_else(|| json.pointer("/data/client_secret").and_then(non_empty_str))
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
