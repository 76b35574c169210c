//! HTTP availability lookup.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use super::normalize::normalize_response;
use super::{AvailabilityLookup, AvailabilityOutcome, TOOL_NAME, ToolError};
use crate::core::conversation::TimeOfDay;

/// Default request timeout.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs `{"action":"check_availability","time":"HH:MM"}` to a fixed URL.
///
/// No retries; a failed lookup is reported once and the model decides what
/// to do next.
#[derive(Debug, Clone)]
pub struct HttpAvailabilityClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpAvailabilityClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AvailabilityLookup for HttpAvailabilityClient {
    async fn check(&self, time: TimeOfDay) -> AvailabilityOutcome {
        debug!(url = %self.url, time = %time, "Availability lookup");

        let payload = json!({ "action": TOOL_NAME, "time": time.to_string() });

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %self.url, error = %e, "Availability request failed");
                ToolError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, status = %status, "Availability lookup returned non-success status");
            return Err(ToolError::Status(status.as_u16()));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ToolError::InvalidResponse(e.to_string()))?;

        normalize_response(&body, time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let client = HttpAvailabilityClient::new("https://hooks.example.com/availability")
            .with_timeout(Duration::from_millis(250));
        assert_eq!(client.url(), "https://hooks.example.com/availability");
        assert_eq!(client.timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = HttpAvailabilityClient::new("http://127.0.0.1:9/availability")
            .with_timeout(Duration::from_millis(500));
        let outcome = client.check(TimeOfDay::new(10, 0).unwrap()).await;
        assert!(matches!(outcome, Err(ToolError::Network(_))));
    }
}
