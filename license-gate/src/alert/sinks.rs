//! Alert sink implementations

use async_trait::async_trait;
use serde_json::json;

use super::AlertSink;

/// Writes alerts to the tracing log; used when no webhook is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, subject: &str, body: &str) -> bool {
        tracing::warn!(target: "license_gate::alert", subject = %subject, body = %body, "ALERT");
        true
    }
}

/// POSTs `{"subject", "body"}` as JSON to a webhook URL
#[derive(Debug, Clone)]
pub struct WebhookAlertSink {
    url: String,
    client: reqwest::Client,
}

impl WebhookAlertSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn notify(&self, subject: &str, body: &str) -> bool {
        let resp = self
            .client
            .post(&self.url)
            .timeout(std::time::Duration::from_secs(10))
            .json(&json!({ "subject": subject, "body": body }))
            .send()
            .await;

        match resp {
            Ok(r) if r.status().is_success() => true,
            Ok(r) => {
                tracing::warn!(status = %r.status(), "Alert webhook rejected the alert");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Alert webhook unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sink_always_succeeds() {
        assert!(LogAlertSink.notify("subject", "body").await);
    }

    #[tokio::test]
    async fn test_webhook_failure_is_reported_not_raised() {
        // nothing listens on the discard port
        let sink = WebhookAlertSink::new("http://127.0.0.1:9/alerts");
        assert!(!sink.notify("subject", "body").await);
    }
}
