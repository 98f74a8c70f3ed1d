//! Alerts
//!
//! Gate and registry code never talks to a sink directly. They hand an
//! [`Alert`] to the [`AlertDispatcher`], which enqueues it on a bounded
//! channel; the [`AlertWorker`] drains the channel in the background and
//! calls the configured [`AlertSink`]. A full or closed queue drops the
//! alert with a warning, so sink latency and failure never reach a request.

mod sinks;
mod worker;

pub use sinks::{LogAlertSink, WebhookAlertSink};
pub use worker::AlertWorker;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

/// Destination for operator alerts (mail, chat webhook, log)
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert; `false` means delivery failed
    async fn notify(&self, subject: &str, body: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    High,
}

impl Severity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub severity: Severity,
    pub subject: String,
    pub body: String,
}

impl Alert {
    pub fn new(severity: Severity, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            severity,
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn info(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Severity::Info, subject, body)
    }

    pub fn warning(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Severity::Warning, subject, body)
    }

    pub fn high(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(Severity::High, subject, body)
    }

    /// Subject line as delivered, prefixed with the severity for non-info alerts
    pub fn full_subject(&self) -> String {
        match self.severity {
            Severity::Info => self.subject.clone(),
            other => format!("[{}] {}", other.as_str().to_uppercase(), self.subject),
        }
    }
}

/// Non-blocking producer side of the alert queue
#[derive(Debug, Clone)]
pub struct AlertDispatcher {
    tx: mpsc::Sender<Alert>,
}

impl AlertDispatcher {
    /// Create the dispatcher and the receiver to hand to [`AlertWorker::run`]
    pub fn new(queue_size: usize) -> (Self, mpsc::Receiver<Alert>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting; returns whether the alert was queued
    pub fn dispatch(&self, alert: Alert) -> bool {
        match self.tx.try_send(alert) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(alert)) => {
                tracing::warn!(subject = %alert.subject, "Alert queue full, alert dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(alert)) => {
                tracing::warn!(subject = %alert.subject, "Alert worker stopped, alert dropped");
                false
            }
        }
    }
}
