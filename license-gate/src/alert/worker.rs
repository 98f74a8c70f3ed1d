//! Background consumer of the alert queue

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{Alert, AlertSink};

pub struct AlertWorker {
    sink: Arc<dyn AlertSink>,
}

impl AlertWorker {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self { sink }
    }

    /// Run until every dispatcher is dropped
    pub async fn run(self, mut rx: mpsc::Receiver<Alert>) {
        tracing::info!("Alert worker started");

        while let Some(alert) = rx.recv().await {
            let subject = alert.full_subject();
            if self.sink.notify(&subject, &alert.body).await {
                tracing::debug!(subject = %subject, "Alert delivered");
            } else {
                tracing::error!(
                    subject = %subject,
                    severity = alert.severity.as_str(),
                    "Alert delivery failed"
                );
            }
        }

        tracing::info!("Alert channel closed, worker stopping");
    }
}
