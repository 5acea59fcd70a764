use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{AlertChannel, ChannelKind, MessageTransport};
use crate::alert::Alert;
use crate::error::ChannelError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub recipients: Vec<String>,
    pub subject_prefix: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            subject_prefix: "[Aegis]".to_string(),
        }
    }
}

/// Renders alerts as plain-text mail and hands them to a transport
pub struct EmailChannel {
    config: EmailConfig,
    transport: Arc<dyn MessageTransport>,
}

impl EmailChannel {
    pub fn new(config: EmailConfig, transport: Arc<dyn MessageTransport>) -> Self {
        Self { config, transport }
    }

    pub fn subject(&self, alert: &Alert) -> String {
        format!("{} {}: {}", self.config.subject_prefix, alert.priority, alert.title)
    }

    pub fn body(&self, alert: &Alert) -> String {
        let mut body = format!(
            "{}\n\nPriority: {}\nEvent: {}\nTime: {}\n",
            alert.message,
            alert.priority,
            alert.event_type,
            alert.timestamp.to_rfc3339()
        );
        for (key, value) in &alert.metadata {
            body.push_str(&format!("{}: {}\n", key, value));
        }
        body
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn handle(&self, alert: &Alert) -> Result<(), ChannelError> {
        if self.config.recipients.is_empty() {
            return Err(ChannelError::Delivery {
                channel: ChannelKind::Email,
                reason: "no recipients configured".to_string(),
            });
        }

        let subject = self.subject(alert);
        let body = self.body(alert);
        let mut failures = Vec::new();
        for recipient in &self.config.recipients {
            if let Err(e) = self.transport.deliver(recipient, Some(&subject), &body).await {
                failures.push(format!("{}: {}", recipient, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ChannelError::Delivery {
                channel: ChannelKind::Email,
                reason: failures.join("; "),
            })
        }
    }
}
