use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{AlertChannel, ChannelKind, MessageTransport};
use crate::alert::Alert;
use crate::error::ChannelError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub phone_numbers: Vec<String>,
    /// Characters per message; longer texts are cut
    pub max_length: usize,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            phone_numbers: Vec::new(),
            max_length: 160,
        }
    }
}

/// Short text messages for the most urgent alerts
pub struct SmsChannel {
    config: SmsConfig,
    transport: Arc<dyn MessageTransport>,
}

impl SmsChannel {
    pub fn new(config: SmsConfig, transport: Arc<dyn MessageTransport>) -> Self {
        Self { config, transport }
    }

    pub fn render(&self, alert: &Alert) -> String {
        let text = format!("AEGIS {}: {} - {}", alert.priority, alert.title, alert.message);
        if text.chars().count() <= self.config.max_length {
            return text;
        }
        let mut cut: String = text
            .chars()
            .take(self.config.max_length.saturating_sub(3))
            .collect();
        cut.push_str("...");
        cut
    }
}

#[async_trait]
impl AlertChannel for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn handle(&self, alert: &Alert) -> Result<(), ChannelError> {
        if self.config.phone_numbers.is_empty() {
            return Err(ChannelError::Delivery {
                channel: ChannelKind::Sms,
                reason: "no phone numbers configured".to_string(),
            });
        }

        let text = self.render(alert);
        let mut failures = Vec::new();
        for number in &self.config.phone_numbers {
            if let Err(e) = self.transport.deliver(number, None, &text).await {
                failures.push(format!("{}: {}", number, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ChannelError::Delivery {
                channel: ChannelKind::Sms,
                reason: failures.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertEventType, AlertPriority};
    use crate::channels::LogTransport;
    use chrono::Utc;

    #[test]
    fn test_render_truncates_long_messages() {
        let channel = SmsChannel::new(
            SmsConfig {
                phone_numbers: vec!["+15550100".into()],
                max_length: 40,
            },
            Arc::new(LogTransport),
        );
        let alert = Alert::new(
            AlertPriority::Emergency,
            AlertEventType::Escalation,
            "Protocol escalated to PRESERVATION",
            "RECOVERY -> PRESERVATION: ATR breach 3.5x",
            Utc::now(),
        );

        let text = channel.render(&alert);
        assert_eq!(text.chars().count(), 40);
        assert!(text.starts_with("AEGIS EMERGENCY: "));
        assert!(text.ends_with("..."));
    }

    #[tokio::test]
    async fn test_delivers_through_transport() {
        let channel = SmsChannel::new(
            SmsConfig {
                phone_numbers: vec!["+15550100".into()],
                ..Default::default()
            },
            Arc::new(LogTransport),
        );
        let alert = Alert::new(
            AlertPriority::Emergency,
            AlertEventType::Escalation,
            "t",
            "m",
            Utc::now(),
        );
        assert!(channel.handle(&alert).await.is_ok());
    }
}
