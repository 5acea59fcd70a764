//! Alert delivery channels

mod email;
mod log_channel;
mod sms;
mod transport;
mod webhook;

pub use email::{EmailChannel, EmailConfig};
pub use log_channel::LogChannel;
pub use sms::{SmsChannel, SmsConfig};
pub use transport::{LogTransport, MessageTransport};
pub use webhook::{WebhookChannel, WebhookConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::alert::{Alert, AlertPriority};
use crate::error::ChannelError;

/// Registry key for a channel implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Log,
    Email,
    Webhook,
    Sms,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Log => "log",
            ChannelKind::Email => "email",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Sms => "sms",
        }
    }

    /// Channels an alert of `priority` is routed to
    pub fn for_priority(priority: AlertPriority) -> &'static [ChannelKind] {
        match priority {
            AlertPriority::Info => &[ChannelKind::Log],
            AlertPriority::Warning => &[ChannelKind::Log, ChannelKind::Email],
            AlertPriority::Critical => {
                &[ChannelKind::Log, ChannelKind::Email, ChannelKind::Webhook]
            }
            AlertPriority::Emergency => &[
                ChannelKind::Log,
                ChannelKind::Email,
                ChannelKind::Webhook,
                ChannelKind::Sms,
            ],
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One way of getting an alert in front of a human
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    async fn handle(&self, alert: &Alert) -> Result<(), ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_widens_with_priority() {
        assert_eq!(ChannelKind::for_priority(AlertPriority::Info), &[ChannelKind::Log]);
        assert!(!ChannelKind::for_priority(AlertPriority::Critical).contains(&ChannelKind::Sms));
        assert_eq!(ChannelKind::for_priority(AlertPriority::Emergency).len(), 4);
    }
}
