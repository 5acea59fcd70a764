use async_trait::async_trait;
use log::info;

use crate::error::ChannelError;

/// Delivery provider behind the email and SMS channels
#[async_trait]
pub trait MessageTransport: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver one rendered message; `subject` is `None` for SMS
    async fn deliver(
        &self,
        recipient: &str,
        subject: Option<&str>,
        body: &str,
    ) -> Result<(), ChannelError>;
}

/// Transport that records messages in the log instead of sending them
pub struct LogTransport;

#[async_trait]
impl MessageTransport for LogTransport {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(
        &self,
        recipient: &str,
        subject: Option<&str>,
        body: &str,
    ) -> Result<(), ChannelError> {
        match subject {
            Some(subject) => info!("[ALERT] -> {} | {} | {}", recipient, subject, body),
            None => info!("[ALERT] -> {} | {}", recipient, body),
        }
        Ok(())
    }
}
