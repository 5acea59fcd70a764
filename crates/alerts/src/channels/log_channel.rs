use async_trait::async_trait;
use log::{error, info, warn};

use super::{AlertChannel, ChannelKind};
use crate::alert::{Alert, AlertPriority};
use crate::error::ChannelError;

/// Writes alerts to the application log
pub struct LogChannel;

#[async_trait]
impl AlertChannel for LogChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Log
    }

    async fn handle(&self, alert: &Alert) -> Result<(), ChannelError> {
        match alert.priority {
            AlertPriority::Info => info!("[ALERT] {}: {}", alert.title, alert.message),
            AlertPriority::Warning => warn!("[ALERT] {}: {}", alert.title, alert.message),
            AlertPriority::Critical | AlertPriority::Emergency => {
                error!("[ALERT] {} {}: {}", alert.priority, alert.title, alert.message)
            }
        }
        Ok(())
    }
}
