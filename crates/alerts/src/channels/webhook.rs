use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{AlertChannel, ChannelKind};
use crate::alert::Alert;
use crate::error::{AlertError, ChannelError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: String,
    pub timeout_secs: u64,
    /// Extra request headers, e.g. an auth token
    pub headers: BTreeMap<String, String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: 10,
            headers: BTreeMap::new(),
        }
    }
}

/// Posts alerts as JSON to an HTTP endpoint
pub struct WebhookChannel {
    client: Client,
    config: WebhookConfig,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Result<Self, AlertError> {
        if config.url.is_empty() {
            return Err(AlertError::InvalidConfig("webhook url is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AlertError::InvalidConfig(format!("webhook client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn payload(alert: &Alert) -> Value {
        json!({
            "source": "aegis",
            "alert_id": alert.alert_id,
            "priority": alert.priority,
            "event_type": alert.event_type,
            "title": alert.title,
            "message": alert.message,
            "timestamp": alert.timestamp,
            "metadata": alert.metadata,
        })
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn handle(&self, alert: &Alert) -> Result<(), ChannelError> {
        let mut request = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .json(&Self::payload(alert));
        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await?;
        Err(ChannelError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
