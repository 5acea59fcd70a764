//! Alert model

use aegis_core::{EscalationEvent, EscalationEventType, ProtocolLevel, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::channels::ChannelKind;

/// Urgency of an alert; selects channels and cooldown
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    #[default]
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertPriority::Info => "INFO",
            AlertPriority::Warning => "WARNING",
            AlertPriority::Critical => "CRITICAL",
            AlertPriority::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertEventType {
    Escalation,
    DeEscalation,
    BreachDetected,
    BreachResolved,
    SystemHealth,
}

impl AlertEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertEventType::Escalation => "escalation",
            AlertEventType::DeEscalation => "de_escalation",
            AlertEventType::BreachDetected => "breach_detected",
            AlertEventType::BreachResolved => "breach_resolved",
            AlertEventType::SystemHealth => "system_health",
        }
    }
}

impl From<EscalationEventType> for AlertEventType {
    fn from(value: EscalationEventType) -> Self {
        match value {
            EscalationEventType::Escalation => AlertEventType::Escalation,
            EscalationEventType::DeEscalation => AlertEventType::DeEscalation,
            EscalationEventType::BreachDetected => AlertEventType::BreachDetected,
            EscalationEventType::BreachResolved => AlertEventType::BreachResolved,
        }
    }
}

impl fmt::Display for AlertEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification routed to one or more channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: Uuid,
    pub priority: AlertPriority,
    pub event_type: AlertEventType,
    pub title: String,
    pub message: String,
    pub timestamp: Timestamp,
    pub metadata: BTreeMap<String, String>,
}

impl Alert {
    pub fn new(
        priority: AlertPriority,
        event_type: AlertEventType,
        title: impl Into<String>,
        message: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            priority,
            event_type,
            title: title.into(),
            message: message.into(),
            timestamp,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Alert describing an escalation event
    ///
    /// Escalations get more urgent the higher they go; anything that
    /// lowers risk is informational.
    pub fn from_escalation_event(event: &EscalationEvent) -> Self {
        let priority = match event.event_type {
            EscalationEventType::Escalation => match event.to_level {
                ProtocolLevel::Normal => AlertPriority::Info,
                ProtocolLevel::Enhanced => AlertPriority::Warning,
                ProtocolLevel::Recovery => AlertPriority::Critical,
                ProtocolLevel::Preservation => AlertPriority::Emergency,
            },
            EscalationEventType::BreachDetected => AlertPriority::Warning,
            EscalationEventType::DeEscalation | EscalationEventType::BreachResolved => {
                AlertPriority::Info
            }
        };

        let subject = event.position_id.as_deref().unwrap_or("system");
        let title = match event.event_type {
            EscalationEventType::Escalation => format!("Protocol escalated to {}", event.to_level),
            EscalationEventType::DeEscalation => {
                format!("Protocol de-escalated to {}", event.to_level)
            }
            EscalationEventType::BreachDetected => format!("Breach detected on {}", subject),
            EscalationEventType::BreachResolved => format!("Breach resolved on {}", subject),
        };
        let message = format!(
            "{} -> {}: {} (ATR {}x, loss {}%)",
            event.from_level,
            event.to_level,
            event.trigger_reason,
            event.atr_breach_multiple,
            event.position_loss_pct
        );

        let mut alert = Alert::new(
            priority,
            event.event_type.into(),
            title,
            message,
            event.timestamp,
        )
        .with_metadata("event_id", event.event_id.to_string())
        .with_metadata("from_level", event.from_level.as_str())
        .with_metadata("to_level", event.to_level.as_str());

        if let Some(position_id) = &event.position_id {
            alert = alert.with_metadata("position_id", position_id.clone());
        }
        if !event.auto_actions_taken.is_empty() {
            let actions: Vec<_> = event.auto_actions_taken.iter().map(|a| a.as_str()).collect();
            alert = alert.with_metadata("auto_actions", actions.join(","));
        }
        alert
    }
}

/// Lifecycle state after a dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Created,
    RateLimited,
    Sent,
    PartiallyFailed,
    Failed,
}

/// Outcome of sending one alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub alert_id: Uuid,
    pub status: AlertStatus,
    pub delivered: Vec<ChannelKind>,
    pub failed: Vec<(ChannelKind, String)>,
}

impl DispatchResult {
    /// At least one channel accepted the alert
    pub fn is_sent(&self) -> bool {
        matches!(self.status, AlertStatus::Sent | AlertStatus::PartiallyFailed)
    }
}
