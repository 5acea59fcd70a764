use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::{AutoActionKind, PositionRiskMetrics, ProtocolLevel};
use crate::values::PositionId;

/// Kind of audit-worthy escalation event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationEventType {
    Escalation,
    DeEscalation,
    BreachDetected,
    BreachResolved,
}

impl EscalationEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationEventType::Escalation => "escalation",
            EscalationEventType::DeEscalation => "de_escalation",
            EscalationEventType::BreachDetected => "breach_detected",
            EscalationEventType::BreachResolved => "breach_resolved",
        }
    }

    /// True for events that move the protocol level
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            EscalationEventType::Escalation | EscalationEventType::DeEscalation
        )
    }
}

impl fmt::Display for EscalationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of an escalation-related occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: EscalationEventType,
    pub from_level: ProtocolLevel,
    pub to_level: ProtocolLevel,
    pub trigger_reason: String,
    /// Position that triggered the event, if any
    pub position_id: Option<PositionId>,
    pub atr_breach_multiple: Decimal,
    pub position_loss_pct: Decimal,
    /// Auto-actions that completed successfully
    pub auto_actions_taken: Vec<AutoActionKind>,
    /// Whether the level transition itself succeeded
    pub success: bool,
    pub metadata: BTreeMap<String, String>,
}

impl EscalationEvent {
    /// Event without a triggering position (system-wide or operator driven)
    pub fn system(
        event_type: EscalationEventType,
        from_level: ProtocolLevel,
        to_level: ProtocolLevel,
        trigger_reason: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            timestamp,
            event_type,
            from_level,
            to_level,
            trigger_reason: trigger_reason.into(),
            position_id: None,
            atr_breach_multiple: Decimal::ZERO,
            position_loss_pct: Decimal::ZERO,
            auto_actions_taken: Vec::new(),
            success: true,
            metadata: BTreeMap::new(),
        }
    }

    /// Event triggered by a specific position
    pub fn for_position(
        event_type: EscalationEventType,
        from_level: ProtocolLevel,
        to_level: ProtocolLevel,
        trigger_reason: impl Into<String>,
        metrics: &PositionRiskMetrics,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut event = Self::system(event_type, from_level, to_level, trigger_reason, timestamp);
        event.position_id = Some(metrics.position_id.clone());
        event.atr_breach_multiple = metrics.atr_breach_multiple;
        event.position_loss_pct = metrics.position_loss_pct;
        event.metadata.insert("symbol".to_string(), metrics.symbol.clone());
        event
            .metadata
            .insert("current_price".to_string(), metrics.current_price.to_string());
        event
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
