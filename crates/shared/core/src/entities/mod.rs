mod auto_action;
mod escalation_event;
mod position_risk;
mod protocol_level;

pub use auto_action::AutoActionKind;
pub use escalation_event::{EscalationEvent, EscalationEventType};
pub use position_risk::{AccountType, PositionRiskMetrics};
pub use protocol_level::{ProtocolLevel, ProtocolLevelConfig, ProtocolLevelTable, ProtocolTableError};
