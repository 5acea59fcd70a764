//! Escalation errors

use aegis_core::{AutoActionKind, ProtocolLevel, ProtocolTableError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscalationError {
    #[error("ATR data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: ProtocolLevel,
        to: ProtocolLevel,
    },

    #[error("Auto-action already registered: {0}")]
    DuplicateAction(AutoActionKind),

    #[error("Invalid protocol table: {0}")]
    InvalidProtocol(#[from] ProtocolTableError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, EscalationError>;
