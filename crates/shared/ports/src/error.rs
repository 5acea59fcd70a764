use thiserror::Error;

/// Failures of the ATR calculation engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtrError {
    #[error("ATR data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Insufficient history for {symbol}: need {required} bars, got {available}")]
    InsufficientHistory {
        symbol: String,
        required: usize,
        available: usize,
    },

    #[error("Invalid ATR for {symbol}: {value}")]
    InvalidValue { symbol: String, value: String },
}

/// Failures writing to the audit trail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("Audit trail unavailable: {0}")]
    Unavailable(String),

    #[error("Audit record rejected: {0}")]
    Rejected(String),
}

/// Failures reported by an auto-action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AutoActionError {
    #[error("Action failed: {0}")]
    Failed(String),

    #[error("Action timed out after {0}s")]
    TimedOut(u64),
}
