//! Aegis Core Domain
//!
//! Pure domain types for the protocol escalation system.
//! This crate contains no async, no I/O, and is 100% unit testable.
//!
//! ## Protocol Levels
//!
//! ```text
//! NORMAL ──► ENHANCED ──► RECOVERY ──► PRESERVATION
//!   ◄──────────◄─────────────◄──────────────┘
//!        (one level per step, after de-escalation delay)
//! ```

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    AccountType, AutoActionKind, EscalationEvent, EscalationEventType, PositionRiskMetrics,
    ProtocolLevel, ProtocolLevelConfig, ProtocolLevelTable, ProtocolTableError,
};
pub use values::{PositionId, Price, Symbol, Timestamp};
