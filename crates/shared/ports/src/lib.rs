//! Aegis Ports
//!
//! Port definitions (traits) for the protocol escalation system.
//! These define the boundaries between the escalation logic and the
//! collaborators it consumes: time, volatility data, audit storage and
//! remedial actions.

mod action;
mod atr;
mod audit;
mod clock;
mod error;

pub use action::AutoAction;
pub use atr::{AtrProvider, AtrReading};
pub use audit::{AuditSeverity, AuditTrail};
pub use clock::Clock;
pub use error::{AtrError, AuditError, AutoActionError};
