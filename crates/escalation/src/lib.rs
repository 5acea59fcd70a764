//! Aegis Protocol Escalation
//!
//! Four-level risk state machine driven by position price updates:
//!
//! - **Protocol Level Manager**: owns the system-wide level, decides transitions
//! - **Position Risk Tracker**: per-position ATR/loss metrics and breach history
//! - **Escalation Manager**: breach detection, stepwise escalation, auto-actions,
//!   system-wide de-escalation with hysteresis
//! - **Audit**: every event appended to an [`AuditTrail`](aegis_ports::AuditTrail)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Escalation Manager                        │
//! │                                                             │
//! │  Price Update ──► Tracker ──► Breach? ──► Level Manager    │
//! │                                              │              │
//! │  ATR Provider ──► Tracker                    ▼              │
//! │                                    Auto-Actions (timeout)   │
//! │                                              │              │
//! └──────────────────────────────────────────────┼──────────────┘
//!                                                ▼
//!                     EscalationEvent ──► History / Audit / Broadcast
//! ```
//!
//! ## Breach and Levels
//!
//! | Condition | Effect |
//! |-----------|--------|
//! | `atr_breach_multiple >= breach threshold` | Breach, ATR ladder picks target |
//! | `loss_pct >= current max loss` | Breach, loss ladder picks target |
//! | No breach for `de_escalation_delay` | One level down |

pub mod actions;
pub mod audit;
pub mod error;
pub mod levels;
pub mod manager;
pub mod tracker;

// Re-export main types
pub use actions::AutoActionRegistry;
pub use audit::{AuditRecord, InMemoryAuditTrail, LogAuditTrail};
pub use error::{EscalationError, Result};
pub use levels::ProtocolLevelManager;
pub use manager::{EscalationConfig, EscalationManager, ProtocolStatus};
pub use tracker::{BreachChange, Observation, PositionRiskTracker};
