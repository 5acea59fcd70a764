//! Aegis Runner - Risk Autopilot
//!
//! Wires the escalation manager, adaptive monitoring and alerting into
//! one process driven by a JSON config:
//!
//! - **Config**: JSON config with a bundled default
//! - **Actions**: Log-only auto-actions used when no broker is attached
//! - **Autopilot**: Composition root and escalation event bridge
//!
//! ## Architecture
//!
//! ```text
//!                 ┌─────────────────────┐
//!   prices ──────►│  EscalationManager  │◄──── ATR (bars, then fixed)
//!                 └──────────┬──────────┘
//!                            │ EscalationEvent (broadcast)
//!                            ▼
//!                 ┌─────────────────────┐
//!                 │       bridge        │
//!                 └─────┬─────────┬─────┘
//!          apply_level  │         │ notify
//!                       ▼         ▼
//!          ┌──────────────────┐ ┌──────────────┐
//!          │ MonitoringSystem │ │ AlertSystem  │
//!          └────────┬─────────┘ └──────────────┘
//!                   │ position checks, health, evaluate
//!                   └──────────► EscalationManager
//! ```

pub mod actions;
pub mod autopilot;
pub mod config;
pub mod error;

pub use actions::LogAction;
pub use autopilot::{Autopilot, AutopilotStatus};
pub use config::{
    AtrSection, AutopilotConfig, ConfigError, EscalationSection, PositionSeed, load_config,
    load_config_from_str, load_default_config,
};
pub use error::{AutopilotError, Result};
