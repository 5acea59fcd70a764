use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AuditError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditSeverity::Info => f.write_str("info"),
            AuditSeverity::Warning => f.write_str("warning"),
            AuditSeverity::Critical => f.write_str("critical"),
        }
    }
}

/// Port for the append-only audit trail
///
/// The escalation path writes but never reads synchronously; a failed
/// write must not affect the transition that produced it.
pub trait AuditTrail: Send + Sync {
    /// Append a system event, returning its audit id
    fn log_system_event(
        &self,
        event_type: &str,
        event_data: serde_json::Value,
        severity: AuditSeverity,
    ) -> Result<String, AuditError>;
}
