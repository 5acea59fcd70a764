//! Audit trail implementations

use aegis_core::Timestamp;
use aegis_ports::{AuditError, AuditSeverity, AuditTrail, Clock};
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One appended audit entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub severity: AuditSeverity,
    pub recorded_at: Timestamp,
}

/// Append-only in-memory audit trail
///
/// Nothing survives a restart.
pub struct InMemoryAuditTrail {
    records: Mutex<Vec<AuditRecord>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryAuditTrail {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// Snapshot of all records, oldest first
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl AuditTrail for InMemoryAuditTrail {
    fn log_system_event(
        &self,
        event_type: &str,
        event_data: serde_json::Value,
        severity: AuditSeverity,
    ) -> Result<String, AuditError> {
        let audit_id = Uuid::new_v4().to_string();
        self.records.lock().push(AuditRecord {
            audit_id: audit_id.clone(),
            event_type: event_type.to_string(),
            event_data,
            severity,
            recorded_at: self.clock.now(),
        });
        Ok(audit_id)
    }
}

/// Audit trail that writes each record to the log
pub struct LogAuditTrail;

impl AuditTrail for LogAuditTrail {
    fn log_system_event(
        &self,
        event_type: &str,
        event_data: serde_json::Value,
        severity: AuditSeverity,
    ) -> Result<String, AuditError> {
        let audit_id = Uuid::new_v4().to_string();
        match severity {
            AuditSeverity::Info => info!("[AUDIT] {} {} {}", audit_id, event_type, event_data),
            AuditSeverity::Warning | AuditSeverity::Critical => {
                warn!("[AUDIT] {} {} ({}) {}", audit_id, event_type, severity, event_data)
            }
        }
        Ok(audit_id)
    }
}
