use aegis_alerts::AlertError;
use aegis_escalation::EscalationError;
use aegis_monitoring::MonitorError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum AutopilotError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Escalation error: {0}")]
    Escalation(#[from] EscalationError),
    #[error("Monitoring error: {0}")]
    Monitor(#[from] MonitorError),
    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),
    #[error("Autopilot already started")]
    AlreadyStarted,
}

pub type Result<T> = std::result::Result<T, AutopilotError>;
