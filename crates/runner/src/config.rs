//! Autopilot configuration
//!
//! One JSON document with a section per component. Missing sections
//! fall back to defaults.

use aegis_alerts::AlertConfig;
use aegis_atr::AtrEngineConfig;
use aegis_core::{AccountType, PositionId, Price, ProtocolLevelTable, Symbol};
use aegis_escalation::EscalationConfig;
use aegis_monitoring::MonitoringConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Escalation settings outside the level table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationSection {
    pub breach_atr_multiple: Decimal,
    pub action_timeout_secs: u64,
    pub event_channel_capacity: usize,
}

impl Default for EscalationSection {
    fn default() -> Self {
        let defaults = EscalationConfig::default();
        Self {
            breach_atr_multiple: defaults.breach_atr_multiple,
            action_timeout_secs: defaults.action_timeout_secs,
            event_channel_capacity: defaults.event_channel_capacity,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AtrSection {
    pub engine: AtrEngineConfig,
    /// Per-symbol ATR used when no bar history is available
    pub fixed: BTreeMap<Symbol, Decimal>,
}

/// Position monitored from startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSeed {
    pub position_id: PositionId,
    pub symbol: Symbol,
    #[serde(default)]
    pub account_type: AccountType,
    pub entry_price: Price,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    pub protocol: ProtocolLevelTable,
    pub escalation: EscalationSection,
    pub monitoring: MonitoringConfig,
    pub alerts: AlertConfig,
    pub atr: AtrSection,
    pub positions: Vec<PositionSeed>,
}

impl AutopilotConfig {
    pub fn escalation_config(&self) -> EscalationConfig {
        EscalationConfig {
            protocol: self.protocol.clone(),
            breach_atr_multiple: self.escalation.breach_atr_multiple,
            action_timeout_secs: self.escalation.action_timeout_secs,
            event_channel_capacity: self.escalation.event_channel_capacity,
        }
    }

    /// Monitoring settings with position checks paced by the level table
    pub fn monitoring_config(&self) -> MonitoringConfig {
        MonitoringConfig {
            presets: self
                .monitoring
                .presets
                .clone()
                .with_position_checks_from(&self.protocol),
            ..self.monitoring.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.escalation_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.monitoring_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.atr.engine.period == 0 {
            return Err(ConfigError::Invalid("atr.engine.period must be non-zero".to_string()));
        }
        if let Some((symbol, _)) = self.atr.fixed.iter().find(|(_, atr)| **atr <= Decimal::ZERO) {
            return Err(ConfigError::Invalid(format!(
                "fixed ATR for {} must be positive",
                symbol
            )));
        }

        let mut seen = HashSet::new();
        for seed in &self.positions {
            if !seen.insert(seed.position_id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate position {}",
                    seed.position_id
                )));
            }
            if seed.entry_price <= Decimal::ZERO {
                return Err(ConfigError::Invalid(format!(
                    "entry price of {} must be positive",
                    seed.position_id
                )));
            }
        }
        Ok(())
    }
}

/// Load and validate configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AutopilotConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load and validate configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<AutopilotConfig, ConfigError> {
    let config: AutopilotConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<AutopilotConfig, ConfigError> {
    load_config_from_str(include_str!("default_config.json"))
}
