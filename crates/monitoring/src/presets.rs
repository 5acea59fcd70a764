//! Per-level polling frequencies

use aegis_core::{ProtocolLevel, ProtocolLevelTable};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::task::TaskCategory;

/// Polling frequencies (seconds) for each task category at one level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyPreset {
    pub position_check_secs: u64,
    pub health_check_secs: u64,
    pub risk_assessment_secs: u64,
}

impl FrequencyPreset {
    pub const fn new(position_check_secs: u64, health_check_secs: u64, risk_assessment_secs: u64) -> Self {
        Self {
            position_check_secs,
            health_check_secs,
            risk_assessment_secs,
        }
    }

    pub fn frequency(&self, category: TaskCategory) -> Duration {
        let secs = match category {
            TaskCategory::PositionCheck => self.position_check_secs,
            TaskCategory::HealthCheck => self.health_check_secs,
            TaskCategory::RiskAssessment => self.risk_assessment_secs,
        };
        Duration::seconds(secs as i64)
    }

    fn has_zero(&self) -> bool {
        self.position_check_secs == 0 || self.health_check_secs == 0 || self.risk_assessment_secs == 0
    }
}

/// Frequency presets for every protocol level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringPresets {
    pub normal: FrequencyPreset,
    pub enhanced: FrequencyPreset,
    pub recovery: FrequencyPreset,
    pub preservation: FrequencyPreset,
}

impl Default for MonitoringPresets {
    fn default() -> Self {
        Self {
            normal: FrequencyPreset::new(300, 600, 900),
            enhanced: FrequencyPreset::new(60, 300, 300),
            recovery: FrequencyPreset::new(30, 60, 120),
            preservation: FrequencyPreset::new(1, 30, 60),
        }
    }
}

impl MonitoringPresets {
    pub fn for_level(&self, level: ProtocolLevel) -> &FrequencyPreset {
        match level {
            ProtocolLevel::Normal => &self.normal,
            ProtocolLevel::Enhanced => &self.enhanced,
            ProtocolLevel::Recovery => &self.recovery,
            ProtocolLevel::Preservation => &self.preservation,
        }
    }

    fn for_level_mut(&mut self, level: ProtocolLevel) -> &mut FrequencyPreset {
        match level {
            ProtocolLevel::Normal => &mut self.normal,
            ProtocolLevel::Enhanced => &mut self.enhanced,
            ProtocolLevel::Recovery => &mut self.recovery,
            ProtocolLevel::Preservation => &mut self.preservation,
        }
    }

    /// Position checks at each level's `monitoring_frequency_secs`
    pub fn with_position_checks_from(mut self, table: &ProtocolLevelTable) -> Self {
        for level in ProtocolLevel::ALL {
            self.for_level_mut(level).position_check_secs =
                table.get(level).monitoring_frequency_secs;
        }
        self
    }

    /// First level with a zero frequency, if any
    pub fn zero_frequency_level(&self) -> Option<ProtocolLevel> {
        ProtocolLevel::ALL
            .into_iter()
            .find(|level| self.for_level(*level).has_zero())
    }
}
