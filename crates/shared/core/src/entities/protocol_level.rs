use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::AutoActionKind;

/// System-wide risk protocol level
///
/// Strictly ordered: escalation moves to a higher value, de-escalation
/// to a lower one. Exactly one level is current at any time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolLevel {
    /// Business as usual
    #[default]
    Normal,
    /// Elevated monitoring, tightened stops
    Enhanced,
    /// Active loss recovery, position reduction
    Recovery,
    /// Capital preservation, exit and safe mode
    Preservation,
}

impl ProtocolLevel {
    /// All levels in ascending order
    pub const ALL: [ProtocolLevel; 4] = [
        ProtocolLevel::Normal,
        ProtocolLevel::Enhanced,
        ProtocolLevel::Recovery,
        ProtocolLevel::Preservation,
    ];

    /// Numeric value (0 = NORMAL .. 3 = PRESERVATION)
    pub fn value(&self) -> u8 {
        match self {
            ProtocolLevel::Normal => 0,
            ProtocolLevel::Enhanced => 1,
            ProtocolLevel::Recovery => 2,
            ProtocolLevel::Preservation => 3,
        }
    }

    /// Next level up, if any
    pub fn next(&self) -> Option<ProtocolLevel> {
        match self {
            ProtocolLevel::Normal => Some(ProtocolLevel::Enhanced),
            ProtocolLevel::Enhanced => Some(ProtocolLevel::Recovery),
            ProtocolLevel::Recovery => Some(ProtocolLevel::Preservation),
            ProtocolLevel::Preservation => None,
        }
    }

    /// Next level down, if any
    pub fn previous(&self) -> Option<ProtocolLevel> {
        match self {
            ProtocolLevel::Normal => None,
            ProtocolLevel::Enhanced => Some(ProtocolLevel::Normal),
            ProtocolLevel::Recovery => Some(ProtocolLevel::Enhanced),
            ProtocolLevel::Preservation => Some(ProtocolLevel::Recovery),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolLevel::Normal => "NORMAL",
            ProtocolLevel::Enhanced => "ENHANCED",
            ProtocolLevel::Recovery => "RECOVERY",
            ProtocolLevel::Preservation => "PRESERVATION",
        }
    }
}

impl fmt::Display for ProtocolLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy attached to a single protocol level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolLevelConfig {
    /// How often positions are checked at this level (seconds)
    pub monitoring_frequency_secs: u64,
    /// Loss (percent of entry) tolerated before a position is in breach
    pub max_position_loss_pct: Decimal,
    /// Quiet period required before stepping down from this level (seconds)
    pub de_escalation_delay_secs: u64,
    /// ATR breach multiple at which this level is indicated (None for NORMAL)
    #[serde(default)]
    pub entry_atr_multiple: Option<Decimal>,
    /// Continuous breach time required before a trigger counts (seconds)
    #[serde(default)]
    pub escalation_confirmation_secs: u64,
    /// Auto-actions fired on entering this level
    #[serde(default)]
    pub auto_actions: BTreeMap<AutoActionKind, bool>,
}

impl ProtocolLevelConfig {
    pub fn monitoring_frequency(&self) -> Duration {
        Duration::seconds(self.monitoring_frequency_secs as i64)
    }

    pub fn de_escalation_delay(&self) -> Duration {
        Duration::seconds(self.de_escalation_delay_secs as i64)
    }

    pub fn escalation_confirmation(&self) -> Duration {
        Duration::seconds(self.escalation_confirmation_secs as i64)
    }

    /// Actions switched on for this level, in stable order
    pub fn enabled_actions(&self) -> Vec<AutoActionKind> {
        self.auto_actions
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(kind, _)| *kind)
            .collect()
    }

    fn with_actions(mut self, actions: &[(AutoActionKind, bool)]) -> Self {
        self.auto_actions = actions.iter().copied().collect();
        self
    }
}

/// Errors raised when a level table is inconsistent
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolTableError {
    #[error("{level}: monitoring frequency must be positive")]
    ZeroFrequency { level: ProtocolLevel },

    #[error("{level}: max position loss must be positive, got {value}")]
    NonPositiveLoss { level: ProtocolLevel, value: String },

    #[error("NORMAL must not define an entry ATR multiple")]
    NormalEntryMultiple,

    #[error("{level}: entry ATR multiple is required")]
    MissingEntryMultiple { level: ProtocolLevel },

    #[error("{level}: entry ATR multiple {value} must exceed the level below")]
    UnorderedEntryMultiple { level: ProtocolLevel, value: String },
}

/// Complete per-level configuration, looked up by the current level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolLevelTable {
    pub normal: ProtocolLevelConfig,
    pub enhanced: ProtocolLevelConfig,
    pub recovery: ProtocolLevelConfig,
    pub preservation: ProtocolLevelConfig,
}

impl Default for ProtocolLevelTable {
    fn default() -> Self {
        Self {
            normal: ProtocolLevelConfig {
                monitoring_frequency_secs: 300,
                max_position_loss_pct: dec!(5.0),
                de_escalation_delay_secs: 0,
                entry_atr_multiple: None,
                escalation_confirmation_secs: 0,
                auto_actions: BTreeMap::new(),
            },
            enhanced: ProtocolLevelConfig {
                monitoring_frequency_secs: 60,
                max_position_loss_pct: dec!(10.0),
                de_escalation_delay_secs: 300,
                entry_atr_multiple: Some(dec!(1.0)),
                escalation_confirmation_secs: 0,
                auto_actions: BTreeMap::new(),
            }
            .with_actions(&[
                (AutoActionKind::TightenStops, true),
                (AutoActionKind::PrepRoll, false),
            ]),
            recovery: ProtocolLevelConfig {
                monitoring_frequency_secs: 30,
                max_position_loss_pct: dec!(15.0),
                de_escalation_delay_secs: 900,
                entry_atr_multiple: Some(dec!(2.0)),
                escalation_confirmation_secs: 0,
                auto_actions: BTreeMap::new(),
            }
            .with_actions(&[
                (AutoActionKind::PrepRoll, true),
                (AutoActionKind::ReducePosition, true),
            ]),
            preservation: ProtocolLevelConfig {
                monitoring_frequency_secs: 1,
                max_position_loss_pct: dec!(20.0),
                de_escalation_delay_secs: 1800,
                entry_atr_multiple: Some(dec!(3.0)),
                escalation_confirmation_secs: 0,
                auto_actions: BTreeMap::new(),
            }
            .with_actions(&[
                (AutoActionKind::ImmediateExit, true),
                (AutoActionKind::EnterSafeMode, true),
            ]),
        }
    }
}

impl ProtocolLevelTable {
    /// Config for a level
    pub fn get(&self, level: ProtocolLevel) -> &ProtocolLevelConfig {
        match level {
            ProtocolLevel::Normal => &self.normal,
            ProtocolLevel::Enhanced => &self.enhanced,
            ProtocolLevel::Recovery => &self.recovery,
            ProtocolLevel::Preservation => &self.preservation,
        }
    }

    /// Highest level whose entry ATR multiple is reached
    pub fn level_for_atr_multiple(&self, atr_breach_multiple: Decimal) -> ProtocolLevel {
        ProtocolLevel::ALL
            .iter()
            .rev()
            .find(|level| {
                self.get(**level)
                    .entry_atr_multiple
                    .is_some_and(|threshold| atr_breach_multiple >= threshold)
            })
            .copied()
            .unwrap_or(ProtocolLevel::Normal)
    }

    /// Check that the table describes a strictly ordered escalation ladder
    pub fn validate(&self) -> Result<(), ProtocolTableError> {
        if self.normal.entry_atr_multiple.is_some() {
            return Err(ProtocolTableError::NormalEntryMultiple);
        }

        let mut previous_multiple = Decimal::ZERO;
        for level in ProtocolLevel::ALL {
            let config = self.get(level);

            if config.monitoring_frequency_secs == 0 {
                return Err(ProtocolTableError::ZeroFrequency { level });
            }
            if config.max_position_loss_pct <= Decimal::ZERO {
                return Err(ProtocolTableError::NonPositiveLoss {
                    level,
                    value: config.max_position_loss_pct.to_string(),
                });
            }
            if level == ProtocolLevel::Normal {
                continue;
            }

            let multiple = config
                .entry_atr_multiple
                .ok_or(ProtocolTableError::MissingEntryMultiple { level })?;
            if multiple <= previous_multiple {
                return Err(ProtocolTableError::UnorderedEntryMultiple {
                    level,
                    value: multiple.to_string(),
                });
            }
            previous_multiple = multiple;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_strictly_ordered() {
        assert!(ProtocolLevel::Normal < ProtocolLevel::Enhanced);
        assert!(ProtocolLevel::Enhanced < ProtocolLevel::Recovery);
        assert!(ProtocolLevel::Recovery < ProtocolLevel::Preservation);

        for (i, level) in ProtocolLevel::ALL.iter().enumerate() {
            assert_eq!(level.value() as usize, i);
        }
    }

    #[test]
    fn test_next_and_previous_step_one_level() {
        assert_eq!(ProtocolLevel::Normal.next(), Some(ProtocolLevel::Enhanced));
        assert_eq!(ProtocolLevel::Preservation.next(), None);
        assert_eq!(ProtocolLevel::Recovery.previous(), Some(ProtocolLevel::Enhanced));
        assert_eq!(ProtocolLevel::Normal.previous(), None);
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = ProtocolLevelTable::default();
        assert!(table.validate().is_ok());
        assert_eq!(table.get(ProtocolLevel::Normal).max_position_loss_pct, dec!(5.0));
        assert_eq!(table.get(ProtocolLevel::Preservation).monitoring_frequency_secs, 1);
    }

    #[test]
    fn test_level_for_atr_multiple() {
        let table = ProtocolLevelTable::default();

        assert_eq!(table.level_for_atr_multiple(dec!(0.5)), ProtocolLevel::Normal);
        assert_eq!(table.level_for_atr_multiple(dec!(1.0)), ProtocolLevel::Enhanced);
        assert_eq!(table.level_for_atr_multiple(dec!(1.5)), ProtocolLevel::Enhanced);
        assert_eq!(table.level_for_atr_multiple(dec!(2.0)), ProtocolLevel::Recovery);
        assert_eq!(table.level_for_atr_multiple(dec!(7)), ProtocolLevel::Preservation);
    }

    #[test]
    fn test_enabled_actions_skip_disabled() {
        let table = ProtocolLevelTable::default();

        let enhanced = table.get(ProtocolLevel::Enhanced).enabled_actions();
        assert_eq!(enhanced, vec![AutoActionKind::TightenStops]);

        let preservation = table.get(ProtocolLevel::Preservation).enabled_actions();
        assert_eq!(
            preservation,
            vec![AutoActionKind::ImmediateExit, AutoActionKind::EnterSafeMode]
        );
    }

    #[test]
    fn test_validate_rejects_unordered_multiples() {
        let mut table = ProtocolLevelTable::default();
        table.recovery.entry_atr_multiple = Some(dec!(0.5));

        assert!(matches!(
            table.validate(),
            Err(ProtocolTableError::UnorderedEntryMultiple {
                level: ProtocolLevel::Recovery,
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_frequency() {
        let mut table = ProtocolLevelTable::default();
        table.enhanced.monitoring_frequency_secs = 0;

        assert_eq!(
            table.validate(),
            Err(ProtocolTableError::ZeroFrequency {
                level: ProtocolLevel::Enhanced
            })
        );
    }

    #[test]
    fn test_table_deserializes_from_json() {
        let json = serde_json::to_string(&ProtocolLevelTable::default()).unwrap();
        let parsed: ProtocolLevelTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ProtocolLevelTable::default());
    }
}
