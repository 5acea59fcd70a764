//! Protocol Level Manager
//!
//! Holds the single system-wide protocol level and decides transitions.
//! Pure and deterministic: every decision depends only on its inputs and
//! the level table, and time is passed in by the caller.

use aegis_core::{ProtocolLevel, ProtocolLevelConfig, ProtocolLevelTable, Timestamp};
use chrono::Duration;
use log::info;
use rust_decimal::Decimal;

/// Owner of the current protocol level
#[derive(Debug, Clone)]
pub struct ProtocolLevelManager {
    table: ProtocolLevelTable,
    /// ATR multiple at or above which any position is in breach
    breach_atr_multiple: Decimal,
    current_level: ProtocolLevel,
    last_transition: Timestamp,
}

impl ProtocolLevelManager {
    pub fn new(table: ProtocolLevelTable, breach_atr_multiple: Decimal, now: Timestamp) -> Self {
        Self {
            table,
            breach_atr_multiple,
            current_level: ProtocolLevel::Normal,
            last_transition: now,
        }
    }

    pub fn current_level(&self) -> ProtocolLevel {
        self.current_level
    }

    pub fn current_level_config(&self) -> &ProtocolLevelConfig {
        self.table.get(self.current_level)
    }

    pub fn config_for(&self, level: ProtocolLevel) -> &ProtocolLevelConfig {
        self.table.get(level)
    }

    pub fn table(&self) -> &ProtocolLevelTable {
        &self.table
    }

    pub fn breach_atr_multiple(&self) -> Decimal {
        self.breach_atr_multiple
    }

    /// When the current level was entered
    pub fn last_transition(&self) -> Timestamp {
        self.last_transition
    }

    pub fn time_at_level(&self, now: Timestamp) -> Duration {
        now - self.last_transition
    }

    /// Breach condition evaluated against the current level
    pub fn is_breach(&self, atr_breach_multiple: Decimal, position_loss_pct: Decimal) -> bool {
        self.is_breach_at(self.current_level, atr_breach_multiple, position_loss_pct)
    }

    fn is_breach_at(
        &self,
        level: ProtocolLevel,
        atr_breach_multiple: Decimal,
        position_loss_pct: Decimal,
    ) -> bool {
        atr_breach_multiple >= self.breach_atr_multiple
            || position_loss_pct >= self.table.get(level).max_position_loss_pct
    }

    /// Level indicated by the ATR ladder
    pub fn atr_target(&self, atr_breach_multiple: Decimal) -> ProtocolLevel {
        self.table.level_for_atr_multiple(atr_breach_multiple)
    }

    /// Level indicated by the loss ladder, starting from the current limit
    pub fn loss_target(&self, position_loss_pct: Decimal) -> ProtocolLevel {
        let mut target = self.current_level;
        loop {
            let Some(next) = target.next() else {
                return target;
            };
            if position_loss_pct < self.table.get(target).max_position_loss_pct {
                return target;
            }
            target = next;
        }
    }

    /// Level to escalate to, if any
    ///
    /// The higher of the ATR and loss targets wins. Never returns a level
    /// at or below the current one.
    pub fn should_escalate(
        &self,
        atr_breach_multiple: Decimal,
        position_loss_pct: Decimal,
        time_in_breach: Duration,
    ) -> Option<ProtocolLevel> {
        if time_in_breach < self.current_level_config().escalation_confirmation() {
            return None;
        }

        let target = self
            .atr_target(atr_breach_multiple)
            .max(self.loss_target(position_loss_pct));

        (target > self.current_level).then_some(target)
    }

    /// Next-lower level, once the breach has stayed resolved long enough
    ///
    /// The breach condition is checked against both the current level and
    /// the level being stepped down to, so a step down never lands in an
    /// immediate breach.
    pub fn should_de_escalate(
        &self,
        atr_breach_multiple: Decimal,
        position_loss_pct: Decimal,
        time_since_breach_resolved: Duration,
    ) -> Option<ProtocolLevel> {
        let target = self.current_level.previous()?;

        if self.is_breach(atr_breach_multiple, position_loss_pct)
            || self.is_breach_at(target, atr_breach_multiple, position_loss_pct)
        {
            return None;
        }

        if time_since_breach_resolved < self.current_level_config().de_escalation_delay() {
            return None;
        }

        Some(target)
    }

    /// Move up to `level`; false (no change) unless strictly higher
    pub fn escalate_to_level(&mut self, level: ProtocolLevel, now: Timestamp) -> bool {
        if level <= self.current_level {
            return false;
        }
        info!("[ESCALATION] Protocol level {} -> {}", self.current_level, level);
        self.current_level = level;
        self.last_transition = now;
        true
    }

    /// Move down to `level`; false (no change) unless strictly lower
    pub fn de_escalate_to_level(&mut self, level: ProtocolLevel, now: Timestamp) -> bool {
        if level >= self.current_level {
            return false;
        }
        info!("[ESCALATION] Protocol level {} -> {}", self.current_level, level);
        self.current_level = level;
        self.last_transition = now;
        true
    }
}
