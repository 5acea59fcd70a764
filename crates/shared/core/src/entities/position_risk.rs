use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::values::{PositionId, Price, Symbol};

/// Kind of account holding a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    #[default]
    Cash,
    Margin,
    Retirement,
}

/// Live risk metrics for one monitored position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRiskMetrics {
    /// Unique position key
    pub position_id: PositionId,
    pub symbol: Symbol,
    pub account_type: AccountType,
    pub entry_price: Price,
    pub current_price: Price,
    /// ATR used to scale price moves
    pub atr_value: Decimal,
    /// |current - entry| / atr
    pub atr_breach_multiple: Decimal,
    /// |current - entry| / entry * 100
    pub position_loss_pct: Decimal,
    /// Seconds spent continuously in breach
    pub time_in_breach_secs: i64,
    /// Whether the position is currently in breach
    pub in_breach: bool,
    pub last_updated: DateTime<Utc>,
}

impl PositionRiskMetrics {
    /// Fresh metrics with zeroed breach state, priced at entry
    pub fn new(
        position_id: impl Into<PositionId>,
        symbol: impl Into<Symbol>,
        account_type: AccountType,
        entry_price: Price,
        atr_value: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            position_id: position_id.into(),
            symbol: symbol.into(),
            account_type,
            entry_price,
            current_price: entry_price,
            atr_value,
            atr_breach_multiple: Decimal::ZERO,
            position_loss_pct: Decimal::ZERO,
            time_in_breach_secs: 0,
            in_breach: false,
            last_updated: now,
        }
    }

    /// Reprice the position and recompute the derived metrics
    pub fn apply_price(&mut self, current_price: Price, now: DateTime<Utc>) {
        self.current_price = current_price;
        self.recompute();
        self.last_updated = now;
    }

    /// Swap in a new ATR and recompute at the last known price
    pub fn apply_atr(&mut self, atr_value: Decimal, now: DateTime<Utc>) {
        self.atr_value = atr_value;
        self.recompute();
        self.last_updated = now;
    }

    /// Absolute price move since entry
    pub fn price_move(&self) -> Decimal {
        (self.current_price - self.entry_price).abs()
    }

    fn recompute(&mut self) {
        let price_move = self.price_move();

        self.atr_breach_multiple = if self.atr_value > Decimal::ZERO {
            price_move / self.atr_value
        } else {
            Decimal::ZERO
        };

        self.position_loss_pct = if self.entry_price > Decimal::ZERO {
            price_move / self.entry_price * dec!(100)
        } else {
            Decimal::ZERO
        };
    }
}
