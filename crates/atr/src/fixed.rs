//! Configuration-supplied ATR values

use aegis_ports::{AtrError, AtrProvider, AtrReading, Clock};
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// ATR provider serving fixed per-symbol values
pub struct StaticAtrProvider {
    values: DashMap<String, Decimal>,
    clock: Arc<dyn Clock>,
}

impl StaticAtrProvider {
    pub fn new(values: HashMap<String, Decimal>, clock: Arc<dyn Clock>) -> Self {
        Self {
            values: values.into_iter().collect(),
            clock,
        }
    }

    /// Set or replace the ATR of a symbol
    pub fn set_atr(&self, symbol: &str, atr: Decimal) {
        self.values.insert(symbol.to_string(), atr);
    }
}

#[async_trait]
impl AtrProvider for StaticAtrProvider {
    async fn calculate_atr(&self, symbol: &str) -> Result<AtrReading, AtrError> {
        let atr = self
            .values
            .get(symbol)
            .map(|v| *v)
            .ok_or_else(|| AtrError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no configured ATR".to_string(),
            })?;

        if atr <= Decimal::ZERO {
            return Err(AtrError::InvalidValue {
                symbol: symbol.to_string(),
                value: atr.to_string(),
            });
        }

        Ok(AtrReading {
            symbol: symbol.to_string(),
            atr,
            source: "static".to_string(),
            computed_at: self.clock.now(),
        })
    }
}
