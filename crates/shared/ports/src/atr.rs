use aegis_core::Timestamp;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AtrError;

/// ATR value for a symbol and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrReading {
    pub symbol: String,
    pub atr: Decimal,
    /// Name of the data source that produced the value
    pub source: String,
    pub computed_at: Timestamp,
}

/// Port for the ATR calculation engine
#[async_trait]
pub trait AtrProvider: Send + Sync {
    /// Current Average True Range for a symbol
    async fn calculate_atr(&self, symbol: &str) -> Result<AtrReading, AtrError>;
}
