//! ATR engine with source fallback and caching

use aegis_ports::{AtrError, AtrProvider, AtrReading, Clock};
use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::calculator::wilder_atr;
use crate::source::BarSource;

/// Configuration for the ATR engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtrEngineConfig {
    /// Wilder smoothing period
    pub period: usize,
    /// Bars requested from each source (at least period + 1)
    pub history_bars: usize,
    /// How long a computed reading is reused (seconds)
    pub cache_ttl_secs: u64,
}

impl Default for AtrEngineConfig {
    fn default() -> Self {
        Self {
            period: 14,
            history_bars: 100,
            cache_ttl_secs: 300,
        }
    }
}

/// ATR calculation engine
///
/// Sources are tried in registration order; the first one yielding a
/// positive ATR wins.
pub struct AtrEngine {
    config: AtrEngineConfig,
    sources: Vec<Arc<dyn BarSource>>,
    cache: DashMap<String, AtrReading>,
    clock: Arc<dyn Clock>,
}

impl AtrEngine {
    pub fn new(config: AtrEngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            sources: Vec::new(),
            cache: DashMap::new(),
            clock,
        }
    }

    /// Append a source (lower priority than those already added)
    pub fn with_source(mut self, source: Arc<dyn BarSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Drop the cached reading for a symbol
    pub fn invalidate(&self, symbol: &str) {
        self.cache.remove(symbol);
    }

    fn cached(&self, symbol: &str) -> Option<AtrReading> {
        let reading = self.cache.get(symbol)?;
        let ttl = Duration::seconds(self.config.cache_ttl_secs as i64);
        (self.clock.elapsed_since(reading.computed_at) < ttl).then(|| reading.clone())
    }

    async fn from_source(
        &self,
        source: &dyn BarSource,
        symbol: &str,
    ) -> Result<AtrReading, AtrError> {
        let wanted = self.config.history_bars.max(self.config.period + 1);
        let bars = source.bars(symbol, wanted).await?;

        let atr = wilder_atr(&bars, self.config.period).ok_or_else(|| {
            AtrError::InsufficientHistory {
                symbol: symbol.to_string(),
                required: self.config.period + 1,
                available: bars.len(),
            }
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
            source: source.name().to_string(),
            computed_at: self.clock.now(),
        })
    }
}

#[async_trait]
impl AtrProvider for AtrEngine {
    async fn calculate_atr(&self, symbol: &str) -> Result<AtrReading, AtrError> {
        if let Some(reading) = self.cached(symbol) {
            return Ok(reading);
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match self.from_source(source.as_ref(), symbol).await {
                Ok(reading) => {
                    debug!(
                        "[ATR] {} = {} from {}",
                        symbol, reading.atr, reading.source
                    );
                    self.cache.insert(symbol.to_string(), reading.clone());
                    return Ok(reading);
                }
                Err(e) => {
                    warn!("[ATR] Source {} failed for {}: {}", source.name(), symbol, e);
                    failures.push(format!("{}: {}", source.name(), e));
                }
            }
        }

        Err(AtrError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: if failures.is_empty() {
                "no sources configured".to_string()
            } else {
                failures.join("; ")
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Bar;
    use crate::source::InMemoryBarSource;
    use aegis_clock::ManualClock;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn flat_bars(range: Decimal, count: usize) -> Vec<Bar> {
        let half = range / dec!(2);
        (0..count)
            .map(|_| Bar {
                timestamp: Utc::now(),
                open: dec!(100),
                high: dec!(100) + half,
                low: dec!(100) - half,
                close: dec!(100),
            })
            .collect()
    }

    fn config() -> AtrEngineConfig {
        AtrEngineConfig {
            period: 5,
            history_bars: 20,
            cache_ttl_secs: 60,
        }
    }

    #[tokio::test]
    async fn test_primary_source_wins() {
        let primary = Arc::new(InMemoryBarSource::new("primary"));
        primary.set_bars("SPY", flat_bars(dec!(2), 10));
        let backup = Arc::new(InMemoryBarSource::new("backup"));
        backup.set_bars("SPY", flat_bars(dec!(4), 10));

        let engine = AtrEngine::new(config(), ManualClock::new(None))
            .with_source(primary)
            .with_source(backup);

        let reading = engine.calculate_atr("SPY").await.unwrap();
        assert_eq!(reading.atr, dec!(2));
        assert_eq!(reading.source, "primary");
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_fails() {
        let primary = Arc::new(InMemoryBarSource::new("primary"));
        // Too short for a 5-period ATR
        primary.set_bars("SPY", flat_bars(dec!(2), 3));
        let backup = Arc::new(InMemoryBarSource::new("backup"));
        backup.set_bars("SPY", flat_bars(dec!(4), 10));

        let engine = AtrEngine::new(config(), ManualClock::new(None))
            .with_source(primary)
            .with_source(backup);

        let reading = engine.calculate_atr("SPY").await.unwrap();
        assert_eq!(reading.atr, dec!(4));
        assert_eq!(reading.source, "backup");
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_data_unavailable() {
        let primary = Arc::new(InMemoryBarSource::new("primary"));
        let engine = AtrEngine::new(config(), ManualClock::new(None)).with_source(primary);

        let err = engine.calculate_atr("SPY").await.unwrap_err();
        assert!(matches!(err, AtrError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_zero_atr_is_rejected() {
        let primary = Arc::new(InMemoryBarSource::new("primary"));
        primary.set_bars("SPY", flat_bars(dec!(0), 10));
        let engine = AtrEngine::new(config(), ManualClock::new(None)).with_source(primary);

        assert!(engine.calculate_atr("SPY").await.is_err());
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let clock = ManualClock::new(None);
        let primary = Arc::new(InMemoryBarSource::new("primary"));
        primary.set_bars("SPY", flat_bars(dec!(2), 10));
        let engine = AtrEngine::new(config(), clock.clone()).with_source(primary.clone());

        assert_eq!(engine.calculate_atr("SPY").await.unwrap().atr, dec!(2));

        // New history is ignored while cached
        primary.set_bars("SPY", flat_bars(dec!(6), 10));
        clock.advance_secs(30);
        assert_eq!(engine.calculate_atr("SPY").await.unwrap().atr, dec!(2));

        clock.advance_secs(31);
        assert_eq!(engine.calculate_atr("SPY").await.unwrap().atr, dec!(6));
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let primary = Arc::new(InMemoryBarSource::new("primary"));
        primary.set_bars("SPY", flat_bars(dec!(2), 10));
        let engine =
            AtrEngine::new(config(), ManualClock::new(None)).with_source(primary.clone());

        engine.calculate_atr("SPY").await.unwrap();
        primary.set_bars("SPY", flat_bars(dec!(3), 10));
        engine.invalidate("SPY");

        assert_eq!(engine.calculate_atr("SPY").await.unwrap().atr, dec!(3));
    }
}
