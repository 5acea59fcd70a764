//! Bar data sources

use aegis_ports::AtrError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::calculator::Bar;

/// Provider of OHLC history for a symbol
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Source name, recorded on every reading it produces
    fn name(&self) -> &str;

    /// Most recent `count` bars, oldest first
    async fn bars(&self, symbol: &str, count: usize) -> Result<Vec<Bar>, AtrError>;
}

/// Bar source backed by an in-process map
///
/// Used for cached/replayed history and in tests.
pub struct InMemoryBarSource {
    name: String,
    bars: RwLock<HashMap<String, Vec<Bar>>>,
}

impl InMemoryBarSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bars: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the history of a symbol
    pub fn set_bars(&self, symbol: &str, bars: Vec<Bar>) {
        self.bars.write().insert(symbol.to_string(), bars);
    }

    /// Append one bar to a symbol's history
    pub fn push_bar(&self, symbol: &str, bar: Bar) {
        self.bars
            .write()
            .entry(symbol.to_string())
            .or_default()
            .push(bar);
    }
}

#[async_trait]
impl BarSource for InMemoryBarSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn bars(&self, symbol: &str, count: usize) -> Result<Vec<Bar>, AtrError> {
        let guard = self.bars.read();
        let history = guard.get(symbol).ok_or_else(|| AtrError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: format!("no history in {}", self.name),
        })?;

        let start = history.len().saturating_sub(count);
        Ok(history[start..].to_vec())
    }
}
