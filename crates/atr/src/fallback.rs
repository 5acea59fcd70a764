//! Chain of ATR providers

use aegis_ports::{AtrError, AtrProvider, AtrReading};
use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

/// Asks each provider in turn; the first reading wins
#[derive(Default)]
pub struct FallbackAtrProvider {
    providers: Vec<Arc<dyn AtrProvider>>,
}

impl FallbackAtrProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn AtrProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

#[async_trait]
impl AtrProvider for FallbackAtrProvider {
    async fn calculate_atr(&self, symbol: &str) -> Result<AtrReading, AtrError> {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.calculate_atr(symbol).await {
                Ok(reading) => return Ok(reading),
                Err(e) => {
                    debug!("[ATR] Provider failed for {}, trying next: {}", symbol, e);
                    failures.push(e.to_string());
                }
            }
        }

        Err(AtrError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: if failures.is_empty() {
                "no providers configured".to_string()
            } else {
                failures.join("; ")
            },
        })
    }
}
