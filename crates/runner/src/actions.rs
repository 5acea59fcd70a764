//! Default auto-actions
//!
//! No broker is attached to the autopilot, so each action records the
//! remedial step it stands for. Real executors replace these by
//! registering their own [`AutoAction`] for the same kind.

use aegis_core::{AutoActionKind, PositionRiskMetrics};
use aegis_ports::{AutoAction, AutoActionError};
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

pub struct LogAction(pub AutoActionKind);

impl LogAction {
    /// One logging action per kind
    pub fn all() -> Vec<Arc<dyn AutoAction>> {
        AutoActionKind::ALL
            .into_iter()
            .map(|kind| Arc::new(LogAction(kind)) as Arc<dyn AutoAction>)
            .collect()
    }
}

#[async_trait]
impl AutoAction for LogAction {
    fn kind(&self) -> AutoActionKind {
        self.0
    }

    async fn execute(&self, metrics: &PositionRiskMetrics) -> Result<(), AutoActionError> {
        warn!(
            "[ESCALATION] {} requested for {} ({}) at {} ({}x ATR, {}% loss)",
            self.0,
            metrics.position_id,
            metrics.symbol,
            metrics.current_price,
            metrics.atr_breach_multiple,
            metrics.position_loss_pct
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_action_per_kind() {
        let kinds: Vec<_> = LogAction::all().iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, AutoActionKind::ALL.to_vec());
    }
}
