use aegis_core::{AutoActionKind, PositionRiskMetrics};
use async_trait::async_trait;

use crate::error::AutoActionError;

/// Remedial operation run when the protocol escalates
///
/// Implementations are registered by [`AutoActionKind`] and receive the
/// metrics of the position that triggered the escalation.
#[async_trait]
pub trait AutoAction: Send + Sync {
    /// Which registry slot this action fills
    fn kind(&self) -> AutoActionKind;

    async fn execute(&self, metrics: &PositionRiskMetrics) -> Result<(), AutoActionError>;
}
