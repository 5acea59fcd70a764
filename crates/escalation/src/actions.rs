//! Auto-action registry

use aegis_core::{AutoActionKind, ProtocolLevel, ProtocolLevelTable};
use aegis_ports::AutoAction;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{EscalationError, Result};

/// Typed registry of remedial actions, one per [`AutoActionKind`]
#[derive(Default, Clone)]
pub struct AutoActionRegistry {
    actions: HashMap<AutoActionKind, Arc<dyn AutoAction>>,
}

impl AutoActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under its kind
    ///
    /// Rejects a second registration for the same kind. Warns when no
    /// level in `table` enables the action, since it would never fire.
    pub fn register(
        &mut self,
        action: Arc<dyn AutoAction>,
        table: &ProtocolLevelTable,
    ) -> Result<()> {
        let kind = action.kind();
        if self.actions.contains_key(&kind) {
            return Err(EscalationError::DuplicateAction(kind));
        }

        let enabled_somewhere = ProtocolLevel::ALL
            .iter()
            .any(|level| table.get(*level).enabled_actions().contains(&kind));
        if !enabled_somewhere {
            warn!("[ESCALATION] Auto-action {} is not enabled at any level", kind);
        }

        info!("[ESCALATION] Registered auto-action {}", kind);
        self.actions.insert(kind, action);
        Ok(())
    }

    pub fn get(&self, kind: AutoActionKind) -> Option<&Arc<dyn AutoAction>> {
        self.actions.get(&kind)
    }

    pub fn contains(&self, kind: AutoActionKind) -> bool {
        self.actions.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
