//! Escalation Manager
//!
//! Orchestrates the level manager and the position tracker:
//! - Evaluates the breach condition on every price update
//! - Walks the protocol level up one step at a time, running auto-actions
//! - De-escalates system-wide once every position has been quiet long enough
//! - Records every event (history, audit trail, broadcast)

use aegis_core::{
    AccountType, AutoActionKind, EscalationEvent, EscalationEventType, PositionRiskMetrics, Price,
    ProtocolLevel, ProtocolLevelTable, Timestamp,
};
use aegis_ports::{AtrProvider, AuditSeverity, AuditTrail, AutoAction, AutoActionError, Clock};
use chrono::Duration;
use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

use crate::actions::AutoActionRegistry;
use crate::error::{EscalationError, Result};
use crate::levels::ProtocolLevelManager;
use crate::tracker::{BreachChange, Observation, PositionRiskTracker};

/// Configuration for the Escalation Manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Per-level thresholds, frequencies and auto-actions
    pub protocol: ProtocolLevelTable,
    /// ATR multiple at or above which a position is in breach
    pub breach_atr_multiple: Decimal,
    /// Upper bound on a single auto-action run
    pub action_timeout_secs: u64,
    /// Buffered events per subscriber before it starts lagging
    pub event_channel_capacity: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolLevelTable::default(),
            breach_atr_multiple: dec!(1.0),
            action_timeout_secs: 10,
            event_channel_capacity: 1024,
        }
    }
}

impl EscalationConfig {
    pub fn validate(&self) -> Result<()> {
        self.protocol.validate()?;
        if self.breach_atr_multiple <= Decimal::ZERO {
            return Err(EscalationError::InvalidConfig(format!(
                "breach_atr_multiple must be positive, got {}",
                self.breach_atr_multiple
            )));
        }
        if self.action_timeout_secs == 0 {
            return Err(EscalationError::InvalidConfig(
                "action_timeout_secs must be non-zero".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(EscalationError::InvalidConfig(
                "event_channel_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Snapshot of the protocol state for status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolStatus {
    pub level: ProtocolLevel,
    pub level_since: Timestamp,
    pub time_at_level_secs: i64,
    pub monitoring_frequency_secs: u64,
    pub max_position_loss_pct: Decimal,
    pub tracked_positions: usize,
    pub breached_positions: usize,
    pub event_count: usize,
}

/// Level step already applied whose auto-actions have not run yet
struct PendingStep {
    event: EscalationEvent,
    metrics: PositionRiskMetrics,
}

/// Everything mutated by a price update, guarded by one lock
struct EscalationState {
    levels: ProtocolLevelManager,
    tracker: PositionRiskTracker,
    events: Vec<EscalationEvent>,
    last_breach_resolved_at: Option<Timestamp>,
}

/// Protocol escalation orchestrator
pub struct EscalationManager {
    config: EscalationConfig,
    state: Mutex<EscalationState>,
    registry: AutoActionRegistry,
    atr: Arc<dyn AtrProvider>,
    audit: Arc<dyn AuditTrail>,
    clock: Arc<dyn Clock>,
    events_tx: broadcast::Sender<EscalationEvent>,
}

impl EscalationManager {
    pub fn new(
        config: EscalationConfig,
        atr: Arc<dyn AtrProvider>,
        audit: Arc<dyn AuditTrail>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let levels = ProtocolLevelManager::new(
            config.protocol.clone(),
            config.breach_atr_multiple,
            clock.now(),
        );
        let (events_tx, _) = broadcast::channel(config.event_channel_capacity);

        Ok(Self {
            config,
            state: Mutex::new(EscalationState {
                levels,
                tracker: PositionRiskTracker::new(),
                events: Vec::new(),
                last_breach_resolved_at: None,
            }),
            registry: AutoActionRegistry::new(),
            atr,
            audit,
            clock,
            events_tx,
        })
    }

    /// Register a remedial action; one implementation per kind
    pub fn register_action(&mut self, action: Arc<dyn AutoAction>) -> Result<()> {
        self.registry.register(action, &self.config.protocol)
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    /// Receive every event recorded from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EscalationEvent> {
        self.events_tx.subscribe()
    }

    // ========================================================================
    // Positions
    // ========================================================================

    /// Start monitoring a position
    ///
    /// The ATR is fetched first; if it cannot be obtained the position is
    /// not tracked.
    pub async fn add_position(
        &self,
        position_id: &str,
        symbol: &str,
        account_type: AccountType,
        entry_price: Price,
    ) -> Result<PositionRiskMetrics> {
        let reading = self.atr.calculate_atr(symbol).await.map_err(|e| {
            error!("[ESCALATION] Cannot add {}: {}", position_id, e);
            EscalationError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            }
        })?;

        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let metrics = state.tracker.add_position(
            position_id,
            symbol,
            account_type,
            entry_price,
            reading.atr,
            now,
        );

        info!(
            "[ESCALATION] Tracking {} ({}) entry={} atr={} via {}",
            position_id, symbol, entry_price, reading.atr, reading.source
        );
        Ok(metrics)
    }

    /// Feed a new price; returns whether the position is in breach
    pub async fn update_price(&self, position_id: &str, current_price: Price) -> Result<bool> {
        let now = self.clock.now();
        let (in_breach, steps) = {
            let mut state = self.state.lock().await;

            let EscalationState {
                levels, tracker, ..
            } = &mut *state;
            let observation = tracker.update_price(
                position_id,
                current_price,
                |m| levels.is_breach(m.atr_breach_multiple, m.position_loss_pct),
                now,
            )?;

            self.process_observation(&mut state, observation, now)
        };

        self.complete_steps(steps).await;
        Ok(in_breach)
    }

    /// Re-fetch the ATR of a position and re-evaluate at its last price
    pub async fn refresh_atr(&self, position_id: &str) -> Result<bool> {
        let symbol = {
            let state = self.state.lock().await;
            state
                .tracker
                .get(position_id)
                .map(|m| m.symbol.clone())
                .ok_or_else(|| EscalationError::PositionNotFound(position_id.to_string()))?
        };

        let reading = self.atr.calculate_atr(&symbol).await.map_err(|e| {
            warn!("[ESCALATION] ATR refresh failed for {}: {}", position_id, e);
            EscalationError::DataUnavailable {
                symbol: symbol.clone(),
                reason: e.to_string(),
            }
        })?;

        let now = self.clock.now();
        let (in_breach, steps) = {
            let mut state = self.state.lock().await;

            let EscalationState {
                levels, tracker, ..
            } = &mut *state;
            let observation = tracker.refresh_atr(
                position_id,
                reading.atr,
                |m| levels.is_breach(m.atr_breach_multiple, m.position_loss_pct),
                now,
            )?;

            self.process_observation(&mut state, observation, now)
        };

        self.complete_steps(steps).await;
        Ok(in_breach)
    }

    /// Stop monitoring a position; removing an unknown id is a no-op
    ///
    /// Dropping a breached position ends its breach now, so the
    /// de-escalation delay starts from the removal.
    pub async fn remove_position(&self, position_id: &str) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let Some(metrics) = state.tracker.remove_position(position_id) else {
            return false;
        };

        if metrics.in_breach {
            state.last_breach_resolved_at = Some(now);
            info!("[ESCALATION] Stopped tracking {} while in breach", position_id);
        } else {
            info!("[ESCALATION] Stopped tracking {}", position_id);
        }
        true
    }

    // ========================================================================
    // Time-driven evaluation
    // ========================================================================

    /// Clear stale breach history and check for de-escalation
    ///
    /// Returns the de-escalation event, if one happened.
    pub async fn evaluate(&self) -> Option<EscalationEvent> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let delay = state.levels.current_level_config().de_escalation_delay();
        for id in state.tracker.clear_resolved(delay, now) {
            debug!("[ESCALATION] Cleared breach history of {}", id);
        }

        self.try_de_escalate(&mut state, now)
    }

    // ========================================================================
    // Operator overrides
    // ========================================================================

    /// Force the level up, possibly by several steps
    ///
    /// The target level's auto-actions run against the worst position.
    pub async fn manual_escalate(
        &self,
        level: ProtocolLevel,
        reason: &str,
    ) -> Result<EscalationEvent> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let from = state.levels.current_level();
        if !state.levels.escalate_to_level(level, now) {
            return Err(EscalationError::InvalidTransition { from, to: level });
        }
        warn!("[ESCALATION] Manual escalation {} -> {}: {}", from, level, reason);

        let Some(metrics) = state.tracker.worst_position().cloned() else {
            let event =
                EscalationEvent::system(EscalationEventType::Escalation, from, level, reason, now)
                    .with_metadata("source", "manual");
            self.record(&mut state, event.clone());
            return Ok(event);
        };
        drop(state);

        let event = EscalationEvent::for_position(
            EscalationEventType::Escalation,
            from,
            level,
            reason,
            &metrics,
            now,
        )
        .with_metadata("source", "manual");
        Ok(self.complete_step(PendingStep { event, metrics }).await)
    }

    /// Force the level down, possibly by several steps
    pub async fn manual_de_escalate(
        &self,
        level: ProtocolLevel,
        reason: &str,
    ) -> Result<EscalationEvent> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let from = state.levels.current_level();
        if !state.levels.de_escalate_to_level(level, now) {
            return Err(EscalationError::InvalidTransition { from, to: level });
        }
        warn!("[ESCALATION] Manual de-escalation {} -> {}: {}", from, level, reason);

        let event =
            EscalationEvent::system(EscalationEventType::DeEscalation, from, level, reason, now)
                .with_metadata("source", "manual");

        self.record(&mut state, event.clone());
        Ok(event)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn current_level(&self) -> ProtocolLevel {
        self.state.lock().await.levels.current_level()
    }

    pub async fn position(&self, position_id: &str) -> Option<PositionRiskMetrics> {
        self.state.lock().await.tracker.get(position_id).cloned()
    }

    pub async fn positions(&self) -> Vec<PositionRiskMetrics> {
        let state = self.state.lock().await;
        let mut positions: Vec<_> = state.tracker.positions().cloned().collect();
        positions.sort_by(|a, b| a.position_id.cmp(&b.position_id));
        positions
    }

    pub async fn breach_history(&self, position_id: &str) -> Option<Vec<Timestamp>> {
        let state = self.state.lock().await;
        state.tracker.breach_history(position_id).map(<[_]>::to_vec)
    }

    /// Full event history, oldest first
    pub async fn events(&self) -> Vec<EscalationEvent> {
        self.state.lock().await.events.clone()
    }

    pub async fn events_for_position(&self, position_id: &str) -> Vec<EscalationEvent> {
        self.state
            .lock()
            .await
            .events
            .iter()
            .filter(|e| e.position_id.as_deref() == Some(position_id))
            .cloned()
            .collect()
    }

    pub async fn status(&self) -> ProtocolStatus {
        let now = self.clock.now();
        let state = self.state.lock().await;
        let config = state.levels.current_level_config();

        ProtocolStatus {
            level: state.levels.current_level(),
            level_since: state.levels.last_transition(),
            time_at_level_secs: state.levels.time_at_level(now).num_seconds(),
            monitoring_frequency_secs: config.monitoring_frequency_secs,
            max_position_loss_pct: config.max_position_loss_pct,
            tracked_positions: state.tracker.len(),
            breached_positions: state.tracker.breached_count(),
            event_count: state.events.len(),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Emit breach events and apply level changes under the lock
    ///
    /// Returns the breach state and the escalation steps still waiting on
    /// their auto-actions.
    fn process_observation(
        &self,
        state: &mut EscalationState,
        observation: Observation,
        now: Timestamp,
    ) -> (bool, Vec<PendingStep>) {
        let level = state.levels.current_level();
        let metrics = &observation.metrics;

        match observation.change {
            BreachChange::Detected => {
                warn!(
                    "[ESCALATION] Breach detected on {}: {}x ATR, {}% loss",
                    metrics.position_id, metrics.atr_breach_multiple, metrics.position_loss_pct
                );
                let event = EscalationEvent::for_position(
                    EscalationEventType::BreachDetected,
                    level,
                    level,
                    breach_reason(metrics, &state.levels),
                    metrics,
                    now,
                );
                self.record(state, event);
            }
            BreachChange::Resolved => {
                info!("[ESCALATION] Breach resolved on {}", metrics.position_id);
                state.last_breach_resolved_at = Some(now);
                let event = EscalationEvent::for_position(
                    EscalationEventType::BreachResolved,
                    level,
                    level,
                    "Position back within limits",
                    metrics,
                    now,
                );
                self.record(state, event);
            }
            BreachChange::Unchanged => {}
        }

        let steps = if observation.in_breach() {
            self.try_escalate(state, metrics, now)
        } else {
            Vec::new()
        };
        self.try_de_escalate(state, now);

        (observation.in_breach(), steps)
    }

    /// Step the level up until it matches what the metrics indicate
    fn try_escalate(
        &self,
        state: &mut EscalationState,
        metrics: &PositionRiskMetrics,
        now: Timestamp,
    ) -> Vec<PendingStep> {
        let time_in_breach = Duration::seconds(metrics.time_in_breach_secs);
        let mut steps = Vec::new();

        while let Some(target) = state.levels.should_escalate(
            metrics.atr_breach_multiple,
            metrics.position_loss_pct,
            time_in_breach,
        ) {
            let from = state.levels.current_level();
            let Some(step) = from.next() else { break };
            if !state.levels.escalate_to_level(step, now) {
                break;
            }

            let reason = if state.levels.atr_target(metrics.atr_breach_multiple) >= step {
                format!("ATR breach {}x", metrics.atr_breach_multiple)
            } else {
                format!("Position loss {}%", metrics.position_loss_pct)
            };

            let event = EscalationEvent::for_position(
                EscalationEventType::Escalation,
                from,
                step,
                reason,
                metrics,
                now,
            )
            .with_metadata("target_level", target.as_str());
            steps.push(PendingStep {
                event,
                metrics: metrics.clone(),
            });
        }

        steps
    }

    /// Run each step's auto-actions outside the lock, then record it
    async fn complete_steps(&self, steps: Vec<PendingStep>) {
        for step in steps {
            self.complete_step(step).await;
        }
    }

    async fn complete_step(&self, mut step: PendingStep) -> EscalationEvent {
        step.event.auto_actions_taken =
            self.run_auto_actions(step.event.to_level, &step.metrics).await;

        let mut state = self.state.lock().await;
        self.record(&mut state, step.event.clone());
        step.event
    }

    /// One step down if no position is in breach and the delay has elapsed
    fn try_de_escalate(&self, state: &mut EscalationState, now: Timestamp) -> Option<EscalationEvent> {
        if state.tracker.any_in_breach() {
            return None;
        }

        let (multiple, loss) = state.tracker.worst_metrics();
        let since = match state.last_breach_resolved_at {
            Some(resolved) => resolved.max(state.levels.last_transition()),
            None => state.levels.last_transition(),
        };
        let quiet_for = now - since;

        let target = state.levels.should_de_escalate(multiple, loss, quiet_for)?;
        let from = state.levels.current_level();
        if !state.levels.de_escalate_to_level(target, now) {
            return None;
        }

        let mut event = EscalationEvent::system(
            EscalationEventType::DeEscalation,
            from,
            target,
            format!("No breach for {}s", quiet_for.num_seconds()),
            now,
        );
        event.atr_breach_multiple = multiple;
        event.position_loss_pct = loss;

        self.record(state, event.clone());
        Some(event)
    }

    /// Run the enabled actions of `level`; returns those that succeeded
    async fn run_auto_actions(
        &self,
        level: ProtocolLevel,
        metrics: &PositionRiskMetrics,
    ) -> Vec<AutoActionKind> {
        let timeout = std::time::Duration::from_secs(self.config.action_timeout_secs);
        let mut taken = Vec::new();

        for kind in self.config.protocol.get(level).enabled_actions() {
            let Some(action) = self.registry.get(kind) else {
                debug!("[ESCALATION] No action registered for {}", kind);
                continue;
            };

            let outcome = match tokio::time::timeout(timeout, action.execute(metrics)).await {
                Ok(result) => result,
                Err(_) => Err(AutoActionError::TimedOut(self.config.action_timeout_secs)),
            };

            match outcome {
                Ok(()) => {
                    info!("[ESCALATION] Auto-action {} done for {}", kind, metrics.position_id);
                    taken.push(kind);
                }
                Err(e) => {
                    error!(
                        "[ESCALATION] Auto-action {} failed for {}: {}",
                        kind, metrics.position_id, e
                    );
                }
            }
        }

        taken
    }

    /// Append to history, then audit and publish on a best-effort basis
    fn record(&self, state: &mut EscalationState, event: EscalationEvent) {
        state.events.push(event.clone());

        let severity = audit_severity(&event);
        match serde_json::to_value(&event) {
            Ok(data) => {
                if let Err(e) = self
                    .audit
                    .log_system_event(event.event_type.as_str(), data, severity)
                {
                    warn!("[ESCALATION] Audit write failed for {}: {}", event.event_id, e);
                }
            }
            Err(e) => warn!("[ESCALATION] Cannot serialize {}: {}", event.event_id, e),
        }

        if self.events_tx.send(event).is_err() {
            debug!("[ESCALATION] No event subscribers");
        }
    }
}

fn breach_reason(metrics: &PositionRiskMetrics, levels: &ProtocolLevelManager) -> String {
    if metrics.atr_breach_multiple >= levels.breach_atr_multiple() {
        format!("ATR breach {}x", metrics.atr_breach_multiple)
    } else {
        format!(
            "Position loss {}% >= {}%",
            metrics.position_loss_pct,
            levels.current_level_config().max_position_loss_pct
        )
    }
}

fn audit_severity(event: &EscalationEvent) -> AuditSeverity {
    match event.event_type {
        EscalationEventType::Escalation if event.to_level >= ProtocolLevel::Recovery => {
            AuditSeverity::Critical
        }
        EscalationEventType::Escalation | EscalationEventType::BreachDetected => {
            AuditSeverity::Warning
        }
        EscalationEventType::DeEscalation | EscalationEventType::BreachResolved => {
            AuditSeverity::Info
        }
    }
}
