//! Autopilot
//!
//! Composition root: builds every component from one config and wires
//! them together.
//!
//! ```text
//! price updates ──► EscalationManager ──► broadcast ──► bridge ──┬──► MonitoringSystem.apply_level
//!                        ▲                                        └──► AlertSystem.notify
//!                        │
//!          MonitoringSystem tasks (ATR refresh, health, evaluate)
//! ```

use aegis_alerts::{AlertStats, AlertStatus, AlertSystem, LogTransport};
use aegis_atr::{AtrEngine, FallbackAtrProvider, InMemoryBarSource, StaticAtrProvider};
use aegis_core::{AccountType, EscalationEvent, PositionRiskMetrics, Price, ProtocolLevel};
use aegis_escalation::{EscalationManager, InMemoryAuditTrail, ProtocolStatus};
use aegis_monitoring::{
    MonitorError, MonitorStats, MonitoringSystem, TaskCategory, TaskTarget, callback_fn,
};
use aegis_ports::{AutoAction, Clock};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::config::AutopilotConfig;
use crate::error::{AutopilotError, Result};

/// Combined status of all components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutopilotStatus {
    pub protocol: ProtocolStatus,
    pub monitoring: MonitorStats,
    pub alerts: AlertStats,
}

pub struct Autopilot {
    config: AutopilotConfig,
    escalation: Arc<EscalationManager>,
    monitoring: Arc<MonitoringSystem>,
    alerts: Arc<AlertSystem>,
    bars: Arc<InMemoryBarSource>,
    fixed_atr: Arc<StaticAtrProvider>,
    audit: Arc<InMemoryAuditTrail>,
    /// Taken by `start`; subscribed at build so no event is missed
    events_rx: Mutex<Option<broadcast::Receiver<EscalationEvent>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Autopilot {
    /// Build every component; nothing runs until [`start`](Self::start)
    pub fn build(
        config: AutopilotConfig,
        clock: Arc<dyn Clock>,
        actions: Vec<Arc<dyn AutoAction>>,
    ) -> Result<Self> {
        config.validate()?;

        let bars = Arc::new(InMemoryBarSource::new("feed"));
        let engine =
            AtrEngine::new(config.atr.engine.clone(), clock.clone()).with_source(bars.clone());
        let fixed_atr = Arc::new(StaticAtrProvider::new(
            config.atr.fixed.clone().into_iter().collect(),
            clock.clone(),
        ));
        let atr = FallbackAtrProvider::new()
            .with_provider(Arc::new(engine))
            .with_provider(fixed_atr.clone());

        let audit = Arc::new(InMemoryAuditTrail::new(clock.clone()));
        let mut escalation = EscalationManager::new(
            config.escalation_config(),
            Arc::new(atr),
            audit.clone(),
            clock.clone(),
        )?;
        for action in actions {
            escalation.register_action(action)?;
        }
        let events_rx = escalation.subscribe();

        let monitoring = MonitoringSystem::new(config.monitoring_config(), clock.clone())?;
        let alerts =
            AlertSystem::from_config(config.alerts.clone(), Arc::new(LogTransport), clock)?;

        Ok(Self {
            config,
            escalation: Arc::new(escalation),
            monitoring,
            alerts: Arc::new(alerts),
            bars,
            fixed_atr,
            audit,
            events_rx: Mutex::new(Some(events_rx)),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Register system tasks, start the bridge and scheduler, seed positions
    pub async fn start(&self) -> Result<()> {
        let Some(events_rx) = self.events_rx.lock().take() else {
            return Err(AutopilotError::AlreadyStarted);
        };

        self.register_system_tasks()?;
        let bridge = self.spawn_bridge(events_rx);
        let scheduler = self.monitoring.start();
        self.handles.lock().extend([bridge, scheduler]);

        for seed in &self.config.positions {
            if let Err(e) = self
                .add_position(
                    &seed.position_id,
                    &seed.symbol,
                    seed.account_type,
                    seed.entry_price,
                )
                .await
            {
                error!("[ESCALATION] Skipping configured position {}: {}", seed.position_id, e);
            }
        }

        info!(
            "[ESCALATION] Autopilot started at {} with {} position(s)",
            self.escalation.current_level().await,
            self.escalation.positions().await.len()
        );
        Ok(())
    }

    /// Stop the scheduler and the event bridge
    pub fn shutdown(&self) {
        self.monitoring.shutdown();
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
        info!("[ESCALATION] Autopilot stopped");
    }

    // ========================================================================
    // Positions
    // ========================================================================

    /// Track a position and schedule its ATR refresh check
    pub async fn add_position(
        &self,
        position_id: &str,
        symbol: &str,
        account_type: AccountType,
        entry_price: Price,
    ) -> Result<PositionRiskMetrics> {
        let metrics = self
            .escalation
            .add_position(position_id, symbol, account_type, entry_price)
            .await?;

        let target = TaskTarget::Position(position_id.to_string());
        self.monitoring.unregister_target(&target);

        let name = format!("position-check:{}", position_id);
        let escalation = Arc::clone(&self.escalation);
        let id = position_id.to_string();
        let task_name = name.clone();
        self.monitoring.register(
            name,
            TaskCategory::PositionCheck,
            target,
            callback_fn(move || {
                let escalation = Arc::clone(&escalation);
                let id = id.clone();
                let task_name = task_name.clone();
                async move {
                    escalation
                        .refresh_atr(&id)
                        .await
                        .map(|_| ())
                        .map_err(|e| MonitorError::failed(task_name, e.to_string()))
                }
            }),
        )?;

        Ok(metrics)
    }

    pub async fn update_price(&self, position_id: &str, current_price: Price) -> Result<bool> {
        Ok(self.escalation.update_price(position_id, current_price).await?)
    }

    pub async fn remove_position(&self, position_id: &str) -> bool {
        self.monitoring
            .unregister_target(&TaskTarget::Position(position_id.to_string()));
        self.escalation.remove_position(position_id).await
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn escalation(&self) -> &Arc<EscalationManager> {
        &self.escalation
    }

    pub fn monitoring(&self) -> &Arc<MonitoringSystem> {
        &self.monitoring
    }

    pub fn alerts(&self) -> &Arc<AlertSystem> {
        &self.alerts
    }

    /// Bar feed behind the ATR engine
    pub fn bars(&self) -> &Arc<InMemoryBarSource> {
        &self.bars
    }

    /// Configured ATR values used when bars are missing
    pub fn fixed_atr(&self) -> &Arc<StaticAtrProvider> {
        &self.fixed_atr
    }

    pub fn audit(&self) -> &Arc<InMemoryAuditTrail> {
        &self.audit
    }

    pub async fn current_level(&self) -> ProtocolLevel {
        self.escalation.current_level().await
    }

    pub async fn status(&self) -> AutopilotStatus {
        AutopilotStatus {
            protocol: self.escalation.status().await,
            monitoring: self.monitoring.stats(),
            alerts: self.alerts.stats(),
        }
    }

    // ========================================================================
    // Wiring
    // ========================================================================

    fn register_system_tasks(&self) -> Result<()> {
        let escalation = Arc::clone(&self.escalation);
        self.monitoring.register(
            "risk-assessment",
            TaskCategory::RiskAssessment,
            TaskTarget::System,
            callback_fn(move || {
                let escalation = Arc::clone(&escalation);
                async move {
                    if let Some(event) = escalation.evaluate().await {
                        info!(
                            "[MONITOR] Risk assessment stepped down to {}",
                            event.to_level
                        );
                    }
                    Ok(())
                }
            }),
        )?;

        let escalation = Arc::clone(&self.escalation);
        self.monitoring.register(
            "health-check",
            TaskCategory::HealthCheck,
            TaskTarget::System,
            callback_fn(move || {
                let escalation = Arc::clone(&escalation);
                async move {
                    let status = escalation.status().await;
                    if status.breached_positions > 0 {
                        warn!(
                            "[MONITOR] {} of {} position(s) in breach at {}",
                            status.breached_positions, status.tracked_positions, status.level
                        );
                    } else {
                        debug!(
                            "[MONITOR] Healthy: {} position(s) at {} for {}s",
                            status.tracked_positions, status.level, status.time_at_level_secs
                        );
                    }
                    Ok(())
                }
            }),
        )?;

        Ok(())
    }

    /// Forward escalation events to monitoring and alerts
    fn spawn_bridge(&self, mut events_rx: broadcast::Receiver<EscalationEvent>) -> JoinHandle<()> {
        let escalation = Arc::clone(&self.escalation);
        let monitoring = Arc::clone(&self.monitoring);
        let alerts = Arc::clone(&self.alerts);

        tokio::spawn(async move {
            loop {
                match events_rx.recv().await {
                    Ok(event) => {
                        // Steps from concurrent updates may arrive out of order
                        if event.event_type.is_transition() {
                            monitoring.apply_level(escalation.current_level().await);
                        }

                        let alerts = Arc::clone(&alerts);
                        tokio::spawn(async move {
                            let result = alerts.notify(&event).await;
                            if result.status == AlertStatus::Failed {
                                warn!("[ALERT] No channel delivered {}", event.event_id);
                            }
                        });
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!("[MONITOR] Missed {} escalation event(s), resyncing level", missed);
                        monitoring.apply_level(escalation.current_level().await);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Drop for Autopilot {
    fn drop(&mut self) {
        self.monitoring.shutdown();
        for handle in self.handles.get_mut().drain(..) {
            handle.abort();
        }
    }
}
