//! Escalation Scenario Tests
//!
//! End-to-end flows through the escalation manager:
//! 1. Breach detection from price updates
//! 2. Stepwise escalation through every level
//! 3. Auto-action failures and timeouts
//! 4. System-wide de-escalation with hysteresis
//! 5. ATR sourced from bars through the ATR engine

use aegis_atr::{AtrEngine, AtrEngineConfig, Bar, InMemoryBarSource, StaticAtrProvider};
use aegis_clock::ManualClock;
use aegis_core::{
    AccountType, AutoActionKind, EscalationEventType, PositionRiskMetrics, ProtocolLevel,
};
use aegis_escalation::{EscalationConfig, EscalationManager, InMemoryAuditTrail};
use aegis_ports::{AuditSeverity, AutoAction, AutoActionError, Clock};
use async_trait::async_trait;
use chrono::Duration;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

struct Setup {
    manager: EscalationManager,
    clock: Arc<ManualClock>,
    audit: Arc<InMemoryAuditTrail>,
}

fn setup() -> Setup {
    let clock = ManualClock::new(None);
    let atr = StaticAtrProvider::new(
        HashMap::from([("SPY".to_string(), dec!(2)), ("QQQ".to_string(), dec!(5))]),
        clock.clone(),
    );
    let audit = Arc::new(InMemoryAuditTrail::new(clock.clone()));
    let manager = EscalationManager::new(
        EscalationConfig::default(),
        Arc::new(atr),
        audit.clone(),
        clock.clone(),
    )
    .unwrap();

    Setup {
        manager,
        clock,
        audit,
    }
}

/// Action that always fails
struct Broken(AutoActionKind);

#[async_trait]
impl AutoAction for Broken {
    fn kind(&self) -> AutoActionKind {
        self.0
    }

    async fn execute(&self, _metrics: &PositionRiskMetrics) -> Result<(), AutoActionError> {
        Err(AutoActionError::Failed("broker rejected".to_string()))
    }
}

/// Action that never finishes in time
struct Stuck(AutoActionKind);

#[async_trait]
impl AutoAction for Stuck {
    fn kind(&self) -> AutoActionKind {
        self.0
    }

    async fn execute(&self, _metrics: &PositionRiskMetrics) -> Result<(), AutoActionError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(())
    }
}

struct Succeeds(AutoActionKind);

#[async_trait]
impl AutoAction for Succeeds {
    fn kind(&self) -> AutoActionKind {
        self.0
    }

    async fn execute(&self, _metrics: &PositionRiskMetrics) -> Result<(), AutoActionError> {
        Ok(())
    }
}

/// Action that reads the position back through the manager
struct ReadsBack {
    manager: OnceLock<Weak<EscalationManager>>,
}

#[async_trait]
impl AutoAction for ReadsBack {
    fn kind(&self) -> AutoActionKind {
        AutoActionKind::TightenStops
    }

    async fn execute(&self, metrics: &PositionRiskMetrics) -> Result<(), AutoActionError> {
        let manager = self
            .manager
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| AutoActionError::Failed("manager gone".to_string()))?;
        manager
            .position(&metrics.position_id)
            .await
            .map(|_| ())
            .ok_or_else(|| AutoActionError::Failed("position gone".to_string()))
    }
}

#[tokio::test]
async fn test_breach_only_via_atr_at_normal() {
    let s = setup();
    s.manager
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();

    assert!(s.manager.update_price("pos-1", dec!(103)).await.unwrap());

    let position = s.manager.position("pos-1").await.unwrap();
    assert_eq!(position.atr_breach_multiple, dec!(1.5));
    assert_eq!(position.position_loss_pct, dec!(3));

    let detected = &s.manager.events_for_position("pos-1").await[0];
    assert_eq!(detected.event_type, EscalationEventType::BreachDetected);
    assert!(detected.trigger_reason.starts_with("ATR breach"));
}

#[tokio::test]
async fn test_consecutive_escalations_never_skip_a_level() {
    let s = setup();
    s.manager
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();

    // 1.5x, 2.5x, 3.5x, 4.5x ATR
    for price in [dec!(103), dec!(105), dec!(107), dec!(109)] {
        s.manager.update_price("pos-1", price).await.unwrap();
    }

    let escalations: Vec<_> = s
        .manager
        .events()
        .await
        .into_iter()
        .filter(|e| e.event_type == EscalationEventType::Escalation)
        .collect();

    assert_eq!(escalations.len(), 3);
    for (event, (from, to)) in escalations.iter().zip([
        (ProtocolLevel::Normal, ProtocolLevel::Enhanced),
        (ProtocolLevel::Enhanced, ProtocolLevel::Recovery),
        (ProtocolLevel::Recovery, ProtocolLevel::Preservation),
    ]) {
        assert_eq!(event.from_level, from);
        assert_eq!(event.to_level, to);
        assert!(event.success);
    }
    assert_eq!(s.manager.current_level().await, ProtocolLevel::Preservation);
}

#[tokio::test]
async fn test_loss_ladder_escalates_without_atr_breach() {
    let s = setup();
    s.manager
        .add_position("pos-1", "QQQ", AccountType::Margin, dec!(50))
        .await
        .unwrap();

    // 3/5 = 0.6x ATR but 6% loss against NORMAL's 5% limit
    assert!(s.manager.update_price("pos-1", dec!(47)).await.unwrap());
    assert_eq!(s.manager.current_level().await, ProtocolLevel::Enhanced);

    let escalation = s
        .manager
        .events()
        .await
        .into_iter()
        .find(|e| e.event_type == EscalationEventType::Escalation)
        .unwrap();
    assert!(escalation.trigger_reason.starts_with("Position loss"));
}

#[tokio::test]
async fn test_failing_auto_action_keeps_escalation_successful() {
    let mut s = setup();
    s.manager
        .register_action(Arc::new(Broken(AutoActionKind::TightenStops)))
        .unwrap();
    s.manager
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();

    s.manager.update_price("pos-1", dec!(103)).await.unwrap();

    let escalation = s
        .manager
        .events()
        .await
        .into_iter()
        .find(|e| e.event_type == EscalationEventType::Escalation)
        .unwrap();
    assert!(escalation.success);
    assert!(escalation.auto_actions_taken.is_empty());
    assert_eq!(s.manager.current_level().await, ProtocolLevel::Enhanced);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_auto_action_times_out() {
    let mut s = setup();
    s.manager
        .register_action(Arc::new(Stuck(AutoActionKind::PrepRoll)))
        .unwrap();
    s.manager
        .register_action(Arc::new(Succeeds(AutoActionKind::ReducePosition)))
        .unwrap();
    s.manager
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();

    // 2.5x ATR: NORMAL -> ENHANCED -> RECOVERY
    s.manager.update_price("pos-1", dec!(105)).await.unwrap();

    let recovery = s
        .manager
        .events()
        .await
        .into_iter()
        .find(|e| e.to_level == ProtocolLevel::Recovery)
        .unwrap();
    assert_eq!(recovery.auto_actions_taken, vec![AutoActionKind::ReducePosition]);
}

#[tokio::test]
async fn test_de_escalation_hysteresis() {
    let s = setup();
    s.manager
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();
    s.manager.update_price("pos-1", dec!(105)).await.unwrap();
    assert_eq!(s.manager.current_level().await, ProtocolLevel::Recovery);

    s.manager.update_price("pos-1", dec!(100)).await.unwrap();

    // RECOVERY waits 900s
    s.clock.advance_secs(899);
    assert!(s.manager.evaluate().await.is_none());
    s.clock.advance_secs(2);
    let first = s.manager.evaluate().await.unwrap();
    assert_eq!(first.to_level, ProtocolLevel::Enhanced);

    // ENHANCED then waits its own 300s from the transition
    s.clock.advance_secs(299);
    assert!(s.manager.evaluate().await.is_none());
    s.clock.advance_secs(2);
    let second = s.manager.evaluate().await.unwrap();
    assert_eq!(second.to_level, ProtocolLevel::Normal);

    assert!(s.manager.evaluate().await.is_none());
}

#[tokio::test]
async fn test_de_escalation_blocked_by_any_breached_position() {
    let s = setup();
    for (id, symbol, entry) in [("pos-1", "SPY", dec!(100)), ("pos-2", "QQQ", dec!(500))] {
        s.manager
            .add_position(id, symbol, AccountType::Cash, entry)
            .await
            .unwrap();
    }

    s.manager.update_price("pos-1", dec!(103)).await.unwrap();
    s.manager.update_price("pos-2", dec!(506)).await.unwrap(); // 1.2x ATR, 1.2% loss
    s.manager.update_price("pos-1", dec!(100)).await.unwrap();

    s.clock.advance(Duration::hours(1));
    assert!(s.manager.evaluate().await.is_none());
    assert_eq!(s.manager.current_level().await, ProtocolLevel::Enhanced);

    // Removing the breached position ends its breach; ENHANCED still waits 300s
    assert!(s.manager.remove_position("pos-2").await);
    assert!(s.manager.evaluate().await.is_none());
    s.clock.advance_secs(299);
    assert!(s.manager.evaluate().await.is_none());
    s.clock.advance_secs(2);
    assert!(s.manager.evaluate().await.is_some());
    assert_eq!(s.manager.current_level().await, ProtocolLevel::Normal);
}

#[tokio::test]
async fn test_removing_long_breached_position_restarts_delay() {
    let s = setup();
    s.manager
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();
    s.manager.update_price("pos-1", dec!(103)).await.unwrap();
    assert_eq!(s.manager.current_level().await, ProtocolLevel::Enhanced);

    s.clock.advance_secs(400);
    assert!(s.manager.update_price("pos-1", dec!(103.5)).await.unwrap());
    s.manager.remove_position("pos-1").await;

    assert!(s.manager.evaluate().await.is_none());
    assert_eq!(s.manager.current_level().await, ProtocolLevel::Enhanced);

    s.clock.advance_secs(301);
    let event = s.manager.evaluate().await.unwrap();
    assert_eq!(event.to_level, ProtocolLevel::Normal);
}

#[tokio::test]
async fn test_breach_history_cleared_after_delay() {
    let s = setup();
    s.manager
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();
    s.manager.update_price("pos-1", dec!(103)).await.unwrap();
    s.manager.update_price("pos-1", dec!(100)).await.unwrap();
    assert_eq!(s.manager.breach_history("pos-1").await.unwrap().len(), 1);

    s.clock.advance_secs(301);
    s.manager.evaluate().await;

    assert!(s.manager.breach_history("pos-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_every_event_is_audited() {
    let s = setup();
    s.manager
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();
    s.manager.update_price("pos-1", dec!(105)).await.unwrap();

    let records = s.audit.records();
    assert_eq!(records.len(), s.manager.events().await.len());
    assert_eq!(records[0].event_type, "breach_detected");
    assert_eq!(records[0].severity, AuditSeverity::Warning);
    assert_eq!(records.last().unwrap().severity, AuditSeverity::Critical);
}

#[tokio::test]
async fn test_atr_engine_feeds_positions() {
    let clock = ManualClock::new(None);
    let source = Arc::new(InMemoryBarSource::new("primary"));
    let start = clock.now();
    let bars: Vec<Bar> = (0..4)
        .map(|i| Bar {
            timestamp: start + Duration::days(i),
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100),
        })
        .collect();
    source.set_bars("SPY", bars);

    let engine = AtrEngine::new(
        AtrEngineConfig {
            period: 3,
            ..Default::default()
        },
        clock.clone(),
    )
    .with_source(source);

    let manager = EscalationManager::new(
        EscalationConfig::default(),
        Arc::new(engine),
        Arc::new(InMemoryAuditTrail::new(clock.clone())),
        clock.clone(),
    )
    .unwrap();

    let metrics = manager
        .add_position("pos-1", "SPY", AccountType::Retirement, dec!(100))
        .await
        .unwrap();
    assert_eq!(metrics.atr_value, dec!(2));
}

#[tokio::test(start_paused = true)]
async fn test_auto_action_can_call_back_into_manager() {
    let Setup { mut manager, .. } = setup();
    let action = Arc::new(ReadsBack {
        manager: OnceLock::new(),
    });
    manager.register_action(action.clone()).unwrap();
    let manager = Arc::new(manager);
    action.manager.set(Arc::downgrade(&manager)).unwrap();

    manager
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    manager.update_price("pos-1", dec!(103)).await.unwrap();
    assert!(started.elapsed() < std::time::Duration::from_secs(1));

    let escalation = manager
        .events()
        .await
        .into_iter()
        .find(|e| e.event_type == EscalationEventType::Escalation)
        .unwrap();
    assert_eq!(escalation.auto_actions_taken, vec![AutoActionKind::TightenStops]);
}
