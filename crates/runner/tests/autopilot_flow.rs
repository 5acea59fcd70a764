//! Autopilot Flow Tests
//!
//! Full wiring from a JSON config:
//! 1. Price update escalates the protocol
//! 2. The bridge re-times monitoring and raises alerts
//! 3. Seeded positions and lifecycle guards

use aegis_alerts::AlertEventType;
use aegis_clock::ManualClock;
use aegis_core::{AccountType, ProtocolLevel};
use aegis_monitoring::{TaskCategory, TaskTarget};
use aegis_runner::{Autopilot, AutopilotError, LogAction, load_config_from_str};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = r#"{
    "monitoring": { "poll_interval_ms": 10 },
    "atr": { "fixed": { "SPY": "2" } }
}"#;

fn build(json: &str) -> (Autopilot, Arc<ManualClock>) {
    let clock = ManualClock::new(None);
    let config = load_config_from_str(json).unwrap();
    let autopilot = Autopilot::build(config, clock.clone(), LogAction::all()).unwrap();
    (autopilot, clock)
}

/// Poll until `check` holds or a second has passed
async fn eventually<F, Fut>(check: F) -> bool
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_escalation_retimes_monitoring_and_alerts() {
    let (autopilot, _clock) = build(CONFIG);
    autopilot.start().await.unwrap();
    autopilot
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();

    // 1.5x ATR at NORMAL
    assert!(autopilot.update_price("pos-1", dec!(103)).await.unwrap());
    assert_eq!(autopilot.current_level().await, ProtocolLevel::Enhanced);

    let monitoring = Arc::clone(autopilot.monitoring());
    assert!(
        eventually(|| {
            let monitoring = Arc::clone(&monitoring);
            async move { monitoring.current_level() == ProtocolLevel::Enhanced }
        })
        .await
    );

    let check = monitoring
        .tasks()
        .into_iter()
        .find(|t| t.category == TaskCategory::PositionCheck)
        .unwrap();
    assert_eq!(check.target, TaskTarget::Position("pos-1".to_string()));
    assert_eq!(check.frequency_secs, 60);

    let alerts = Arc::clone(autopilot.alerts());
    assert!(
        eventually(|| {
            let alerts = Arc::clone(&alerts);
            async move {
                alerts
                    .history()
                    .iter()
                    .any(|(alert, result)| {
                        alert.event_type == AlertEventType::Escalation && result.is_sent()
                    })
            }
        })
        .await
    );

    autopilot.shutdown();
}

#[tokio::test]
async fn test_seeded_positions_are_monitored() {
    let (autopilot, _clock) = build(
        r#"{
            "monitoring": { "poll_interval_ms": 10 },
            "atr": { "fixed": { "SPY": "2", "QQQ": "5" } },
            "positions": [
                { "position_id": "pos-1", "symbol": "SPY", "entry_price": "100" },
                { "position_id": "pos-2", "symbol": "QQQ", "account_type": "margin", "entry_price": "50" },
                { "position_id": "pos-3", "symbol": "IWM", "entry_price": "200" }
            ]
        }"#,
    );
    autopilot.start().await.unwrap();

    // IWM has no ATR source and is skipped
    let positions = autopilot.escalation().positions().await;
    let ids: Vec<_> = positions.iter().map(|p| p.position_id.as_str()).collect();
    assert_eq!(ids, vec!["pos-1", "pos-2"]);

    let checks = autopilot
        .monitoring()
        .tasks()
        .into_iter()
        .filter(|t| t.category == TaskCategory::PositionCheck)
        .count();
    assert_eq!(checks, 2);

    assert!(autopilot.remove_position("pos-2").await);
    let status = autopilot.status().await;
    assert_eq!(status.protocol.tracked_positions, 1);
    assert_eq!(status.monitoring.tasks, 3);

    autopilot.shutdown();
}

#[tokio::test]
async fn test_re_adding_position_keeps_one_check() {
    let (autopilot, _clock) = build(CONFIG);
    autopilot.start().await.unwrap();

    for entry in [dec!(100), dec!(101)] {
        autopilot
            .add_position("pos-1", "SPY", AccountType::Cash, entry)
            .await
            .unwrap();
    }

    let checks: Vec<_> = autopilot
        .monitoring()
        .tasks()
        .into_iter()
        .filter(|t| t.target == TaskTarget::Position("pos-1".to_string()))
        .collect();
    assert_eq!(checks.len(), 1);
    assert_eq!(
        autopilot.escalation().position("pos-1").await.unwrap().entry_price,
        dec!(101)
    );

    autopilot.shutdown();
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let (autopilot, _clock) = build(CONFIG);
    autopilot.start().await.unwrap();

    let err = autopilot.start().await.unwrap_err();
    assert!(matches!(err, AutopilotError::AlreadyStarted));

    autopilot.shutdown();
}

#[tokio::test]
async fn test_risk_assessment_steps_down_after_delay() {
    let (autopilot, clock) = build(CONFIG);
    autopilot.start().await.unwrap();
    autopilot
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();
    autopilot.update_price("pos-1", dec!(103)).await.unwrap();
    autopilot.update_price("pos-1", dec!(100)).await.unwrap();
    assert_eq!(autopilot.current_level().await, ProtocolLevel::Enhanced);

    let monitoring = Arc::clone(autopilot.monitoring());
    assert!(
        eventually(|| {
            let monitoring = Arc::clone(&monitoring);
            async move { monitoring.current_level() == ProtocolLevel::Enhanced }
        })
        .await
    );

    // ENHANCED waits 300s; the risk assessment task runs every 300s there
    clock.advance_secs(301);

    let escalation = Arc::clone(autopilot.escalation());
    assert!(
        eventually(|| {
            let escalation = Arc::clone(&escalation);
            async move { escalation.current_level().await == ProtocolLevel::Normal }
        })
        .await
    );

    autopilot.shutdown();
}

#[tokio::test]
async fn test_level_table_frequency_paces_position_checks() {
    let mut config = load_config_from_str(CONFIG).unwrap();
    config.protocol.enhanced.monitoring_frequency_secs = 5;
    let autopilot =
        Autopilot::build(config, ManualClock::new(None), LogAction::all()).unwrap();
    autopilot.start().await.unwrap();
    autopilot
        .add_position("pos-1", "SPY", AccountType::Cash, dec!(100))
        .await
        .unwrap();
    autopilot.update_price("pos-1", dec!(103)).await.unwrap();

    let monitoring = Arc::clone(autopilot.monitoring());
    assert!(
        eventually(|| {
            let monitoring = Arc::clone(&monitoring);
            async move { monitoring.current_level() == ProtocolLevel::Enhanced }
        })
        .await
    );

    let check = monitoring
        .tasks()
        .into_iter()
        .find(|t| t.category == TaskCategory::PositionCheck)
        .unwrap();
    assert_eq!(check.frequency_secs, 5);

    autopilot.shutdown();
}
