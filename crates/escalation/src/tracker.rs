//! Position Risk Tracker
//!
//! Per-position metrics plus breach history. Owned exclusively by the
//! escalation manager; the breach condition is supplied by the caller
//! because it depends on the current protocol level.

use aegis_core::{AccountType, PositionId, PositionRiskMetrics, Price, Timestamp};
use chrono::Duration;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::{EscalationError, Result};

/// How a single observation changed the breach state of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreachChange {
    Detected,
    Resolved,
    Unchanged,
}

/// Result of feeding one observation into the tracker
#[derive(Debug, Clone)]
pub struct Observation {
    pub metrics: PositionRiskMetrics,
    pub change: BreachChange,
}

impl Observation {
    pub fn in_breach(&self) -> bool {
        self.metrics.in_breach
    }
}

#[derive(Debug, Clone)]
struct TrackedPosition {
    metrics: PositionRiskMetrics,
    /// Start of each breach episode, oldest first
    breach_history: Vec<Timestamp>,
    /// When the latest breach episode ended
    resolved_at: Option<Timestamp>,
}

impl TrackedPosition {
    fn observe(&mut self, breached: bool, now: Timestamp) -> BreachChange {
        let was_breached = self.metrics.in_breach;
        self.metrics.in_breach = breached;

        if breached {
            let change = if was_breached {
                BreachChange::Unchanged
            } else {
                self.breach_history.push(now);
                self.resolved_at = None;
                BreachChange::Detected
            };
            if let Some(first) = self.breach_history.first() {
                self.metrics.time_in_breach_secs = (now - *first).num_seconds();
            }
            change
        } else if was_breached {
            self.resolved_at = Some(now);
            BreachChange::Resolved
        } else {
            BreachChange::Unchanged
        }
    }
}

/// Map of monitored positions and their breach history
#[derive(Debug, Default)]
pub struct PositionRiskTracker {
    positions: HashMap<PositionId, TrackedPosition>,
}

impl PositionRiskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a position; replaces any previous record with the same id
    pub fn add_position(
        &mut self,
        position_id: &str,
        symbol: &str,
        account_type: AccountType,
        entry_price: Price,
        atr_value: Decimal,
        now: Timestamp,
    ) -> PositionRiskMetrics {
        let metrics = PositionRiskMetrics::new(
            position_id,
            symbol,
            account_type,
            entry_price,
            atr_value,
            now,
        );
        self.positions.insert(
            position_id.to_string(),
            TrackedPosition {
                metrics: metrics.clone(),
                breach_history: Vec::new(),
                resolved_at: None,
            },
        );
        metrics
    }

    /// Reprice a position and re-evaluate its breach state
    pub fn update_price(
        &mut self,
        position_id: &str,
        current_price: Price,
        is_breach: impl Fn(&PositionRiskMetrics) -> bool,
        now: Timestamp,
    ) -> Result<Observation> {
        let tracked = self.get_mut(position_id)?;
        tracked.metrics.apply_price(current_price, now);
        let breached = is_breach(&tracked.metrics);
        let change = tracked.observe(breached, now);

        Ok(Observation {
            metrics: tracked.metrics.clone(),
            change,
        })
    }

    /// Swap in a fresh ATR and re-evaluate at the last known price
    pub fn refresh_atr(
        &mut self,
        position_id: &str,
        atr_value: Decimal,
        is_breach: impl Fn(&PositionRiskMetrics) -> bool,
        now: Timestamp,
    ) -> Result<Observation> {
        let tracked = self.get_mut(position_id)?;
        tracked.metrics.apply_atr(atr_value, now);
        let breached = is_breach(&tracked.metrics);
        let change = tracked.observe(breached, now);

        Ok(Observation {
            metrics: tracked.metrics.clone(),
            change,
        })
    }

    /// Stop tracking; returns the final metrics if the position was present
    pub fn remove_position(&mut self, position_id: &str) -> Option<PositionRiskMetrics> {
        self.positions.remove(position_id).map(|t| t.metrics)
    }

    /// Clear breach history of positions resolved for at least `delay`
    ///
    /// Returns the ids whose history was cleared.
    pub fn clear_resolved(&mut self, delay: Duration, now: Timestamp) -> Vec<PositionId> {
        let mut cleared = Vec::new();
        for (id, tracked) in self.positions.iter_mut() {
            if tracked.metrics.in_breach {
                continue;
            }
            if let Some(resolved_at) = tracked.resolved_at
                && now - resolved_at >= delay
            {
                tracked.breach_history.clear();
                tracked.resolved_at = None;
                tracked.metrics.time_in_breach_secs = 0;
                cleared.push(id.clone());
            }
        }
        cleared
    }

    pub fn get(&self, position_id: &str) -> Option<&PositionRiskMetrics> {
        self.positions.get(position_id).map(|t| &t.metrics)
    }

    pub fn breach_history(&self, position_id: &str) -> Option<&[Timestamp]> {
        self.positions
            .get(position_id)
            .map(|t| t.breach_history.as_slice())
    }

    pub fn positions(&self) -> impl Iterator<Item = &PositionRiskMetrics> {
        self.positions.values().map(|t| &t.metrics)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn any_in_breach(&self) -> bool {
        self.positions.values().any(|t| t.metrics.in_breach)
    }

    pub fn breached_count(&self) -> usize {
        self.positions
            .values()
            .filter(|t| t.metrics.in_breach)
            .count()
    }

    /// Position with the largest ATR breach multiple
    pub fn worst_position(&self) -> Option<&PositionRiskMetrics> {
        self.positions
            .values()
            .map(|t| &t.metrics)
            .max_by(|a, b| a.atr_breach_multiple.cmp(&b.atr_breach_multiple))
    }

    /// Largest breach multiple and largest loss across all positions
    pub fn worst_metrics(&self) -> (Decimal, Decimal) {
        self.positions.values().fold(
            (Decimal::ZERO, Decimal::ZERO),
            |(multiple, loss), t| {
                (
                    multiple.max(t.metrics.atr_breach_multiple),
                    loss.max(t.metrics.position_loss_pct),
                )
            },
        )
    }

    fn get_mut(&mut self, position_id: &str) -> Result<&mut TrackedPosition> {
        self.positions
            .get_mut(position_id)
            .ok_or_else(|| EscalationError::PositionNotFound(position_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn atr_breach(m: &PositionRiskMetrics) -> bool {
        m.atr_breach_multiple >= dec!(1.0) || m.position_loss_pct >= dec!(5.0)
    }

    fn tracker_with_position(now: Timestamp) -> PositionRiskTracker {
        let mut tracker = PositionRiskTracker::new();
        tracker.add_position("pos-1", "SPY", AccountType::Cash, dec!(100), dec!(2), now);
        tracker
    }

    #[test]
    fn test_add_position_zeroed() {
        let now = Utc::now();
        let tracker = tracker_with_position(now);
        let m = tracker.get("pos-1").unwrap();

        assert_eq!(m.atr_value, dec!(2));
        assert!(!m.in_breach);
        assert!(tracker.breach_history("pos-1").unwrap().is_empty());
    }

    #[test]
    fn test_update_unknown_position_is_not_found() {
        let mut tracker = PositionRiskTracker::new();
        let result = tracker.update_price("ghost", dec!(1), atr_breach, Utc::now());
        assert_eq!(
            result.unwrap_err(),
            EscalationError::PositionNotFound("ghost".to_string())
        );
    }

    #[test]
    fn test_breach_detected_once() {
        let now = Utc::now();
        let mut tracker = tracker_with_position(now);

        let first = tracker.update_price("pos-1", dec!(103), atr_breach, now).unwrap();
        assert_eq!(first.change, BreachChange::Detected);
        assert!(first.in_breach());
        assert_eq!(first.metrics.atr_breach_multiple, dec!(1.5));
        assert_eq!(first.metrics.position_loss_pct, dec!(3));

        let second = tracker
            .update_price("pos-1", dec!(103.5), atr_breach, now + Duration::seconds(10))
            .unwrap();
        assert_eq!(second.change, BreachChange::Unchanged);
        assert_eq!(second.metrics.time_in_breach_secs, 10);
        assert_eq!(tracker.breach_history("pos-1").unwrap().len(), 1);
    }

    #[test]
    fn test_time_in_breach_spans_episodes_until_cleared() {
        let now = Utc::now();
        let mut tracker = tracker_with_position(now);

        tracker.update_price("pos-1", dec!(103), atr_breach, now).unwrap();
        let resolved = tracker
            .update_price("pos-1", dec!(100.5), atr_breach, now + Duration::seconds(20))
            .unwrap();
        assert_eq!(resolved.change, BreachChange::Resolved);
        // Frozen at the last breached observation
        assert_eq!(resolved.metrics.time_in_breach_secs, 0);

        // Re-breach before history is cleared keeps the first timestamp
        let again = tracker
            .update_price("pos-1", dec!(103), atr_breach, now + Duration::seconds(40))
            .unwrap();
        assert_eq!(again.change, BreachChange::Detected);
        assert_eq!(again.metrics.time_in_breach_secs, 40);
        assert_eq!(tracker.breach_history("pos-1").unwrap().len(), 2);
    }

    #[test]
    fn test_clear_resolved_respects_delay() {
        let now = Utc::now();
        let mut tracker = tracker_with_position(now);
        tracker.update_price("pos-1", dec!(103), atr_breach, now).unwrap();
        tracker
            .update_price("pos-1", dec!(100), atr_breach, now + Duration::seconds(5))
            .unwrap();

        let delay = Duration::seconds(60);
        assert!(tracker.clear_resolved(delay, now + Duration::seconds(64)).is_empty());

        let cleared = tracker.clear_resolved(delay, now + Duration::seconds(65));
        assert_eq!(cleared, vec!["pos-1".to_string()]);
        assert!(tracker.breach_history("pos-1").unwrap().is_empty());
        assert_eq!(tracker.get("pos-1").unwrap().time_in_breach_secs, 0);
    }

    #[test]
    fn test_refresh_atr_can_resolve_breach() {
        let now = Utc::now();
        let mut tracker = tracker_with_position(now);
        tracker.update_price("pos-1", dec!(103), atr_breach, now).unwrap();

        let observation = tracker.refresh_atr("pos-1", dec!(4), atr_breach, now).unwrap();
        assert_eq!(observation.metrics.atr_breach_multiple, dec!(0.75));
        assert_eq!(observation.change, BreachChange::Resolved);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut tracker = tracker_with_position(Utc::now());
        assert!(tracker.remove_position("pos-1").is_some());
        assert!(tracker.remove_position("pos-1").is_none());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_worst_metrics_across_positions() {
        let now = Utc::now();
        let mut tracker = tracker_with_position(now);
        tracker.add_position("pos-2", "QQQ", AccountType::Margin, dec!(50), dec!(5), now);

        tracker.update_price("pos-1", dec!(101), atr_breach, now).unwrap(); // 0.5x, 1%
        tracker.update_price("pos-2", dec!(47), atr_breach, now).unwrap(); // 0.6x, 6%

        assert_eq!(tracker.worst_metrics(), (dec!(0.6), dec!(6)));
        assert_eq!(tracker.worst_position().unwrap().position_id, "pos-2");
        assert_eq!(tracker.breached_count(), 1);
    }
}
