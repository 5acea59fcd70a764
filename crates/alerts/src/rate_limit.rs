//! Per-(priority, event type) cooldowns

use aegis_core::Timestamp;
use chrono::Duration;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};

use crate::alert::{Alert, AlertEventType, AlertPriority};

/// Cooldown per priority in seconds; zero disables limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub info_cooldown_secs: u64,
    pub warning_cooldown_secs: u64,
    pub critical_cooldown_secs: u64,
    pub emergency_cooldown_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            info_cooldown_secs: 60,
            warning_cooldown_secs: 30,
            critical_cooldown_secs: 10,
            emergency_cooldown_secs: 0,
        }
    }
}

impl RateLimitConfig {
    pub fn cooldown(&self, priority: AlertPriority) -> Duration {
        let secs = match priority {
            AlertPriority::Info => self.info_cooldown_secs,
            AlertPriority::Warning => self.warning_cooldown_secs,
            AlertPriority::Critical => self.critical_cooldown_secs,
            AlertPriority::Emergency => self.emergency_cooldown_secs,
        };
        Duration::seconds(secs as i64)
    }
}

/// Drops alerts that repeat a key inside its cooldown
pub struct RateLimiter {
    config: RateLimitConfig,
    last_sent: DashMap<(AlertPriority, AlertEventType), Timestamp>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            last_sent: DashMap::new(),
        }
    }

    /// Whether `alert` may go out at `now`; records the send when it may
    pub fn check(&self, alert: &Alert, now: Timestamp) -> bool {
        let cooldown = self.config.cooldown(alert.priority);
        if cooldown <= Duration::zero() {
            return true;
        }

        match self.last_sent.entry((alert.priority, alert.event_type)) {
            Entry::Occupied(mut last) => {
                if now - *last.get() < cooldown {
                    return false;
                }
                last.insert(now);
                true
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// Forget every recorded send
    pub fn reset(&self) {
        self.last_sent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn alert(priority: AlertPriority, event_type: AlertEventType) -> Alert {
        Alert::new(priority, event_type, "title", "message", Utc::now())
    }

    #[test]
    fn test_same_key_inside_cooldown_is_dropped() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let now = Utc::now();
        let a = alert(AlertPriority::Warning, AlertEventType::BreachDetected);

        assert!(limiter.check(&a, now));
        assert!(!limiter.check(&a, now + Duration::seconds(29)));
        assert!(limiter.check(&a, now + Duration::seconds(30)));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let now = Utc::now();

        assert!(limiter.check(&alert(AlertPriority::Info, AlertEventType::Escalation), now));
        assert!(limiter.check(&alert(AlertPriority::Info, AlertEventType::DeEscalation), now));
        assert!(limiter.check(&alert(AlertPriority::Warning, AlertEventType::Escalation), now));
    }

    #[test]
    fn test_emergency_is_never_limited() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        let now = Utc::now();
        let a = alert(AlertPriority::Emergency, AlertEventType::Escalation);

        for _ in 0..5 {
            assert!(limiter.check(&a, now));
        }
    }
}
