use aegis_core::Timestamp;
use aegis_ports::Clock;
use chrono::Utc;

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_elapsed_since_past_instant() {
        let clock = SystemClock::new();
        let earlier = clock.now() - Duration::minutes(5);
        assert!(clock.elapsed_since(earlier) >= Duration::minutes(5));
    }

    #[test]
    fn test_elapsed_since_future_instant_is_zero() {
        let clock = SystemClock::new();
        let later = clock.now() + Duration::hours(1);
        assert_eq!(clock.elapsed_since(later), Duration::zero());
    }
}
