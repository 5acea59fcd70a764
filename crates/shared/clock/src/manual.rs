use aegis_core::Timestamp;
use aegis_ports::Clock;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Clock frozen at a point in time, moved only by explicit calls
///
/// Shared as `Arc<ManualClock>` between the test and the components under
/// test so that advancing it is visible everywhere at once.
pub struct ManualClock {
    current_time: RwLock<Timestamp>,
}

impl ManualClock {
    /// Create a manual clock
    ///
    /// # Arguments
    /// * `initial_time` - Optional starting time. If None, uses current wall time.
    pub fn new(initial_time: Option<Timestamp>) -> Arc<Self> {
        Arc::new(Self {
            current_time: RwLock::new(initial_time.unwrap_or_else(Utc::now)),
        })
    }

    /// Move time forward
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current_time.write();
        *current += duration;
    }

    /// Move time forward by whole seconds
    pub fn advance_secs(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }

    /// Explicitly set the time
    ///
    /// Warning: This can move time backwards. Use with caution.
    pub fn set_time(&self, time: Timestamp) {
        *self.current_time.write() = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current_time.read()
    }
}
