use aegis_core::Timestamp;
use chrono::Duration;

/// Source of "now" for every delay, cooldown and schedule
///
/// Production wires wall time; tests wire a clock that only moves when
/// advanced, so hysteresis and rate limits can be checked to the second.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Time since `earlier`, never negative
    ///
    /// A clock set backwards reads as zero elapsed rather than a negative
    /// span that would satisfy no delay.
    fn elapsed_since(&self, earlier: Timestamp) -> Duration {
        (self.now() - earlier).max(Duration::zero())
    }
}
