//! Aegis Clock Infrastructure
//!
//! Time sources behind the [`Clock`] port:
//!
//! - [`SystemClock`]: wall-clock time for production
//! - [`ManualClock`]: frozen time that only moves when told to, for
//!   deterministic tests of delays, cooldowns and schedules
//!
//! ## Usage
//!
//! ```ignore
//! use aegis_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(None);
//! let start = clock.now();
//! clock.advance(Duration::seconds(300));
//! assert_eq!(clock.now() - start, Duration::seconds(300));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use aegis_ports::Clock;
