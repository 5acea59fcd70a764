//! Scalar aliases shared by every crate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Exact decimal so breach multiples and loss percentages never drift
pub type Price = Decimal;

pub type Timestamp = DateTime<Utc>;

/// Ticker the ATR is looked up by, e.g. "SPY"
pub type Symbol = String;

/// Caller-chosen key of a monitored position
pub type PositionId = String;
