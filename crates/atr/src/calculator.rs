//! True range and ATR math

use aegis_core::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLC bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: Timestamp,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// True range of a bar given the previous close
///
/// `max(high - low, |high - prev_close|, |low - prev_close|)`
pub fn true_range(high: Decimal, low: Decimal, prev_close: Decimal) -> Decimal {
    let range = high - low;
    let up_gap = (high - prev_close).abs();
    let down_gap = (low - prev_close).abs();
    range.max(up_gap).max(down_gap)
}

/// Wilder-smoothed ATR over oldest-first bars
///
/// Needs `period + 1` bars (each true range looks at the previous close).
/// Seeds with the simple mean of the first `period` true ranges, then
/// applies `atr = (atr * (period - 1) + tr) / period` for the rest.
pub fn wilder_atr(bars: &[Bar], period: usize) -> Option<Decimal> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let ranges: Vec<Decimal> = bars
        .windows(2)
        .map(|pair| true_range(pair[1].high, pair[1].low, pair[0].close))
        .collect();

    let n = Decimal::from(period);
    let seed: Decimal = ranges[..period].iter().sum::<Decimal>() / n;

    let atr = ranges[period..]
        .iter()
        .fold(seed, |atr, tr| (atr * (n - Decimal::ONE) + tr) / n);

    Some(atr)
}
