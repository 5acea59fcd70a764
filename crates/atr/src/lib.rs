//! Aegis ATR Calculation Engine
//!
//! Computes Average True Range per symbol for the escalation manager:
//!
//! - **Calculator**: true range and Wilder-smoothed ATR over OHLC bars
//! - **Sources**: pluggable bar providers, tried in priority order
//! - **Engine**: fallback across sources, per-symbol caching
//! - **Static**: fixed ATR values supplied by configuration
//! - **Fallback**: chain of providers, first reading wins
//!
//! ```text
//! primary source ──► ok? ──► Wilder ATR ──► cache ──► AtrReading
//!       │ fail
//!       ▼
//! fallback source ──► ...
//! ```

pub mod calculator;
pub mod engine;
pub mod fallback;
pub mod source;
pub mod fixed;

pub use calculator::{Bar, true_range, wilder_atr};
pub use engine::{AtrEngine, AtrEngineConfig};
pub use fallback::FallbackAtrProvider;
pub use fixed::StaticAtrProvider;
pub use source::{BarSource, InMemoryBarSource};
