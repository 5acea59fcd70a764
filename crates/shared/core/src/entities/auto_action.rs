use serde::{Deserialize, Serialize};
use std::fmt;

/// Remedial operation that an escalation can trigger automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoActionKind {
    /// Tighten protective stops around the position
    TightenStops,
    /// Prepare an options roll for the position
    PrepRoll,
    /// Cut position size
    ReducePosition,
    /// Close the position at market
    ImmediateExit,
    /// Stop opening new risk system-wide
    EnterSafeMode,
}

impl AutoActionKind {
    pub const ALL: [AutoActionKind; 5] = [
        AutoActionKind::TightenStops,
        AutoActionKind::PrepRoll,
        AutoActionKind::ReducePosition,
        AutoActionKind::ImmediateExit,
        AutoActionKind::EnterSafeMode,
    ];

    /// Stable identifier used in configs, logs and audit records
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoActionKind::TightenStops => "tighten_stops",
            AutoActionKind::PrepRoll => "prep_roll",
            AutoActionKind::ReducePosition => "reduce_position",
            AutoActionKind::ImmediateExit => "immediate_exit",
            AutoActionKind::EnterSafeMode => "enter_safe_mode",
        }
    }
}

impl fmt::Display for AutoActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
