use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity tier for the monitored cost signal, in strictly increasing
/// order of severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Normal,
    Elevated,
    High,
    Critical,
}

impl CostTier {
    /// Whether trading may proceed at this tier. Elevated still trades,
    /// with a warning logged at the transition.
    pub fn trading_allowed(&self) -> bool {
        matches!(self, CostTier::Normal | CostTier::Elevated)
    }
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CostTier::Normal => "normal",
            CostTier::Elevated => "elevated",
            CostTier::High => "high",
            CostTier::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Single cost measurement. Immutable once created; retained in the
/// breaker's bounded window.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CostSample {
    pub timestamp_ms: u64,
    pub value: f64,
    pub tier: CostTier,
}

/// Emitted to subscribers whenever the breaker's tier changes.
#[derive(Clone, Debug, Serialize)]
pub struct TierChange {
    pub previous: CostTier,
    pub current: CostTier,
    pub sample: CostSample,
}
