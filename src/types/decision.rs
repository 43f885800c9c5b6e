use serde::Serialize;
use uuid::Uuid;

/// Tri-state outcome of a safety gate evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Allow,
    /// All checks passed but confidence sits in the caution band; callers
    /// should reduce position size rather than block outright.
    Degraded,
    Block,
}

/// Combined decision from the trade safety gate. Computed fresh per
/// evaluation; persisted only to the structured audit log.
#[derive(Clone, Debug, Serialize)]
pub struct GateDecision {
    pub decision_id: Uuid,
    pub verdict: Verdict,
    /// Union of every failing reason across all three monitors. Never
    /// truncated to the first failure.
    pub reasons: Vec<String>,
    /// Lowest confidence score across the evaluated instruments, if any
    /// consensus evaluation ran.
    pub min_confidence: Option<f64>,
    pub decided_at_ms: u64,
}

impl GateDecision {
    pub fn allows_execution(&self) -> bool {
        matches!(self.verdict, Verdict::Allow | Verdict::Degraded)
    }
}
