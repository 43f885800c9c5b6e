use tracing::Span;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Install the global subscriber: env-filtered, JSON-formatted so gate
/// decisions and monitor events land in the structured audit log.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init();
}

pub fn trace_gate_evaluation(decision_id: &Uuid) -> Span {
    tracing::info_span!(
        "gate_evaluation",
        decision_id = %decision_id,
    )
}

pub fn trace_consensus(asset: &str) -> Span {
    tracing::info_span!(
        "price_consensus",
        asset = asset,
    )
}
