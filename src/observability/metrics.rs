use lazy_static::lazy_static;
use prometheus::{Counter, Histogram, HistogramOpts, IntGauge, Registry};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Endpoint health metrics
    pub static ref PROBES_TOTAL: Counter = Counter::new(
        "endpoint_probes_total",
        "Total number of endpoint probes issued"
    ).unwrap();

    pub static ref PROBE_FAILURES: Counter = Counter::new(
        "endpoint_probe_failures_total",
        "Total number of failed endpoint probes"
    ).unwrap();

    pub static ref ENDPOINTS_AVAILABLE: IntGauge = IntGauge::new(
        "endpoints_available",
        "Number of endpoints currently marked available"
    ).unwrap();

    pub static ref ENDPOINT_SELECTIONS: Counter = Counter::new(
        "endpoint_selections_total",
        "Total number of best-endpoint selections served"
    ).unwrap();

    // Cost breaker metrics
    pub static ref COST_SAMPLES_TOTAL: Counter = Counter::new(
        "cost_samples_total",
        "Total number of cost samples taken"
    ).unwrap();

    pub static ref COST_TIER: IntGauge = IntGauge::new(
        "cost_tier",
        "Current cost tier (0=normal 1=elevated 2=high 3=critical)"
    ).unwrap();

    pub static ref KILL_SWITCH_ARMED: IntGauge = IntGauge::new(
        "kill_switch_armed",
        "Whether the cost kill-switch is armed"
    ).unwrap();

    // Consensus metrics
    pub static ref VALIDATIONS_TOTAL: Counter = Counter::new(
        "price_validations_total",
        "Total number of price consensus validations"
    ).unwrap();

    pub static ref VALIDATIONS_FAILED: Counter = Counter::new(
        "price_validations_failed_total",
        "Total number of failed price consensus validations"
    ).unwrap();

    // Gate metrics
    pub static ref GATE_BLOCKED: Counter = Counter::new(
        "gate_blocked_total",
        "Total number of blocked gate evaluations"
    ).unwrap();

    pub static ref GATE_DEGRADED: Counter = Counter::new(
        "gate_degraded_total",
        "Total number of degraded gate evaluations"
    ).unwrap();

    // Latency metrics
    pub static ref PROBE_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "endpoint_probe_latency_seconds",
            "Endpoint probe round-trip latency"
        ).buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 3.0])
    ).unwrap();
}

pub fn register_metrics() {
    REGISTRY.register(Box::new(PROBES_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(PROBE_FAILURES.clone())).unwrap();
    REGISTRY.register(Box::new(ENDPOINTS_AVAILABLE.clone())).unwrap();
    REGISTRY.register(Box::new(ENDPOINT_SELECTIONS.clone())).unwrap();
    REGISTRY.register(Box::new(COST_SAMPLES_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(COST_TIER.clone())).unwrap();
    REGISTRY.register(Box::new(KILL_SWITCH_ARMED.clone())).unwrap();
    REGISTRY.register(Box::new(VALIDATIONS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(VALIDATIONS_FAILED.clone())).unwrap();
    REGISTRY.register(Box::new(GATE_BLOCKED.clone())).unwrap();
    REGISTRY.register(Box::new(GATE_DEGRADED.clone())).unwrap();
    REGISTRY.register(Box::new(PROBE_LATENCY.clone())).unwrap();
}
