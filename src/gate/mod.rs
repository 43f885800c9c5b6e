use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};

use crate::breaker::{BreakerStatistics, CostCircuitBreaker};
use crate::config::GateConfig;
use crate::config::loader::AppConfig;
use crate::consensus::{PriceConsensusValidator, ValidatorStatistics};
use crate::error::Result;
use crate::health::{EndpointHealthMonitor, EndpointSelector, SelectedEndpoint};
use crate::health::selector::MonitorStatistics;
use crate::interfaces::{CostSource, EndpointProbe, PriceSource};
use crate::observability::metrics;
use crate::observability::tracing::trace_gate_evaluation;
use crate::types::cost::TierChange;
use crate::types::decision::{GateDecision, Verdict};
use crate::utils::helper::{current_timestamp_ms, generate_decision_id};
use crate::utils::task_supervisor::TaskSupervisor;

/// One instrument the caller intends to trade, with the raw spread it
/// observed (checked against the sanity bound when supplied).
#[derive(Clone, Debug)]
pub struct InstrumentCheck {
    pub asset: String,
    pub observed_spread_bps: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct GateContext {
    pub instruments: Vec<InstrumentCheck>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GateStatistics {
    pub endpoints: MonitorStatistics,
    pub breaker: BreakerStatistics,
    pub validator: ValidatorStatistics,
}

/// Composition root: one resilience context constructed at startup and
/// passed by reference to every consumer, replacing import-time
/// singletons. Owns the background monitor lifecycles.
pub struct TradeSafetyGate {
    monitor: Arc<EndpointHealthMonitor>,
    selector: Arc<EndpointSelector>,
    breaker: Arc<CostCircuitBreaker>,
    validator: Arc<PriceConsensusValidator>,
    config: GateConfig,
    supervisor: Mutex<TaskSupervisor>,
}

impl TradeSafetyGate {
    pub fn new(
        monitor: Arc<EndpointHealthMonitor>,
        selector: Arc<EndpointSelector>,
        breaker: Arc<CostCircuitBreaker>,
        validator: Arc<PriceConsensusValidator>,
        config: GateConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(TradeSafetyGate {
            monitor,
            selector,
            breaker,
            validator,
            config,
            supervisor: Mutex::new(TaskSupervisor::new()),
        })
    }

    /// Assemble the full context from validated configuration and the
    /// collaborator-supplied I/O implementations.
    pub fn from_config(
        config: &AppConfig,
        probe: Arc<dyn EndpointProbe>,
        cost_source: Arc<dyn CostSource>,
        price_sources: Vec<Arc<dyn PriceSource>>,
    ) -> Result<Self> {
        let monitor = Arc::new(EndpointHealthMonitor::new(
            config.endpoints.clone(),
            probe,
            config.monitor.clone(),
        )?);
        let selector = Arc::new(EndpointSelector::new(
            monitor.stats_handle(),
            config.monitor.selection_history_size,
        ));
        let breaker = Arc::new(CostCircuitBreaker::new(
            cost_source,
            config.breaker.clone(),
        )?);
        let validator = Arc::new(PriceConsensusValidator::new(
            price_sources,
            config.consensus.clone(),
        )?);

        Self::new(monitor, selector, breaker, validator, config.gate.clone())
    }

    /// Spawn the endpoint and cost monitoring loops.
    pub async fn start(&self) {
        let mut supervisor = self.supervisor.lock().await;

        let monitor = Arc::clone(&self.monitor);
        let shutdown = supervisor.shutdown_signal();
        supervisor.spawn("endpoint_health", async move {
            monitor.run(shutdown).await;
        });

        let breaker = Arc::clone(&self.breaker);
        let shutdown = supervisor.shutdown_signal();
        supervisor.spawn("cost_breaker", async move {
            breaker.run(shutdown).await;
        });

        info!("Trade safety gate started");
    }

    /// Stop the background loops; in-flight evaluations finish on their
    /// own snapshots.
    pub async fn shutdown(&self) {
        self.supervisor.lock().await.shutdown_all().await;
        info!("Trade safety gate stopped");
    }

    /// Returns an error if a background loop has died outside shutdown.
    pub async fn check_health(&self) -> Result<()> {
        self.supervisor.lock().await.check_health()
    }

    /// Run all three monitors against the context and combine them into
    /// one decision. Checks never short-circuit: a blocked decision
    /// carries the union of every failing reason.
    pub async fn evaluate(&self, context: &GateContext) -> GateDecision {
        let decision_id = generate_decision_id();
        let _span = trace_gate_evaluation(&decision_id).entered();

        let mut reasons = Vec::new();

        // Check 1: a live endpoint must be selectable
        if let Err(e) = self.selector.select_best() {
            reasons.push(e.to_string());
        }

        // Check 2: the cost breaker must report trading enabled
        if !self.breaker.is_trading_allowed() {
            let tier = self.breaker.current_tier();
            if self.breaker.kill_switch_armed() {
                reasons.push(format!("Kill-switch armed (cost tier {})", tier));
            } else {
                reasons.push(format!("Trading halted by cost breaker (tier {})", tier));
            }
        }

        // Check 3: consensus must hold for every instrument involved
        let validations = join_all(context.instruments.iter().map(|instrument| {
            self.validator
                .validate(&instrument.asset, instrument.observed_spread_bps)
        }))
        .await;

        let mut min_confidence: Option<f64> = None;
        for result in &validations {
            min_confidence = Some(match min_confidence {
                Some(current) => current.min(result.confidence_score),
                None => result.confidence_score,
            });
            if !result.valid {
                for reason in &result.reasoning {
                    reasons.push(format!("{}: {}", result.asset, reason));
                }
            }
        }

        let verdict = if !reasons.is_empty() {
            metrics::GATE_BLOCKED.inc();
            Verdict::Block
        } else if min_confidence.is_some_and(|c| c < self.config.degraded_confidence) {
            metrics::GATE_DEGRADED.inc();
            reasons.push(format!(
                "Minimum consensus confidence {:.1} below caution threshold {:.1}; reduce position size",
                min_confidence.unwrap_or(0.0),
                self.config.degraded_confidence
            ));
            Verdict::Degraded
        } else {
            Verdict::Allow
        };

        let decision = GateDecision {
            decision_id,
            verdict,
            reasons,
            min_confidence,
            decided_at_ms: current_timestamp_ms(),
        };

        // Structured audit record; decisions are not persisted anywhere
        // else.
        match serde_json::to_string(&decision) {
            Ok(json) => info!(target: "audit", decision = %json, "gate decision"),
            Err(e) => warn!("Failed to serialize gate decision: {}", e),
        }

        decision
    }

    pub fn is_trading_allowed(&self) -> bool {
        self.breaker.is_trading_allowed()
    }

    pub fn select_best_endpoint(&self) -> Result<SelectedEndpoint> {
        self.selector.select_best()
    }

    pub fn subscribe_tier_changes(&self) -> broadcast::Receiver<TierChange> {
        self.breaker.subscribe()
    }

    pub fn monitor(&self) -> &Arc<EndpointHealthMonitor> {
        &self.monitor
    }

    pub fn breaker(&self) -> &Arc<CostCircuitBreaker> {
        &self.breaker
    }

    pub fn validator(&self) -> &Arc<PriceConsensusValidator> {
        &self.validator
    }

    pub fn get_statistics(&self) -> GateStatistics {
        GateStatistics {
            endpoints: self.selector.get_statistics(),
            breaker: self.breaker.get_statistics(),
            validator: self.validator.get_statistics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use crate::config::{BreakerConfig, ConsensusConfig, MonitorConfig};
    use crate::error::{Error, RpcErrorKind};
    use crate::types::endpoint::EndpointConfig;
    use crate::types::quote::PriceQuote;

    struct StaticProbe {
        failing: StdMutex<bool>,
    }

    #[async_trait]
    impl EndpointProbe for StaticProbe {
        async fn latest_block(&self, endpoint: &EndpointConfig) -> Result<u64> {
            if *self.failing.lock().unwrap() {
                return Err(Error::Rpc {
                    endpoint: endpoint.name.clone(),
                    kind: RpcErrorKind::Connection,
                    message: "connection refused".into(),
                });
            }
            Ok(42)
        }
    }

    struct StaticCost {
        value: StdMutex<f64>,
    }

    #[async_trait]
    impl CostSource for StaticCost {
        async fn sample_cost(&self) -> Result<f64> {
            Ok(*self.value.lock().unwrap())
        }

        fn source_id(&self) -> &str {
            "static"
        }
    }

    struct StaticPrice {
        id: String,
        price: f64,
        confidence: f64,
    }

    #[async_trait]
    impl PriceSource for StaticPrice {
        async fn fetch_quote(&self, asset: &str) -> Result<PriceQuote> {
            Ok(PriceQuote {
                source_id: self.id.clone(),
                asset: asset.to_string(),
                price: self.price,
                timestamp_ms: current_timestamp_ms(),
                confidence: self.confidence,
                liquidity_usd: None,
                volume_24h_usd: None,
            })
        }

        fn source_id(&self) -> &str {
            &self.id
        }
    }

    struct Fixture {
        gate: TradeSafetyGate,
        probe: Arc<StaticProbe>,
        cost: Arc<StaticCost>,
    }

    fn fixture(prices: Vec<(&str, f64, f64)>) -> Fixture {
        let probe = Arc::new(StaticProbe {
            failing: StdMutex::new(false),
        });
        let cost = Arc::new(StaticCost {
            value: StdMutex::new(0.5),
        });

        let monitor = Arc::new(
            EndpointHealthMonitor::new(
                vec![EndpointConfig {
                    name: "primary".into(),
                    url: "https://primary.example.com".into(),
                    auth: None,
                }],
                Arc::clone(&probe) as Arc<dyn EndpointProbe>,
                MonitorConfig::default(),
            )
            .unwrap(),
        );
        let selector = Arc::new(EndpointSelector::new(monitor.stats_handle(), 100));
        let breaker = Arc::new(
            CostCircuitBreaker::new(
                Arc::clone(&cost) as Arc<dyn CostSource>,
                BreakerConfig::default(),
            )
            .unwrap(),
        );
        let sources: Vec<Arc<dyn PriceSource>> = prices
            .into_iter()
            .map(|(id, price, confidence)| {
                Arc::new(StaticPrice {
                    id: id.to_string(),
                    price,
                    confidence,
                }) as Arc<dyn PriceSource>
            })
            .collect();
        let validator =
            Arc::new(PriceConsensusValidator::new(sources, ConsensusConfig::default()).unwrap());

        let gate = TradeSafetyGate::new(
            monitor,
            selector,
            breaker,
            validator,
            GateConfig::default(),
        )
        .unwrap();

        Fixture {
            gate,
            probe,
            cost,
        }
    }

    fn context(asset: &str) -> GateContext {
        GateContext {
            instruments: vec![InstrumentCheck {
                asset: asset.to_string(),
                observed_spread_bps: None,
            }],
        }
    }

    #[tokio::test]
    async fn healthy_system_allows() {
        let f = fixture(vec![
            ("oracle", 100.0, 0.95),
            ("aggregator", 100.2, 0.9),
            ("dex", 99.9, 0.9),
        ]);
        f.gate.monitor().ping_all().await;
        f.gate.breaker().force_check().await.unwrap();

        let decision = f.gate.evaluate(&context("WETH")).await;
        assert_eq!(decision.verdict, Verdict::Allow, "reasons: {:?}", decision.reasons);
        assert!(decision.reasons.is_empty());
        assert!(decision.allows_execution());
    }

    #[tokio::test]
    async fn caution_band_confidence_degrades() {
        // Two agreeing but not unanimous sources keep confidence under
        // the 70 caution threshold while every hard check passes:
        // consensus 104, both quotes 3.85% out, no high-confidence source
        let f = fixture(vec![("oracle", 100.0, 0.8), ("dex", 108.0, 0.8)]);
        f.gate.monitor().ping_all().await;
        f.gate.breaker().force_check().await.unwrap();

        let decision = f.gate.evaluate(&context("WETH")).await;
        assert_eq!(decision.verdict, Verdict::Degraded, "reasons: {:?}", decision.reasons);
        assert!(decision.allows_execution());
        assert!(decision.min_confidence.unwrap() < 70.0);
    }

    #[tokio::test]
    async fn every_failing_monitor_is_cited() {
        let f = fixture(vec![("oracle", 100.0, 0.9), ("dex", 200.0, 0.9)]);

        // Endpoint down
        *f.probe.failing.lock().unwrap() = true;
        for _ in 0..5 {
            f.gate.monitor().ping_all().await;
        }
        // Cost critical
        *f.cost.value.lock().unwrap() = 5.0;
        f.gate.breaker().force_check().await.unwrap();

        let decision = f.gate.evaluate(&context("WETH")).await;
        assert_eq!(decision.verdict, Verdict::Block);
        assert!(!decision.allows_execution());
        assert!(decision.reasons.iter().any(|r| r.contains("No endpoints available")));
        assert!(decision.reasons.iter().any(|r| r.contains("Kill-switch")));
        assert!(decision.reasons.iter().any(|r| r.contains("WETH")));
    }

    #[tokio::test]
    async fn breaker_halt_blocks_even_with_good_prices() {
        let f = fixture(vec![("oracle", 100.0, 0.95), ("dex", 100.1, 0.9)]);
        f.gate.monitor().ping_all().await;

        *f.cost.value.lock().unwrap() = 2.5;
        f.gate.breaker().force_check().await.unwrap();

        let decision = f.gate.evaluate(&context("WETH")).await;
        assert_eq!(decision.verdict, Verdict::Block);
        assert!(decision.reasons.iter().any(|r| r.contains("cost breaker")));
    }

    #[tokio::test]
    async fn lifecycle_start_and_shutdown() {
        let f = fixture(vec![("oracle", 100.0, 0.95), ("dex", 100.1, 0.9)]);
        f.gate.start().await;
        assert!(f.gate.check_health().await.is_ok());
        f.gate.shutdown().await;
        assert_eq!(f.gate.supervisor.lock().await.active_task_count(), 0);
    }
}
