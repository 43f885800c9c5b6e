use dashmap::DashMap;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{Error, Result, RpcErrorKind};
use crate::interfaces::EndpointProbe;
use crate::observability::metrics;
use crate::types::endpoint::{EndpointConfig, EndpointStats};
use crate::utils::helper::{alert_operations_team_warning, current_timestamp_ms};

/// Maintains a live view of every configured endpoint.
///
/// The background loop is the sole writer to the stats table; the
/// selector and any other reader work off cloned snapshots, so
/// `select_best()` stays O(1) network-wise no matter how often callers
/// hit it.
pub struct EndpointHealthMonitor {
    endpoints: Vec<EndpointConfig>,
    stats: Arc<DashMap<String, EndpointStats>>,
    probe: Arc<dyn EndpointProbe>,
    config: MonitorConfig,
}

impl EndpointHealthMonitor {
    pub fn new(
        endpoints: Vec<EndpointConfig>,
        probe: Arc<dyn EndpointProbe>,
        config: MonitorConfig,
    ) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::NoEndpointsConfigured);
        }
        config.validate()?;

        let stats = Arc::new(DashMap::new());
        for endpoint in &endpoints {
            stats.insert(endpoint.name.clone(), EndpointStats::new(endpoint));
            info!("Registered endpoint: {} ({})", endpoint.name, endpoint.url);
        }

        Ok(EndpointHealthMonitor {
            endpoints,
            stats,
            probe,
            config,
        })
    }

    /// Shared handle to the stats table, read by the selector.
    pub fn stats_handle(&self) -> Arc<DashMap<String, EndpointStats>> {
        Arc::clone(&self.stats)
    }

    /// Background loop: ping all endpoints concurrently on a fixed
    /// interval until the shutdown signal flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.ping_interval);
        info!(
            "Endpoint health monitoring started ({} endpoints, every {:?})",
            self.endpoints.len(),
            self.config.ping_interval
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Endpoint health monitoring stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.ping_all().await;
                }
            }
        }
    }

    /// Ping every endpoint concurrently. Unavailable endpoints keep being
    /// probed so a recovered endpoint returns to rotation.
    pub async fn ping_all(&self) {
        let pings = self.endpoints.iter().map(|endpoint| self.ping(endpoint));
        join_all(pings).await;

        let available = self.stats.iter().filter(|s| s.available).count();
        metrics::ENDPOINTS_AVAILABLE.set(available as i64);
    }

    /// Probe one endpoint and fold the outcome into its stats. Individual
    /// failures are absorbed here, never raised.
    async fn ping(&self, endpoint: &EndpointConfig) {
        metrics::PROBES_TOTAL.inc();
        let started = Instant::now();

        let outcome = match tokio::time::timeout(
            self.config.probe_timeout,
            self.probe.latest_block(endpoint),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Rpc {
                endpoint: endpoint.name.clone(),
                kind: RpcErrorKind::Timeout,
                message: format!("probe exceeded {:?}", self.config.probe_timeout),
            }),
        };

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(block_number) => {
                metrics::PROBE_LATENCY.observe(latency_ms / 1000.0);
                if let Some(mut stats) = self.stats.get_mut(&endpoint.name) {
                    stats.latency_ms = latency_ms;
                    stats.last_block_seen = block_number;
                    stats.last_success_ts = current_timestamp_ms();
                    stats.success_count += 1;
                    stats.consecutive_failures = 0;
                    if !stats.available {
                        info!("Endpoint {} recovered", endpoint.name);
                    }
                    stats.available = true;
                    debug!(
                        "{}: block={}, latency={:.1}ms",
                        endpoint.name, block_number, latency_ms
                    );
                }
            }
            Err(e) => {
                metrics::PROBE_FAILURES.inc();
                if let Some(mut stats) = self.stats.get_mut(&endpoint.name) {
                    stats.error_count += 1;
                    stats.consecutive_failures += 1;

                    if stats.consecutive_failures >= self.config.max_consecutive_failures {
                        if stats.available {
                            warn!(
                                "{} marked unavailable after {} consecutive failures: {}",
                                endpoint.name, stats.consecutive_failures, e
                            );
                            alert_operations_team_warning(format!(
                                "Endpoint {} unavailable: {}",
                                endpoint.name, e
                            ));
                        }
                        stats.available = false;
                    } else if transient_failure(&e) {
                        debug!(
                            "{} ping failed ({}): {}",
                            endpoint.name, stats.consecutive_failures, e
                        );
                    } else {
                        // Protocol-level failures are not expected to clear
                        // on their own; surface them before the cap trips.
                        warn!(
                            "{} ping failed ({}): {}",
                            endpoint.name, stats.consecutive_failures, e
                        );
                    }
                }
            }
        }
    }

    /// Query the latest block from every available endpoint at once.
    /// Returns the highest block and all individual responses, for
    /// detecting endpoints serving a stale tip.
    pub async fn highest_block(&self) -> (u64, Vec<u64>) {
        let queries = self
            .endpoints
            .iter()
            .filter(|e| self.stats.get(&e.name).map(|s| s.available).unwrap_or(false))
            .map(|endpoint| async move {
                match tokio::time::timeout(
                    self.config.probe_timeout,
                    self.probe.latest_block(endpoint),
                )
                .await
                {
                    Ok(Ok(block)) => Some(block),
                    _ => None,
                }
            });

        let blocks: Vec<u64> = join_all(queries).await.into_iter().flatten().collect();
        let highest = blocks.iter().copied().max().unwrap_or(0);
        (highest, blocks)
    }

    /// Cloned snapshot of every endpoint's stats, sorted by name.
    pub fn snapshot(&self) -> Vec<EndpointStats> {
        let mut all: Vec<EndpointStats> = self.stats.iter().map(|s| s.clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

fn transient_failure(e: &Error) -> bool {
    matches!(e, Error::Rpc { kind, .. } if kind.is_transient())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    struct ScriptedProbe {
        failing: AtomicBool,
        block: AtomicU64,
    }

    impl ScriptedProbe {
        fn new() -> Self {
            ScriptedProbe {
                failing: AtomicBool::new(false),
                block: AtomicU64::new(100),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl EndpointProbe for ScriptedProbe {
        async fn latest_block(&self, endpoint: &EndpointConfig) -> Result<u64> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::Rpc {
                    endpoint: endpoint.name.clone(),
                    kind: RpcErrorKind::Connection,
                    message: "connection refused".into(),
                });
            }
            Ok(self.block.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn endpoint(name: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.to_string(),
            url: format!("https://{}.example.com", name),
            auth: None,
        }
    }

    fn monitor(probe: Arc<ScriptedProbe>) -> EndpointHealthMonitor {
        EndpointHealthMonitor::new(
            vec![endpoint("primary")],
            probe,
            MonitorConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn zero_endpoints_is_fatal() {
        let result = EndpointHealthMonitor::new(
            vec![],
            Arc::new(ScriptedProbe::new()),
            MonitorConfig::default(),
        );
        assert!(matches!(result, Err(Error::NoEndpointsConfigured)));
    }

    #[tokio::test]
    async fn successful_ping_updates_stats() {
        let probe = Arc::new(ScriptedProbe::new());
        let monitor = monitor(Arc::clone(&probe));

        monitor.ping_all().await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.len(), 1);
        let stats = &snapshot[0];
        assert_eq!(stats.success_count, 1);
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.last_block_seen, 100);
        assert!(stats.available);
        assert!(stats.last_success_ts > 0);
    }

    #[tokio::test]
    async fn five_consecutive_failures_mark_unavailable() {
        let probe = Arc::new(ScriptedProbe::new());
        let monitor = monitor(Arc::clone(&probe));
        probe.set_failing(true);

        for _ in 0..4 {
            monitor.ping_all().await;
        }
        assert!(monitor.snapshot()[0].available);

        monitor.ping_all().await;
        let stats = &monitor.snapshot()[0];
        assert!(!stats.available);
        assert_eq!(stats.consecutive_failures, 5);
        assert_eq!(stats.health_score(current_timestamp_ms()), 0.0);
    }

    #[tokio::test]
    async fn endpoint_recovers_on_first_success() {
        let probe = Arc::new(ScriptedProbe::new());
        let monitor = monitor(Arc::clone(&probe));

        probe.set_failing(true);
        for _ in 0..5 {
            monitor.ping_all().await;
        }
        assert!(!monitor.snapshot()[0].available);

        probe.set_failing(false);
        monitor.ping_all().await;
        let stats = &monitor.snapshot()[0];
        assert!(stats.available);
        assert_eq!(stats.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn highest_block_across_endpoints() {
        let probe = Arc::new(ScriptedProbe::new());
        let monitor = EndpointHealthMonitor::new(
            vec![endpoint("a"), endpoint("b")],
            probe,
            MonitorConfig::default(),
        )
        .unwrap();

        monitor.ping_all().await;
        let (highest, blocks) = monitor.highest_block().await;
        assert_eq!(blocks.len(), 2);
        assert_eq!(highest, *blocks.iter().max().unwrap());
    }

    #[tokio::test]
    async fn run_loop_honors_shutdown() {
        let probe = Arc::new(ScriptedProbe::new());
        let monitor = Arc::new(EndpointHealthMonitor::new(
            vec![endpoint("primary")],
            probe,
            MonitorConfig {
                ping_interval: Duration::from_millis(10),
                ..Default::default()
            },
        )
        .unwrap());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = Arc::clone(&monitor);
        let handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor loop did not stop")
            .unwrap();
        assert!(monitor.snapshot()[0].success_count > 0);
    }
}
