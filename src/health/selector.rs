use dashmap::DashMap;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::observability::metrics;
use crate::types::endpoint::EndpointStats;
use crate::utils::helper::{alert_operations_team_critical, current_timestamp_ms};

/// The endpoint chosen for one outgoing call.
#[derive(Clone, Debug, Serialize)]
pub struct SelectedEndpoint {
    pub name: String,
    pub url: String,
    pub health_score: f64,
    pub latency_ms: f64,
    pub last_block_seen: u64,
}

/// Per-endpoint view included in statistics dumps.
#[derive(Clone, Debug, Serialize)]
pub struct EndpointReport {
    pub health_score: f64,
    pub latency_ms: f64,
    pub last_block_seen: u64,
    pub success_rate: f64,
    pub error_count: u64,
    pub success_count: u64,
    pub consecutive_failures: u32,
    pub available: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct MonitorStatistics {
    pub total_requests: u64,
    pub endpoints: HashMap<String, EndpointReport>,
    /// Percentage of recent selections served by each endpoint.
    pub selection_distribution: HashMap<String, f64>,
}

/// Chooses the best endpoint per request from the monitor's live stats.
///
/// Reads are lock-free against the shared table; only the bounded
/// selection history takes a mutex, and only on the write path.
pub struct EndpointSelector {
    stats: Arc<DashMap<String, EndpointStats>>,
    history: Mutex<VecDeque<String>>,
    history_size: usize,
    total_requests: AtomicU64,
}

impl EndpointSelector {
    pub fn new(stats: Arc<DashMap<String, EndpointStats>>, history_size: usize) -> Self {
        EndpointSelector {
            stats,
            history: Mutex::new(VecDeque::with_capacity(history_size)),
            history_size,
            total_requests: AtomicU64::new(0),
        }
    }

    /// Highest-scoring available endpoint.
    ///
    /// Total exhaustion is a hard error the caller must handle; it is
    /// never retried internally.
    pub fn select_best(&self) -> Result<SelectedEndpoint> {
        let now = current_timestamp_ms();

        let best = self
            .stats
            .iter()
            .filter(|s| s.available)
            .map(|s| {
                let score = s.health_score(now);
                (s.clone(), score)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let (stats, score) = match best {
            Some(found) => found,
            None => {
                error!("No endpoints available");
                alert_operations_team_critical("All network endpoints unavailable".to_string());
                return Err(Error::NoEndpointsAvailable);
            }
        };

        self.total_requests.fetch_add(1, Ordering::Relaxed);
        metrics::ENDPOINT_SELECTIONS.inc();
        self.record_selection(&stats.name);

        debug!(
            "Selected {}: health={:.1}, latency={:.1}ms, block={}",
            stats.name, score, stats.latency_ms, stats.last_block_seen
        );

        Ok(SelectedEndpoint {
            name: stats.name.clone(),
            url: stats.url.clone(),
            health_score: score,
            latency_ms: stats.latency_ms,
            last_block_seen: stats.last_block_seen,
        })
    }

    fn record_selection(&self, name: &str) {
        if let Ok(mut history) = self.history.lock() {
            if history.len() == self.history_size {
                history.pop_front();
            }
            history.push_back(name.to_string());
        }
    }

    /// Percentage of retained selections served by each endpoint.
    pub fn selection_distribution(&self) -> HashMap<String, f64> {
        let history = match self.history.lock() {
            Ok(history) => history,
            Err(_) => return HashMap::new(),
        };
        if history.is_empty() {
            return HashMap::new();
        }

        let total = history.len() as f64;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for name in history.iter() {
            *counts.entry(name.clone()).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|(name, count)| (name, count as f64 / total * 100.0))
            .collect()
    }

    /// Snapshot of selection totals and every endpoint's current view.
    /// Repeated calls with no intervening selections or pings return
    /// identical results.
    pub fn get_statistics(&self) -> MonitorStatistics {
        let now = current_timestamp_ms();
        let endpoints = self
            .stats
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    EndpointReport {
                        health_score: s.health_score(now),
                        latency_ms: s.latency_ms,
                        last_block_seen: s.last_block_seen,
                        success_rate: s.success_rate(),
                        error_count: s.error_count,
                        success_count: s.success_count,
                        consecutive_failures: s.consecutive_failures,
                        available: s.available,
                    },
                )
            })
            .collect();

        MonitorStatistics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            endpoints,
            selection_distribution: self.selection_distribution(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::endpoint::EndpointConfig;

    fn stats_entry(name: &str, latency_ms: f64, available: bool, now: u64) -> EndpointStats {
        let mut stats = EndpointStats::new(&EndpointConfig {
            name: name.to_string(),
            url: format!("https://{}.example.com", name),
            auth: None,
        });
        stats.latency_ms = latency_ms;
        stats.last_success_ts = now;
        stats.success_count = 50;
        stats.available = available;
        stats
    }

    fn table(entries: Vec<EndpointStats>) -> Arc<DashMap<String, EndpointStats>> {
        let map = DashMap::new();
        for entry in entries {
            map.insert(entry.name.clone(), entry);
        }
        Arc::new(map)
    }

    #[test]
    fn selects_highest_scoring_endpoint() {
        let now = current_timestamp_ms();
        let selector = EndpointSelector::new(
            table(vec![
                stats_entry("fast", 20.0, true, now),
                stats_entry("slow", 400.0, true, now),
            ]),
            1000,
        );

        let selected = selector.select_best().unwrap();
        assert_eq!(selected.name, "fast");
        assert!(selected.health_score > 0.0);
    }

    #[test]
    fn unavailable_endpoints_never_selected_while_alternatives_exist() {
        let now = current_timestamp_ms();
        let mut dead = stats_entry("dead", 5.0, false, now);
        dead.consecutive_failures = 5;
        let selector = EndpointSelector::new(
            table(vec![dead, stats_entry("alive", 450.0, true, now)]),
            1000,
        );

        for _ in 0..10 {
            assert_eq!(selector.select_best().unwrap().name, "alive");
        }
    }

    #[test]
    fn exhaustion_is_a_hard_error() {
        let now = current_timestamp_ms();
        let selector = EndpointSelector::new(
            table(vec![stats_entry("down", 10.0, false, now)]),
            1000,
        );
        assert!(matches!(
            selector.select_best(),
            Err(Error::NoEndpointsAvailable)
        ));
    }

    #[test]
    fn history_is_bounded() {
        let now = current_timestamp_ms();
        let selector =
            EndpointSelector::new(table(vec![stats_entry("only", 10.0, true, now)]), 5);

        for _ in 0..20 {
            selector.select_best().unwrap();
        }

        let history = selector.history.lock().unwrap();
        assert_eq!(history.len(), 5);
    }

    #[test]
    fn distribution_percentages_sum_to_100() {
        let now = current_timestamp_ms();
        let selector = EndpointSelector::new(
            table(vec![
                stats_entry("a", 10.0, true, now),
                stats_entry("b", 50.0, true, now),
            ]),
            1000,
        );

        for _ in 0..8 {
            selector.select_best().unwrap();
        }

        let total: f64 = selector.selection_distribution().values().sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn statistics_idempotent_without_new_samples() {
        let now = current_timestamp_ms();
        let selector = EndpointSelector::new(
            table(vec![stats_entry("a", 10.0, true, now)]),
            1000,
        );
        selector.select_best().unwrap();

        let first = selector.get_statistics();
        let second = selector.get_statistics();
        assert_eq!(first.total_requests, second.total_requests);
        assert_eq!(first.selection_distribution, second.selection_distribution);
        assert_eq!(
            first.endpoints.get("a").unwrap().success_count,
            second.endpoints.get("a").unwrap().success_count
        );
    }
}
