use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::BreakerConfig;
use crate::error::{Error, Result, RpcErrorKind};
use crate::interfaces::CostSource;
use crate::observability::metrics;
use crate::types::cost::{CostSample, CostTier, TierChange};
use crate::utils::helper::{alert_operations_team_critical, current_timestamp_ms};

const EVENT_CHANNEL_CAPACITY: usize = 64;

struct BreakerState {
    current_value: f64,
    /// Effective tier: pinned at Critical while the kill-switch is armed,
    /// regardless of what later samples classify as.
    current_tier: CostTier,
    history: VecDeque<CostSample>,
    total_checks: u64,
    tier_counts: [u64; 4],
    trading_stopped_count: u64,
    kill_switch_triggered_count: u64,
}

/// Statistics over the retained sample window. Idempotent: identical
/// results on repeated calls with no intervening samples.
#[derive(Clone, Debug, Serialize)]
pub struct BreakerStatistics {
    pub current_value: f64,
    pub current_tier: CostTier,
    pub trading_enabled: bool,
    pub kill_switch_armed: bool,
    pub total_checks: u64,
    pub tier_distribution: HashMap<String, f64>,
    pub trading_stopped_count: u64,
    pub kill_switch_triggered_count: u64,
    pub min_value: f64,
    pub avg_value: f64,
    pub max_value: f64,
}

/// Samples a scalar cost signal on a fixed interval, classifies it into
/// severity tiers against three strictly increasing thresholds, and gates
/// trading with hysteresis: escalation is automatic, but leaving Critical
/// takes an explicit reset.
pub struct CostCircuitBreaker {
    source: Arc<dyn CostSource>,
    config: BreakerConfig,
    state: Mutex<BreakerState>,
    trading_enabled: AtomicBool,
    kill_switch_armed: AtomicBool,
    events: broadcast::Sender<TierChange>,
}

impl CostCircuitBreaker {
    pub fn new(source: Arc<dyn CostSource>, config: BreakerConfig) -> Result<Self> {
        config.validate()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(CostCircuitBreaker {
            source,
            config,
            state: Mutex::new(BreakerState {
                current_value: 0.0,
                current_tier: CostTier::Normal,
                history: VecDeque::new(),
                total_checks: 0,
                tier_counts: [0; 4],
                trading_stopped_count: 0,
                kill_switch_triggered_count: 0,
            }),
            trading_enabled: AtomicBool::new(true),
            kill_switch_armed: AtomicBool::new(false),
            events,
        })
    }

    /// Observers receive a `TierChange` for every effective-tier
    /// transition, including the one produced by a kill-switch reset.
    pub fn subscribe(&self) -> broadcast::Receiver<TierChange> {
        self.events.subscribe()
    }

    pub fn classify(&self, value: f64) -> CostTier {
        if value >= self.config.critical_threshold {
            CostTier::Critical
        } else if value >= self.config.high_threshold {
            CostTier::High
        } else if value >= self.config.elevated_threshold {
            CostTier::Elevated
        } else {
            CostTier::Normal
        }
    }

    pub fn is_trading_allowed(&self) -> bool {
        self.trading_enabled.load(Ordering::SeqCst) && !self.kill_switch_armed.load(Ordering::SeqCst)
    }

    pub fn kill_switch_armed(&self) -> bool {
        self.kill_switch_armed.load(Ordering::SeqCst)
    }

    pub fn current_tier(&self) -> CostTier {
        match self.state.lock() {
            Ok(state) => state.current_tier,
            Err(_) => CostTier::Critical,
        }
    }

    /// Background loop: sample on the configured interval until shutdown.
    /// Sampling errors leave state unchanged.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.sample_interval);
        info!(
            "Cost monitoring started (every {:?}, thresholds {}/{}/{})",
            self.config.sample_interval,
            self.config.elevated_threshold,
            self.config.high_threshold,
            self.config.critical_threshold
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Cost monitoring stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sample().await {
                        warn!("Cost sample failed, state unchanged: {}", e);
                    }
                }
            }
        }
    }

    /// Fetch one cost value, classify it, and fold it into breaker state.
    pub async fn sample(&self) -> Result<CostSample> {
        let value = match tokio::time::timeout(
            self.config.sample_timeout,
            self.source.sample_cost(),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(Error::CostSample {
                    kind: RpcErrorKind::Timeout,
                    message: format!(
                        "{} exceeded {:?}",
                        self.source.source_id(),
                        self.config.sample_timeout
                    ),
                });
            }
        };

        Ok(self.apply_sample(value))
    }

    /// Immediate out-of-band sample, bypassing the interval.
    pub async fn force_check(&self) -> Result<CostSample> {
        self.sample().await
    }

    fn apply_sample(&self, value: f64) -> CostSample {
        let tier = self.classify(value);
        let sample = CostSample {
            timestamp_ms: current_timestamp_ms(),
            value,
            tier,
        };

        let change = {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };

            state.total_checks += 1;
            state.tier_counts[tier as usize] += 1;
            if state.history.len() == self.config.history_capacity {
                state.history.pop_front();
            }
            state.history.push_back(sample);
            state.current_value = value;

            let previous = state.current_tier;

            if tier == CostTier::Critical && !self.kill_switch_armed.swap(true, Ordering::SeqCst) {
                state.kill_switch_triggered_count += 1;
                alert_operations_team_critical(format!(
                    "Cost critical ({:.4}) - kill-switch armed",
                    value
                ));
            }

            // While armed, the effective tier is pinned at Critical.
            let effective = if self.kill_switch_armed.load(Ordering::SeqCst) {
                CostTier::Critical
            } else {
                tier
            };

            if effective != previous {
                if effective == CostTier::High {
                    state.trading_stopped_count += 1;
                }
                state.current_tier = effective;
                self.trading_enabled
                    .store(effective.trading_allowed(), Ordering::SeqCst);
                Some(TierChange {
                    previous,
                    current: effective,
                    sample,
                })
            } else {
                None
            }
        };

        metrics::COST_SAMPLES_TOTAL.inc();
        metrics::COST_TIER.set(self.current_tier() as i64);
        metrics::KILL_SWITCH_ARMED.set(self.kill_switch_armed() as i64);

        if let Some(change) = change {
            self.log_transition(&change);
            let _ = self.events.send(change);
        } else {
            debug!("Cost check: {:.4} ({})", value, tier);
        }

        sample
    }

    fn log_transition(&self, change: &TierChange) {
        match change.current {
            CostTier::Normal => info!(
                "Cost back to normal ({:.4}) - trading resumed",
                change.sample.value
            ),
            CostTier::Elevated if change.previous < CostTier::Elevated => warn!(
                "Cost elevated ({:.4}, threshold {})",
                change.sample.value, self.config.elevated_threshold
            ),
            CostTier::Elevated => info!("Cost decreased to elevated ({:.4})", change.sample.value),
            CostTier::High => warn!(
                "Cost high ({:.4}, threshold {}) - trading stopped",
                change.sample.value, self.config.high_threshold
            ),
            CostTier::Critical => warn!(
                "Cost critical ({:.4}, threshold {}) - kill-switch armed",
                change.sample.value, self.config.critical_threshold
            ),
        }
    }

    /// Clear the kill-switch after a critical cost event.
    ///
    /// Refused (returns false, state untouched) while the latest sample
    /// still classifies Critical; the switch never clears on its own.
    pub fn reset_kill_switch(&self) -> bool {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !self.kill_switch_armed.load(Ordering::SeqCst) {
            debug!("Kill-switch reset requested but switch is not armed");
            return true;
        }

        let latest_tier = state.history.back().map(|s| s.tier);
        if latest_tier == Some(CostTier::Critical) {
            warn!(
                "Cannot reset kill-switch: cost still critical ({:.4})",
                state.current_value
            );
            return false;
        }

        self.kill_switch_armed.store(false, Ordering::SeqCst);
        let restored = latest_tier.unwrap_or(CostTier::Normal);
        let previous = state.current_tier;
        state.current_tier = restored;
        self.trading_enabled
            .store(restored.trading_allowed(), Ordering::SeqCst);
        info!("Kill-switch manually reset, tier restored to {}", restored);

        metrics::COST_TIER.set(restored as i64);
        metrics::KILL_SWITCH_ARMED.set(0);

        if let Some(sample) = state.history.back().copied() {
            let _ = self.events.send(TierChange {
                previous,
                current: restored,
                sample,
            });
        }
        true
    }

    /// Samples newer than the given window.
    pub fn recent_history(&self, window: Duration) -> Vec<CostSample> {
        let cutoff = current_timestamp_ms().saturating_sub(window.as_millis() as u64);
        match self.state.lock() {
            Ok(state) => state
                .history
                .iter()
                .filter(|s| s.timestamp_ms >= cutoff)
                .copied()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn get_statistics(&self) -> BreakerStatistics {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };

        let tier_distribution = if state.total_checks == 0 {
            HashMap::new()
        } else {
            let total = state.total_checks as f64;
            [
                CostTier::Normal,
                CostTier::Elevated,
                CostTier::High,
                CostTier::Critical,
            ]
            .iter()
            .map(|tier| {
                (
                    tier.to_string(),
                    state.tier_counts[*tier as usize] as f64 / total * 100.0,
                )
            })
            .collect()
        };

        let (min_value, max_value, avg_value) = if state.history.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let min = state.history.iter().map(|s| s.value).fold(f64::MAX, f64::min);
            let max = state.history.iter().map(|s| s.value).fold(f64::MIN, f64::max);
            let sum: f64 = state.history.iter().map(|s| s.value).sum();
            (min, max, sum / state.history.len() as f64)
        };

        BreakerStatistics {
            current_value: state.current_value,
            current_tier: state.current_tier,
            trading_enabled: self.trading_enabled.load(Ordering::SeqCst),
            kill_switch_armed: self.kill_switch_armed.load(Ordering::SeqCst),
            total_checks: state.total_checks,
            tier_distribution,
            trading_stopped_count: state.trading_stopped_count,
            kill_switch_triggered_count: state.kill_switch_triggered_count,
            min_value,
            avg_value,
            max_value,
        }
    }
}
