use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::ConsensusConfig;
use crate::error::Result;
use crate::interfaces::PriceSource;
use crate::observability::metrics;
use crate::observability::tracing::trace_consensus;
use crate::types::quote::{ConsensusResult, PriceQuote};
use crate::utils::helper::current_timestamp_ms;

#[derive(Default)]
struct Counters {
    performed: u64,
    passed: u64,
    failed: u64,
    suspicious_spreads_rejected: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ValidatorStatistics {
    pub validations_performed: u64,
    pub validations_passed: u64,
    pub validations_failed: u64,
    pub pass_rate: f64,
    pub suspicious_spreads_rejected: u64,
}

/// Decides whether a price is trustworthy enough to act on by comparing
/// quotes from independent sources.
///
/// Low-confidence sources cannot anchor the consensus: the consensus
/// price is weighted by each source's confidence, so a bad quote from a
/// weak source shows up as deviation instead of dragging the average.
pub struct PriceConsensusValidator {
    sources: Vec<Arc<dyn PriceSource>>,
    config: ConsensusConfig,
    counters: Mutex<Counters>,
}

impl PriceConsensusValidator {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, config: ConsensusConfig) -> Result<Self> {
        config.validate()?;
        Ok(PriceConsensusValidator {
            sources,
            config,
            counters: Mutex::new(Counters::default()),
        })
    }

    /// Query every source concurrently, each under its own timeout. A
    /// failing or slow source only costs its own quote; insufficiency is
    /// judged later by `evaluate_price`.
    pub async fn gather_quotes(&self, asset: &str) -> Vec<PriceQuote> {
        let fetches = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let asset = asset.to_string();
            let timeout = self.config.fetch_timeout;
            async move {
                match tokio::time::timeout(timeout, source.fetch_quote(&asset)).await {
                    Ok(Ok(quote)) => Some(quote),
                    Ok(Err(e)) => {
                        warn!("Price source {} failed: {}", source.source_id(), e);
                        None
                    }
                    Err(_) => {
                        warn!(
                            "Price source {} timed out after {:?}",
                            source.source_id(),
                            timeout
                        );
                        None
                    }
                }
            }
        });

        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// Gather quotes for the asset and evaluate them in one call.
    pub async fn validate(&self, asset: &str, observed_spread_bps: Option<f64>) -> ConsensusResult {
        let quotes = self.gather_quotes(asset).await;
        self.evaluate_price(asset, quotes, observed_spread_bps)
    }

    /// Evaluate a quote set against the consensus rules.
    ///
    /// Every rule is checked and every failure appended to the reasoning;
    /// evaluation never stops at the first failure, so operators see the
    /// complete picture from a single run.
    pub fn evaluate_price(
        &self,
        asset: &str,
        quotes: Vec<PriceQuote>,
        observed_spread_bps: Option<f64>,
    ) -> ConsensusResult {
        let _span = trace_consensus(asset).entered();
        let now = current_timestamp_ms();
        let staleness_ms = self.config.staleness_window.as_millis() as u64;

        let mut reasoning = Vec::new();
        let mut usable = Vec::with_capacity(quotes.len());
        for quote in quotes {
            let age_ms = now.saturating_sub(quote.timestamp_ms);
            if age_ms > staleness_ms {
                debug!(
                    "Excluding stale quote from {} ({}s old)",
                    quote.source_id,
                    age_ms / 1000
                );
                reasoning.push(format!(
                    "Excluded stale quote from {} ({}s old)",
                    quote.source_id,
                    age_ms / 1000
                ));
            } else {
                usable.push(quote);
            }
        }

        // Hard floor: too few usable quotes invalidates the result no
        // matter how well the survivors agree.
        let total_weight: f64 = usable.iter().map(|q| q.confidence).sum();
        if usable.len() < self.config.min_sources || total_weight <= 0.0 {
            reasoning.push(format!(
                "Insufficient price sources ({} usable, need {}+)",
                usable.len(),
                self.config.min_sources
            ));
            let result = ConsensusResult {
                asset: asset.to_string(),
                consensus_price: 0.0,
                max_deviation_pct: 0.0,
                sources_agreed: 0,
                sources_total: usable.len(),
                confidence_score: 0.0,
                valid: false,
                reasoning,
                quotes: usable,
            };
            self.finish(&result);
            return result;
        }

        let consensus_price =
            usable.iter().map(|q| q.price * q.confidence).sum::<f64>() / total_weight;

        let deviations: Vec<f64> = usable
            .iter()
            .map(|q| (q.price - consensus_price).abs() / consensus_price * 100.0)
            .collect();
        let max_deviation = deviations.iter().copied().fold(0.0, f64::max);

        let sources_agreed = deviations
            .iter()
            .filter(|d| **d <= self.config.agreement_band_pct)
            .count();

        // Confidence blend: agreement 40, inverse deviation 30, source
        // count 20, high-confidence fraction 10.
        let n = usable.len() as f64;
        let agreement_factor = sources_agreed as f64 / n * 40.0;
        let deviation_factor = ((self.config.max_deviation_pct - max_deviation)
            / self.config.max_deviation_pct
            * 30.0)
            .max(0.0);
        let count_factor = (n / 5.0).min(1.0) * 20.0;
        let high_confidence_factor =
            usable.iter().filter(|q| q.is_high_confidence()).count() as f64 / n * 10.0;
        let confidence_score =
            agreement_factor + deviation_factor + count_factor + high_confidence_factor;

        let mut valid = true;

        if max_deviation > self.config.max_deviation_pct {
            valid = false;
            reasoning.push(format!(
                "High price deviation ({:.1}% > {:.1}%)",
                max_deviation, self.config.max_deviation_pct
            ));
        }

        if sources_agreed < self.config.min_sources {
            valid = false;
            reasoning.push(format!(
                "Low consensus (only {}/{} sources agree)",
                sources_agreed,
                usable.len()
            ));
        }

        if confidence_score < self.config.min_confidence {
            valid = false;
            reasoning.push(format!(
                "Low confidence score ({:.1}/100)",
                confidence_score
            ));
        }

        if let Some(spread_bps) = observed_spread_bps {
            if spread_bps > self.config.max_spread_bps {
                valid = false;
                reasoning.push(format!(
                    "Suspiciously large spread ({:.0} BPS > {:.0})",
                    spread_bps, self.config.max_spread_bps
                ));
                if let Ok(mut counters) = self.counters.lock() {
                    counters.suspicious_spreads_rejected += 1;
                }
            }
        }

        if valid {
            reasoning.push("All validation checks passed".to_string());
        }

        let result = ConsensusResult {
            asset: asset.to_string(),
            consensus_price,
            max_deviation_pct: max_deviation,
            sources_agreed,
            sources_total: usable.len(),
            confidence_score,
            valid,
            reasoning,
            quotes: usable,
        };
        self.finish(&result);
        result
    }

    fn finish(&self, result: &ConsensusResult) {
        metrics::VALIDATIONS_TOTAL.inc();
        if let Ok(mut counters) = self.counters.lock() {
            counters.performed += 1;
            if result.valid {
                counters.passed += 1;
            } else {
                counters.failed += 1;
            }
        }

        if result.valid {
            info!("Validation passed: {}", result.summary());
        } else {
            metrics::VALIDATIONS_FAILED.inc();
            warn!(
                "Validation failed: {} | {}",
                result.summary(),
                result.reasoning.join(" | ")
            );
        }
    }

    /// Idempotent snapshot of pass/fail counters.
    pub fn get_statistics(&self) -> ValidatorStatistics {
        let counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        let pass_rate = if counters.performed == 0 {
            0.0
        } else {
            counters.passed as f64 / counters.performed as f64 * 100.0
        };
        ValidatorStatistics {
            validations_performed: counters.performed,
            validations_passed: counters.passed,
            validations_failed: counters.failed,
            pass_rate,
            suspicious_spreads_rejected: counters.suspicious_spreads_rejected,
        }
    }
}
