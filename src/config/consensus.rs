use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::error::{Error, Result};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ConsensusConfig {
    /// Minimum usable quotes; below this the result is invalid regardless
    /// of agreement.
    pub min_sources: usize,
    /// Quotes within this percentage of consensus count as agreeing.
    pub agreement_band_pct: f64,
    /// Maximum tolerated deviation of any quote from consensus.
    pub max_deviation_pct: f64,
    /// Minimum blended confidence score (0-100). Contexts range 40-60;
    /// the default is the permissive end.
    pub min_confidence: f64,
    /// Quotes older than this are excluded before any math runs.
    pub staleness_window: Duration,
    /// Per-source fetch timeout; one slow source never blocks the rest.
    pub fetch_timeout: Duration,
    /// Raw spreads above this are rejected as stale data when the caller
    /// supplies an observed spread.
    pub max_spread_bps: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        ConsensusConfig {
            min_sources: 2,
            agreement_band_pct: 5.0,
            max_deviation_pct: 10.0,
            min_confidence: 40.0,
            staleness_window: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(5),
            max_spread_bps: 800.0,
        }
    }
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_sources == 0 {
            return Err(Error::ConfigError("min_sources must be at least 1".into()));
        }
        if self.agreement_band_pct <= 0.0 || self.max_deviation_pct <= 0.0 {
            return Err(Error::ConfigError(
                "agreement_band_pct and max_deviation_pct must be positive".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(Error::ConfigError(format!(
                "min_confidence must be within 0-100, got {}",
                self.min_confidence
            )));
        }
        if self.staleness_window.is_zero() {
            return Err(Error::ConfigError("staleness_window must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ConsensusConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let config = ConsensusConfig {
            min_confidence: 140.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
