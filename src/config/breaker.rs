use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::error::{Error, Result};

/// Thresholds and cadence for the cost circuit breaker. The three
/// thresholds must satisfy elevated < high < critical.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BreakerConfig {
    /// At or above this the tier is at least Elevated.
    pub elevated_threshold: f64,
    /// At or above this the tier is at least High and trading stops.
    pub high_threshold: f64,
    /// At or above this the tier is Critical and the kill-switch arms.
    pub critical_threshold: f64,
    /// How often the background loop samples the cost signal.
    pub sample_interval: Duration,
    /// Hard timeout applied to each cost sample.
    pub sample_timeout: Duration,
    /// Ring buffer capacity for retained samples.
    pub history_capacity: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            elevated_threshold: 1.2,
            high_threshold: 2.0,
            critical_threshold: 3.0,
            sample_interval: Duration::from_secs(10),
            sample_timeout: Duration::from_secs(5),
            history_capacity: 1000,
        }
    }
}

impl BreakerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.elevated_threshold <= 0.0 {
            return Err(Error::ConfigError(
                "elevated_threshold must be positive".into(),
            ));
        }
        if self.elevated_threshold >= self.high_threshold
            || self.high_threshold >= self.critical_threshold
        {
            return Err(Error::ConfigError(format!(
                "thresholds must be strictly increasing: {} < {} < {}",
                self.elevated_threshold, self.high_threshold, self.critical_threshold
            )));
        }
        if self.sample_interval.is_zero() {
            return Err(Error::ConfigError("sample_interval must be non-zero".into()));
        }
        if self.history_capacity == 0 {
            return Err(Error::ConfigError(
                "history_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(BreakerConfig::default().validate().is_ok());
    }

    #[test]
    fn unordered_thresholds_rejected() {
        let config = BreakerConfig {
            elevated_threshold: 2.0,
            high_threshold: 2.0,
            critical_threshold: 3.0,
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("strictly increasing"));
    }
}
