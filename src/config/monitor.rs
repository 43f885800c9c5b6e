use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::error::{Error, Result};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// How often the background loop pings every endpoint.
    pub ping_interval: Duration,
    /// Hard timeout applied to each individual probe.
    pub probe_timeout: Duration,
    /// Endpoint is marked unavailable once this many probes fail in a row.
    pub max_consecutive_failures: u32,
    /// Bounded length of the selector's selection history.
    pub selection_history_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            ping_interval: Duration::from_millis(200),
            probe_timeout: Duration::from_secs(3),
            max_consecutive_failures: 5,
            selection_history_size: 1000,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ping_interval.is_zero() {
            return Err(Error::ConfigError("ping_interval must be non-zero".into()));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::ConfigError("probe_timeout must be non-zero".into()));
        }
        if self.max_consecutive_failures == 0 {
            return Err(Error::ConfigError(
                "max_consecutive_failures must be at least 1".into(),
            ));
        }
        if self.selection_history_size == 0 {
            return Err(Error::ConfigError(
                "selection_history_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
