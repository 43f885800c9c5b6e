use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GateConfig {
    /// Evaluations whose minimum instrument confidence falls below this
    /// (while every check still passes) return Degraded instead of Allow.
    pub degraded_confidence: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            degraded_confidence: 70.0,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.degraded_confidence) {
            return Err(Error::ConfigError(format!(
                "degraded_confidence must be within 0-100, got {}",
                self.degraded_confidence
            )));
        }
        Ok(())
    }
}
