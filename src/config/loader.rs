use config::{Config, Environment, File};
use serde::Deserialize;
use crate::config::{BreakerConfig, ConsensusConfig, GateConfig, MonitorConfig};
use crate::error::{Error, Result};
use crate::types::endpoint::EndpointConfig;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub endpoints: Vec<EndpointConfig>,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("TRADEGUARD"))
            .build()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| Error::ConfigError(e.to_string()))?;

        app.validate()?;
        Ok(app)
    }

    /// Startup misconfiguration is the one fatal error class; everything
    /// downstream assumes a validated config.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(Error::NoEndpointsConfigured);
        }
        let mut names: Vec<&str> = self.endpoints.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.endpoints.len() {
            return Err(Error::ConfigError("duplicate endpoint names".into()));
        }
        self.monitor.validate()?;
        self.breaker.validate()?;
        self.consensus.validate()?;
        self.gate.validate()?;
        Ok(())
    }
}
