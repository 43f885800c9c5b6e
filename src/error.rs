use thiserror::Error;
use crate::types::cost::CostTier;

#[derive(Error, Debug)]
pub enum Error {
    // Endpoint Health Errors
    #[error("No endpoints configured")]
    NoEndpointsConfigured,

    #[error("No endpoints available")]
    NoEndpointsAvailable,

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("RPC call failed ({kind:?}) on {endpoint}: {message}")]
    Rpc {
        endpoint: String,
        kind: RpcErrorKind,
        message: String,
    },

    // Cost Breaker Errors
    #[error("Cost sample failed ({kind:?}): {message}")]
    CostSample {
        kind: RpcErrorKind,
        message: String,
    },

    #[error("Trading halted: cost tier {0:?}")]
    TradingHalted(CostTier),

    // Consensus Errors
    #[error("Insufficient price sources: need at least {needed}, got {got}")]
    InsufficientPriceSources { needed: usize, got: usize },

    #[error("Price source {source_id} failed ({kind:?}): {message}")]
    PriceSource {
        source_id: String,
        kind: RpcErrorKind,
        message: String,
    },

    // System Errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Task error: {0}")]
    TaskError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure kind for an external I/O call. Retry and logging policy is
/// chosen per kind instead of treating every failure the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorKind {
    Timeout,
    Connection,
    Protocol,
    Other,
}

impl RpcErrorKind {
    /// Transient kinds are expected to clear on their own and are retried
    /// on the next monitoring cycle without escalation.
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcErrorKind::Timeout | RpcErrorKind::Connection)
    }
}
