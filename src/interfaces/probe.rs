use async_trait::async_trait;
use crate::error::Result;
use crate::types::endpoint::EndpointConfig;

/// Minimal liveness probe against one endpoint, supplied by the chain
/// client collaborator. Implementations fetch the latest block/sequence
/// number; the monitor measures latency around the call and applies its
/// own hard timeout.
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    async fn latest_block(&self, endpoint: &EndpointConfig) -> Result<u64>;
}
