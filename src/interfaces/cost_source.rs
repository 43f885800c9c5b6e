use async_trait::async_trait;
use crate::error::Result;

/// Scalar cost signal sampled by the circuit breaker, e.g. the network
/// fee price in gwei. Supplied by the chain client collaborator.
#[async_trait]
pub trait CostSource: Send + Sync {
    async fn sample_cost(&self) -> Result<f64>;
    fn source_id(&self) -> &str;
}
