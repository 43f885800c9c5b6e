use async_trait::async_trait;
use crate::error::Result;
use crate::types::quote::PriceQuote;

/// One independent price feed (on-chain read, aggregator API, oracle).
/// Each validation call fans out to every registered source; a failing or
/// slow source only costs its own quote.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_quote(&self, asset: &str) -> Result<PriceQuote>;
    fn source_id(&self) -> &str;
}
