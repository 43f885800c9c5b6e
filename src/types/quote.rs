use serde::{Deserialize, Serialize};

/// Single price quote from one independent source. Created per validation
/// call, never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PriceQuote {
    pub source_id: String,
    pub asset: String,
    pub price: f64,
    pub timestamp_ms: u64,
    /// Source reliability weight in 0..1, set by the source implementation.
    pub confidence: f64,
    #[serde(default)]
    pub liquidity_usd: Option<f64>,
    #[serde(default)]
    pub volume_24h_usd: Option<f64>,
}

impl PriceQuote {
    /// High-confidence sources anchor the confidence score's last factor.
    pub const HIGH_CONFIDENCE: f64 = 0.85;

    pub fn is_high_confidence(&self) -> bool {
        self.confidence >= Self::HIGH_CONFIDENCE
    }
}

/// Outcome of a multi-source consensus evaluation. Derived fresh per call
/// and immutable.
#[derive(Clone, Debug, Serialize)]
pub struct ConsensusResult {
    pub asset: String,
    pub consensus_price: f64,
    /// Largest percentage deviation of any usable quote from consensus.
    pub max_deviation_pct: f64,
    pub sources_agreed: usize,
    pub sources_total: usize,
    /// Blended confidence in 0..100.
    pub confidence_score: f64,
    pub valid: bool,
    /// Complete, ordered list of findings. Every failing rule appears;
    /// evaluation never stops at the first failure.
    pub reasoning: Vec<String>,
    pub quotes: Vec<PriceQuote>,
}

impl ConsensusResult {
    /// Summary line for log output.
    pub fn summary(&self) -> String {
        format!(
            "{}: consensus={:.4}, max_dev={:.2}%, agreed={}/{}, confidence={:.1}/100, valid={}",
            self.asset,
            self.consensus_price,
            self.max_deviation_pct,
            self.sources_agreed,
            self.sources_total,
            self.confidence_score,
            self.valid
        )
    }
}
