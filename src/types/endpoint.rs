use serde::{Deserialize, Serialize};

/// Static description of a network endpoint, loaded once at startup.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    /// Bearer token or API key appended by the probe implementation.
    #[serde(default)]
    pub auth: Option<String>,
}

/// Live statistics for a single endpoint.
///
/// Exclusively mutated by the health monitor's background loop; every
/// other component reads cloned snapshots.
#[derive(Clone, Debug, Serialize)]
pub struct EndpointStats {
    pub name: String,
    pub url: String,
    pub latency_ms: f64,
    pub last_block_seen: u64,
    /// Unix millis of the last successful probe, 0 if never.
    pub last_success_ts: u64,
    pub error_count: u64,
    pub success_count: u64,
    pub consecutive_failures: u32,
    pub available: bool,
}

impl EndpointStats {
    pub fn new(config: &EndpointConfig) -> Self {
        EndpointStats {
            name: config.name.clone(),
            url: config.url.clone(),
            latency_ms: f64::MAX,
            last_block_seen: 0,
            last_success_ts: 0,
            error_count: 0,
            success_count: 0,
            consecutive_failures: 0,
            available: true,
        }
    }

    /// Success rate as a percentage (0-100). 0 until the first probe lands.
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            return 0.0;
        }
        (self.success_count as f64 / total as f64) * 100.0
    }

    /// Composite health score (0-100).
    ///
    /// Latency contributes 0-40 (linear decay, 0 at >=500ms), success rate
    /// 0-30, freshness 0-20 (decays one point per second since the last
    /// success), and a 10 point availability bonus while consecutive
    /// failures stay below 3. Unavailable endpoints score 0 outright.
    pub fn health_score(&self, now_ms: u64) -> f64 {
        if !self.available {
            return 0.0;
        }

        let latency_score = if self.latency_ms == f64::MAX {
            0.0
        } else {
            (40.0 - self.latency_ms / 12.5).max(0.0)
        };

        let success_score = (self.success_rate() / 100.0) * 30.0;

        let secs_since_success = if self.last_success_ts == 0 {
            f64::MAX
        } else {
            now_ms.saturating_sub(self.last_success_ts) as f64 / 1000.0
        };
        let freshness_score = (20.0 - secs_since_success).max(0.0);

        let availability_score = if self.consecutive_failures < 3 { 10.0 } else { 0.0 };

        latency_score + success_score + freshness_score + availability_score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.to_string(),
            url: format!("https://{}.example.com", name),
            auth: None,
        }
    }

    fn healthy_stats(now_ms: u64) -> EndpointStats {
        let mut stats = EndpointStats::new(&config("primary"));
        stats.latency_ms = 50.0;
        stats.last_block_seen = 1_000;
        stats.last_success_ts = now_ms;
        stats.success_count = 100;
        stats
    }

    #[test]
    fn fresh_fast_endpoint_scores_near_max() {
        let now = 1_700_000_000_000;
        let stats = healthy_stats(now);
        let score = stats.health_score(now);
        assert!(score > 90.0, "score was {}", score);
        assert!(score <= 100.0);
    }

    #[test]
    fn unavailable_endpoint_scores_zero() {
        let now = 1_700_000_000_000;
        let mut stats = healthy_stats(now);
        stats.available = false;
        assert_eq!(stats.health_score(now), 0.0);
    }

    #[test]
    fn latency_term_zero_at_500ms() {
        let now = 1_700_000_000_000;
        let mut stats = healthy_stats(now);
        stats.latency_ms = 500.0;
        // 0 latency + 30 success + 20 freshness + 10 availability
        let score = stats.health_score(now);
        assert!((score - 60.0).abs() < 1e-9, "score was {}", score);
    }

    #[test]
    fn freshness_decays_with_silence() {
        let now = 1_700_000_000_000;
        let mut stats = healthy_stats(now);
        stats.last_success_ts = now - 30_000; // 30s silent, freshness term gone
        let fresh = healthy_stats(now).health_score(now);
        let stale = stats.health_score(now);
        assert!(stale < fresh - 19.0);
    }

    #[test]
    fn availability_bonus_dropped_after_three_failures() {
        let now = 1_700_000_000_000;
        let mut stats = healthy_stats(now);
        stats.consecutive_failures = 3;
        let degraded = stats.health_score(now);
        stats.consecutive_failures = 2;
        let ok = stats.health_score(now);
        assert!((ok - degraded - 10.0).abs() < 1e-9);
    }

    #[test]
    fn success_rate_empty_is_zero() {
        let stats = EndpointStats::new(&config("new"));
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn score_stays_in_bounds() {
        let now = 1_700_000_000_000;
        let mut stats = healthy_stats(now);
        stats.latency_ms = 0.0;
        stats.success_count = u64::MAX / 2;
        let score = stats.health_score(now);
        assert!((0.0..=100.0).contains(&score));
    }
}
