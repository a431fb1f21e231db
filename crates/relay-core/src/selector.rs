//! C5 — selector. Turns the endpoint table's healthy snapshot into exactly
//! one endpoint per call, applying the pipeline from spec §4.5: rate-limit
//! filter, tier split, weight expansion, latency filter, round-robin.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use relay_protocol::config::RelaySettings;
use relay_protocol::endpoint::Tier;
use relay_protocol::RATE_LIMIT_BACKOFF_MS;
use tokio::time::sleep;

use crate::endpoint_table::{EndpointSnapshotForSelection, EndpointTable};

/// Owns the process-wide round-robin counter. The teacher's discovery layer
/// kept a similar "next index" cursor as a plain atomic rather than behind a
/// lock, since it only ever needs `fetch_add`.
pub struct Selector {
    counter: AtomicUsize,
}

impl Selector {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }

    /// Block (via a 50ms back-off loop, uncancellable by design — spec §5)
    /// until at least one candidate survives the rate-limit filter, then run
    /// the remaining pipeline stages and return one endpoint's URL.
    pub async fn select(&self, table: &EndpointTable, relay: &RelaySettings) -> Option<String> {
        loop {
            let now = Instant::now();
            let healthy = table.snapshot_healthy(now).await;
            if healthy.is_empty() {
                return None;
            }

            let rate_limited = rate_limit_filter(&healthy);
            if rate_limited.is_empty() {
                sleep(Duration::from_millis(RATE_LIMIT_BACKOFF_MS)).await;
                continue;
            }

            let tiered = tier_split(rate_limited);
            let expanded = weight_expand(&tiered);
            let filtered = latency_filter(&expanded, relay.latency_threshold_ms);
            if filtered.is_empty() {
                // Every candidate vanished between the rate-limit check and
                // here only if the table changed concurrently; retry rather
                // than return no endpoint for what was a momentary race.
                continue;
            }

            let i = self.counter.fetch_add(1, Ordering::Relaxed);
            return Some(filtered[i % filtered.len()].url.clone());
        }
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

fn rate_limit_filter(healthy: &[EndpointSnapshotForSelection]) -> Vec<&EndpointSnapshotForSelection> {
    healthy
        .iter()
        .filter(|e| e.max_tps == 0 || (e.tps_count as u32) < e.max_tps)
        .collect()
}

fn tier_split<'a>(
    candidates: Vec<&'a EndpointSnapshotForSelection>,
) -> Vec<&'a EndpointSnapshotForSelection> {
    let primaries: Vec<_> = candidates.iter().filter(|e| e.tier == Tier::Primary).copied().collect();
    if !primaries.is_empty() {
        primaries
    } else {
        candidates
    }
}

fn weight_expand<'a>(
    candidates: &[&'a EndpointSnapshotForSelection],
) -> Vec<&'a EndpointSnapshotForSelection> {
    let mut expanded = Vec::new();
    for &e in candidates {
        for _ in 0..e.weight.max(1) {
            expanded.push(e);
        }
    }
    expanded
}

fn latency_filter<'a>(
    expanded: &[&'a EndpointSnapshotForSelection],
    threshold_ms: Option<f64>,
) -> Vec<&'a EndpointSnapshotForSelection> {
    let Some(threshold) = threshold_ms else {
        return expanded.to_vec();
    };

    let under_threshold: Vec<_> = expanded
        .iter()
        .filter(|e| e.latency_ms.map(|ms| ms < threshold).unwrap_or(false))
        .copied()
        .collect();
    if !under_threshold.is_empty() {
        return under_threshold;
    }

    // Nothing qualifies: fall back to those tied for minimum latency within
    // the weighted list, per spec §9 design note 2 — this is evaluated on
    // the post-expansion list and so may over-represent heavily weighted
    // laggards, a behavior the spec preserves rather than corrects.
    let min_latency = expanded
        .iter()
        .map(|e| e.latency_ms.unwrap_or(f64::MAX))
        .fold(f64::MAX, f64::min);
    expanded
        .iter()
        .filter(|e| e.latency_ms.unwrap_or(f64::MAX) == min_latency)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_protocol::config::RelayConfig;
    use relay_protocol::endpoint::{Behind, EndpointSpec, Latency};

    fn cfg(primary: &[&str], secondary: &[&str]) -> RelayConfig {
        let mut config = RelayConfig::default();
        config.rpc_endpoints.primary = primary
            .iter()
            .map(|u| EndpointSpec {
                url: u.to_string(),
                weight: 1,
                max_tps: 0,
            })
            .collect();
        config.rpc_endpoints.secondary = secondary
            .iter()
            .map(|u| EndpointSpec {
                url: u.to_string(),
                weight: 1,
                max_tps: 0,
            })
            .collect();
        config
    }

    #[tokio::test]
    async fn prefers_primary_when_any_primary_passes() {
        let config = cfg(&["http://p1"], &["http://s1"]);
        let table = EndpointTable::new(&config);
        table
            .apply_probe_results(|endpoints| {
                for e in endpoints.iter_mut() {
                    e.behind = Behind::Blocks(0);
                    e.latency = Latency::Millis(10.0);
                }
            })
            .await;

        let selector = Selector::new();
        for _ in 0..5 {
            let picked = selector.select(&table, &config.relay).await.unwrap();
            assert_eq!(picked, "http://p1");
        }
    }

    #[tokio::test]
    async fn falls_back_to_secondary_when_primary_rate_limited() {
        let mut config = cfg(&["http://p1"], &["http://s1"]);
        config.rpc_endpoints.primary[0].max_tps = 1;
        let table = EndpointTable::new(&config);
        table
            .apply_probe_results(|endpoints| {
                for e in endpoints.iter_mut() {
                    e.behind = Behind::Blocks(0);
                    e.latency = Latency::Millis(10.0);
                }
            })
            .await;

        let now = Instant::now();
        table.record_call("http://p1", now).await;

        let selector = Selector::new();
        let picked = selector.select(&table, &config.relay).await.unwrap();
        assert_eq!(picked, "http://s1");
    }

    #[tokio::test]
    async fn no_healthy_endpoints_returns_none() {
        let config = cfg(&["http://p1"], &[]);
        let table = EndpointTable::new(&config);
        table
            .apply_probe_results(|endpoints| {
                endpoints[0].healthy = false;
            })
            .await;

        let selector = Selector::new();
        assert!(selector.select(&table, &config.relay).await.is_none());
    }

    #[tokio::test]
    async fn weight_biases_round_robin_distribution() {
        let mut config = cfg(&["http://heavy", "http://light"], &[]);
        config.rpc_endpoints.primary[0].weight = 3;
        config.rpc_endpoints.primary[1].weight = 1;
        let table = EndpointTable::new(&config);
        table
            .apply_probe_results(|endpoints| {
                for e in endpoints.iter_mut() {
                    e.behind = Behind::Blocks(0);
                    e.latency = Latency::Millis(10.0);
                }
            })
            .await;

        let selector = Selector::new();
        let mut heavy_count = 0;
        for _ in 0..8 {
            if selector.select(&table, &config.relay).await.unwrap() == "http://heavy" {
                heavy_count += 1;
            }
        }
        assert_eq!(heavy_count, 6);
    }

    #[tokio::test]
    async fn latency_filter_falls_back_to_minimum_when_none_under_threshold() {
        let config = cfg(&["http://a", "http://b"], &[]);
        let table = EndpointTable::new(&config);
        table
            .apply_probe_results(|endpoints| {
                endpoints[0].behind = Behind::Blocks(0);
                endpoints[0].latency = Latency::Millis(200.0);
                endpoints[1].behind = Behind::Blocks(0);
                endpoints[1].latency = Latency::Millis(100.0);
            })
            .await;

        let mut relay = config.relay.clone();
        relay.latency_threshold_ms = Some(50.0);
        let selector = Selector::new();
        let picked = selector.select(&table, &relay).await.unwrap();
        assert_eq!(picked, "http://b");
    }
}
