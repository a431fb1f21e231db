//! C2 — endpoint table. An ordered collection of endpoint records behind a
//! single table-wide lock, as spec §5 allows ("a single table-wide mutex is
//! acceptable; per-endpoint locks are an optimization").

use std::time::{Duration, Instant};

use relay_protocol::config::RelayConfig;
use relay_protocol::endpoint::{EndpointSnapshot, EndpointState, Tier};
use relay_protocol::TIMESTAMP_WINDOW_SECS;
use tokio::sync::RwLock;

pub struct EndpointTable {
    inner: RwLock<Vec<EndpointState>>,
}

impl EndpointTable {
    pub fn new(config: &RelayConfig) -> Self {
        Self {
            inner: RwLock::new(build(config)),
        }
    }

    /// Reconcile against a new config snapshot. If the URL set changed,
    /// rebuild from scratch but carry over `call_count`, `timestamps`, and
    /// `latest_block` for URLs present in both sets. If the URL set is
    /// unchanged, only `weight`/`max_tps` are overwritten in place.
    pub async fn reconcile(&self, config: &RelayConfig, endpoints_changed: bool) {
        let mut table = self.inner.write().await;
        if endpoints_changed {
            let mut carried: Vec<(String, u64, std::collections::VecDeque<Instant>, u64)> = table
                .drain(..)
                .map(|e| (e.url, e.call_count, e.timestamps, e.latest_block))
                .collect();

            let mut fresh = build(config);
            for e in fresh.iter_mut() {
                if let Some(idx) = carried.iter().position(|(url, ..)| url == &e.url) {
                    let (_, call_count, timestamps, latest_block) = carried.remove(idx);
                    e.call_count = call_count;
                    e.timestamps = timestamps;
                    e.latest_block = latest_block;
                }
            }
            *table = fresh;
        } else {
            for e in table.iter_mut() {
                if let Some(spec) = config
                    .rpc_endpoints
                    .primary
                    .iter()
                    .chain(config.rpc_endpoints.secondary.iter())
                    .find(|s| s.url == e.url)
                {
                    e.weight = spec.weight.max(1);
                    e.max_tps = spec.max_tps;
                }
            }
        }
    }

    /// Append `ts` to the endpoint's timestamp window and bump `call_count`.
    /// No-op if `url` is unknown (it may have been dropped by a concurrent
    /// reload).
    pub async fn record_call(&self, url: &str, ts: Instant) {
        let mut table = self.inner.write().await;
        if let Some(e) = table.iter_mut().find(|e| e.url == url) {
            e.record_call(ts);
        }
    }

    /// Apply probe results under a single write lock so each endpoint's
    /// classification is all-or-nothing per spec §5 ("a reader sees either
    /// the pre-cycle or post-cycle record of that endpoint, never a mix").
    pub async fn apply_probe_results<F>(&self, f: F)
    where
        F: FnOnce(&mut [EndpointState]),
    {
        let mut table = self.inner.write().await;
        f(&mut table);
    }

    /// Healthy endpoints sorted by `(behind asc, latency asc)`, ties broken
    /// by input order (stable sort). Timestamps are pruned lazily here so
    /// TPS/TPM reads downstream never see stale entries (I3).
    pub async fn snapshot_healthy(&self, now: Instant) -> Vec<EndpointSnapshotForSelection> {
        let mut table = self.inner.write().await;
        let window = Duration::from_secs(TIMESTAMP_WINDOW_SECS);
        for e in table.iter_mut() {
            e.prune_timestamps(now, window);
        }
        let mut healthy: Vec<EndpointSnapshotForSelection> = table
            .iter()
            .filter(|e| e.healthy)
            .map(|e| EndpointSnapshotForSelection {
                url: e.url.clone(),
                tier: e.tier,
                weight: e.weight,
                max_tps: e.max_tps,
                latency_ms: e.latency.as_millis_f64(),
                behind: match e.behind {
                    relay_protocol::endpoint::Behind::Blocks(n) => n,
                    relay_protocol::endpoint::Behind::Unknown => u64::MAX,
                },
                tps_count: e.count_within(now, Duration::from_secs(1)),
            })
            .collect();
        healthy.sort_by(|a, b| {
            a.behind
                .cmp(&b.behind)
                .then_with(|| a.latency_cmp_key().partial_cmp(&b.latency_cmp_key()).unwrap())
        });
        healthy
    }

    pub async fn snapshot_all(&self) -> Vec<EndpointSnapshot> {
        let table = self.inner.read().await;
        table.iter().map(EndpointSnapshot::from).collect()
    }
}

fn build(config: &RelayConfig) -> Vec<EndpointState> {
    let mut list = Vec::new();
    for spec in &config.rpc_endpoints.primary {
        list.push(EndpointState::new(spec, Tier::Primary));
    }
    for spec in &config.rpc_endpoints.secondary {
        list.push(EndpointState::new(spec, Tier::Secondary));
    }
    list
}

/// Lightweight, cloned-out view of a healthy endpoint, sized for the
/// selector pipeline — it never needs to touch the table lock again once
/// it has this.
#[derive(Debug, Clone)]
pub struct EndpointSnapshotForSelection {
    pub url: String,
    pub tier: Tier,
    pub weight: u32,
    pub max_tps: u32,
    pub latency_ms: Option<f64>,
    pub behind: u64,
    pub tps_count: usize,
}

impl EndpointSnapshotForSelection {
    /// `f64::MAX` stands in for "unknown latency" so it always sorts last,
    /// matching the Python original's `float('inf')` comparison.
    fn latency_cmp_key(&self) -> f64 {
        self.latency_ms.unwrap_or(f64::MAX)
    }
}
