//! Endpoint record shared between the health monitor, the selector, and the
//! `/status` projection. The in-process record (`EndpointState`) carries
//! live counters; `EndpointSnapshot` is the serializable read-only view
//! handed out to HTTP clients.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Priority tier a configured endpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Primary,
    Secondary,
}

/// An endpoint entry as declared in `rpc_endpoints.primary`/`secondary`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointSpec {
    pub url: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub max_tps: u32,
}

fn default_weight() -> u32 {
    1
}

/// `behind` needs an explicit "unknown" state (∞ in the spec) distinct from
/// zero blocks behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Behind {
    Blocks(u64),
    Unknown,
}

impl Behind {
    pub fn is_unknown(self) -> bool {
        matches!(self, Behind::Unknown)
    }
}

/// Round-trip latency of the last successful probe, or unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Latency {
    Millis(f64),
    Unknown,
}

impl Latency {
    pub fn as_millis_f64(self) -> Option<f64> {
        match self {
            Latency::Millis(ms) => Some(ms),
            Latency::Unknown => None,
        }
    }

    pub fn as_secs_f64(self) -> Option<f64> {
        self.as_millis_f64().map(|ms| ms / 1000.0)
    }
}

/// Live, mutable record for one endpoint. Owned by the endpoint table behind
/// a single table-wide lock (spec §5 — "a single table-wide mutex is
/// acceptable").
#[derive(Debug)]
pub struct EndpointState {
    pub url: String,
    pub tier: Tier,
    pub weight: u32,
    pub max_tps: u32,
    pub healthy: bool,
    pub latest_block: u64,
    pub behind: Behind,
    pub latency: Latency,
    pub errors: u64,
    pub call_count: u64,
    /// Send timestamps within the last `TIMESTAMP_WINDOW_SECS`, oldest first.
    pub timestamps: VecDeque<Instant>,
}

impl EndpointState {
    pub fn new(spec: &EndpointSpec, tier: Tier) -> Self {
        Self {
            url: spec.url.clone(),
            tier,
            weight: spec.weight.max(1),
            max_tps: spec.max_tps,
            healthy: true,
            latest_block: 0,
            behind: Behind::Blocks(0),
            latency: Latency::Unknown,
            errors: 0,
            call_count: 0,
            timestamps: VecDeque::new(),
        }
    }

    /// Drop timestamps older than the sliding window, lazily (I3).
    pub fn prune_timestamps(&mut self, now: Instant, window: std::time::Duration) {
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) > window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Count of timestamps within `span` of `now`, most commonly 1s (TPS) or
    /// 60s (TPM).
    pub fn count_within(&self, now: Instant, span: std::time::Duration) -> usize {
        self.timestamps
            .iter()
            .rev()
            .take_while(|&&ts| now.duration_since(ts) <= span)
            .count()
    }

    /// Append a send timestamp and bump `call_count` together (I4).
    pub fn record_call(&mut self, now: Instant) {
        self.timestamps.push_back(now);
        self.call_count += 1;
    }
}

/// Read-only projection of one endpoint, served by `GET /status` and usable
/// by an external dashboard consumer. `behind`/`latency` use sentinels so
/// the JSON shape stays a plain number for machine consumers (§6).
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSnapshot {
    pub url: String,
    pub max_tps: u32,
    pub healthy: bool,
    pub behind: u64,
    pub latest_block: u64,
    pub latency: f64,
    pub errors: u64,
    pub call_count: u64,
}

/// Largest representable sentinel for "infinite/unknown" in machine-readable
/// output, per §6.
pub const BEHIND_SENTINEL: u64 = u64::MAX;
pub const LATENCY_SENTINEL: f64 = f64::INFINITY;

impl From<&EndpointState> for EndpointSnapshot {
    fn from(e: &EndpointState) -> Self {
        Self {
            url: e.url.clone(),
            max_tps: e.max_tps,
            healthy: e.healthy,
            behind: match e.behind {
                Behind::Blocks(n) => n,
                Behind::Unknown => BEHIND_SENTINEL,
            },
            latest_block: e.latest_block,
            latency: e.latency.as_secs_f64().unwrap_or(LATENCY_SENTINEL),
            errors: e.errors,
            call_count: e.call_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn prune_drops_only_stale_entries() {
        let spec = EndpointSpec {
            url: "http://a".into(),
            weight: 1,
            max_tps: 0,
        };
        let mut e = EndpointState::new(&spec, Tier::Primary);
        let t0 = Instant::now();
        e.timestamps.push_back(t0);
        e.timestamps.push_back(t0 + Duration::from_secs(70));
        e.prune_timestamps(t0 + Duration::from_secs(70), Duration::from_secs(60));
        assert_eq!(e.timestamps.len(), 1);
    }

    #[test]
    fn snapshot_encodes_unknown_as_sentinels() {
        let spec = EndpointSpec {
            url: "http://a".into(),
            weight: 1,
            max_tps: 0,
        };
        let mut e = EndpointState::new(&spec, Tier::Primary);
        e.behind = Behind::Unknown;
        e.latency = Latency::Unknown;
        let snap = EndpointSnapshot::from(&e);
        assert_eq!(snap.behind, BEHIND_SENTINEL);
        assert!(snap.latency.is_infinite());
    }
}
