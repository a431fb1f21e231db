//! C3 — health monitor. Runs on `relay.monitor_interval` and classifies
//! every configured endpoint in two phases: Phase A probes each endpoint
//! independently and records success/failure; Phase B computes the network
//! tip `M` from only the phase-A successes and demotes endpoints that have
//! fallen more than `max_blocks_behind` blocks behind it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use relay_protocol::config::RelayConfig;
use relay_protocol::endpoint::{Behind, Latency};
use relay_protocol::jsonrpc::RpcOutbound;
use serde_json::json;
use tracing::{debug, warn};

use crate::endpoint_table::EndpointTable;
use crate::rpc_client::RpcClient;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct HealthMonitor {
    table: Arc<EndpointTable>,
    client: Arc<dyn RpcClient>,
}

struct ProbeOutcome {
    url: String,
    healthy: bool,
    latest_block: u64,
    latency: Latency,
}

impl HealthMonitor {
    pub fn new(table: Arc<EndpointTable>, client: Arc<dyn RpcClient>) -> Self {
        Self { table, client }
    }

    /// One full probe cycle over every configured endpoint.
    pub async fn update_statuses(&self, config: &RelayConfig) {
        let urls = config.all_urls();
        let outcomes = self.probe_all(&urls).await;

        let max_behind = config.health_monitor.max_blocks_behind;
        let tip = outcomes
            .iter()
            .filter(|o| o.healthy)
            .map(|o| o.latest_block)
            .max();

        self.table
            .apply_probe_results(|endpoints| {
                for endpoint in endpoints.iter_mut() {
                    let Some(outcome) = outcomes.iter().find(|o| o.url == endpoint.url) else {
                        continue;
                    };
                    if !outcome.healthy {
                        endpoint.healthy = false;
                        endpoint.latency = Latency::Unknown;
                        endpoint.behind = Behind::Unknown;
                        endpoint.errors += 1;
                        continue;
                    }

                    endpoint.latest_block = outcome.latest_block;
                    endpoint.latency = outcome.latency;
                    endpoint.errors = 0;

                    let behind = match tip {
                        Some(m) => m.saturating_sub(outcome.latest_block),
                        None => 0,
                    };
                    endpoint.behind = Behind::Blocks(behind);
                    endpoint.healthy = behind <= max_behind;
                }
            })
            .await;
    }

    async fn probe_all(&self, urls: &[&str]) -> Vec<ProbeOutcome> {
        let futures = urls.iter().map(|&url| self.probe_one(url));
        futures::future::join_all(futures).await
    }

    async fn probe_one(&self, url: &str) -> ProbeOutcome {
        let request = RpcOutbound::new(json!(1), "eth_blockNumber", json!([]));
        let start = Instant::now();
        match self.client.call(url, &request, PROBE_TIMEOUT).await {
            Ok(body) => {
                if let Some(error) = body.get("error") {
                    warn!(url, %error, "probe: upstream returned a JSON-RPC error");
                    return ProbeOutcome {
                        url: url.to_string(),
                        healthy: false,
                        latest_block: 0,
                        latency: Latency::Unknown,
                    };
                }
                match body.get("result").and_then(parse_block_number) {
                    Some(block) => ProbeOutcome {
                        url: url.to_string(),
                        healthy: true,
                        latest_block: block,
                        latency: Latency::Millis(start.elapsed().as_secs_f64() * 1000.0),
                    },
                    None => {
                        warn!(url, "probe: unparseable eth_blockNumber result");
                        ProbeOutcome {
                            url: url.to_string(),
                            healthy: false,
                            latest_block: 0,
                            latency: Latency::Unknown,
                        }
                    }
                }
            }
            Err(e) => {
                debug!(url, error = %e, "probe failed");
                ProbeOutcome {
                    url: url.to_string(),
                    healthy: false,
                    latest_block: 0,
                    latency: Latency::Unknown,
                }
            }
        }
    }
}

fn parse_block_number(value: &serde_json::Value) -> Option<u64> {
    let hex = value.as_str()?;
    u64::from_str_radix(hex.strip_prefix("0x")?, 16).ok()
}
