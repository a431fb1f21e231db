//! Outbound JSON-RPC transport. Abstracted behind a trait so the health
//! monitor's probes and the request handler's forwards can be exercised in
//! tests against an `httpmock` server without a real network, the same way
//! the teacher's discovery layer abstracted its transport.

use std::time::Duration;

use async_trait::async_trait;
use relay_protocol::jsonrpc::RpcOutbound;
use serde_json::Value;

#[derive(Debug)]
pub enum RpcClientError {
    Timeout,
    Transport(String),
    /// The upstream responded but the body wasn't valid JSON.
    InvalidResponse(String),
}

impl std::fmt::Display for RpcClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcClientError::Timeout => write!(f, "request timed out"),
            RpcClientError::Transport(e) => write!(f, "transport error: {e}"),
            RpcClientError::InvalidResponse(e) => write!(f, "invalid response: {e}"),
        }
    }
}

impl std::error::Error for RpcClientError {}

#[async_trait]
pub trait RpcClient: Send + Sync {
    /// Send `request` to `url` and return the full parsed JSON-RPC response
    /// body verbatim — `result` or `error`, whichever the upstream sent.
    /// `Err` is reserved for transport-level failures (timeout, connection
    /// error, non-JSON body); a legitimate upstream JSON-RPC error is not
    /// this client's concern to interpret, only to hand back. `timeout`
    /// bounds the whole round trip.
    async fn call(
        &self,
        url: &str,
        request: &RpcOutbound,
        timeout: Duration,
    ) -> Result<Value, RpcClientError>;
}

/// `reqwest`-backed implementation. A single shared client reuses its
/// connection pool across every endpoint and call site, matching the
/// teacher's preference for one long-lived client over one-per-call.
pub struct ReqwestRpcClient {
    client: reqwest::Client,
}

impl ReqwestRpcClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .build()?;
        Ok(Self { client })
    }
}

impl Default for ReqwestRpcClient {
    fn default() -> Self {
        Self::new().expect("reqwest client builds with default TLS config")
    }
}

#[async_trait]
impl RpcClient for ReqwestRpcClient {
    async fn call(
        &self,
        url: &str,
        request: &RpcOutbound,
        timeout: Duration,
    ) -> Result<Value, RpcClientError> {
        let response = self
            .client
            .post(url)
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcClientError::Timeout
                } else {
                    RpcClientError::Transport(e.to_string())
                }
            })?;

        response
            .json()
            .await
            .map_err(|e| RpcClientError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn call_returns_full_body_on_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/");
            then.status(200)
                .json_body(json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"}));
        });

        let client = ReqwestRpcClient::new().unwrap();
        let req = RpcOutbound::new(json!(1), "eth_blockNumber", json!([]));
        let body = client
            .call(&server.url("/"), &req, Duration::from_secs(3))
            .await
            .unwrap();
        mock.assert();
        assert_eq!(body, json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"}));
    }

    #[tokio::test]
    async fn call_returns_upstream_error_body_verbatim() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/");
            then.status(200).json_body(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32601, "message": "method not found"}
            }));
        });

        let client = ReqwestRpcClient::new().unwrap();
        let req = RpcOutbound::new(json!(1), "bogus_method", json!([]));
        let body = client
            .call(&server.url("/"), &req, Duration::from_secs(3))
            .await
            .unwrap();
        assert_eq!(body["error"]["code"], -32601);
    }
}
