//! C6 — request handler. One HTTP `POST /` is rewrites → cache → select →
//! record → nonce precheck → forward → cache fill → metrics, per spec §4.6.

use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics::counter;
use relay_core::cache::ResponseCache;
use relay_protocol::jsonrpc::{
    element_as_object, object_field_as_str, params_as_array, RpcErrorResponse, RpcOutbound, RpcRequest,
};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use tracing::warn;

use crate::state::AppState;

const NONCE_PRECHECK_TIMEOUT: Duration = Duration::from_secs(10);
const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn relay(State(state): State<AppState>, Json(req): Json<RpcRequest>) -> Response {
    state.maybe_reload().await;
    let config = state.current_config();
    state.maybe_run_monitor(&config).await;

    let RpcRequest { id, method, mut params } = req;

    rewrite_pending_nonce(&method, &mut params);

    if let Some(ttl) = ResponseCache::ttl_for(&config.cache_ttl, &method) {
        let now = Instant::now();
        if let Some(mut cached) = state.inner.cache.lookup(&method, &params, now).await {
            if let Some(obj) = cached.as_object_mut() {
                obj.insert("id".to_string(), id.clone());
            }
            state.inner.cached_calls.fetch_add(1, Ordering::Relaxed);
            counter!("relay_cache_hits_total").increment(1);
            return Json(cached).into_response();
        }
        return forward_and_store(state, config.as_ref(), id, method, params, Some(ttl)).await;
    }

    forward_and_store(state, config.as_ref(), id, method, params, None).await
}

async fn forward_and_store(
    state: AppState,
    config: &relay_protocol::config::RelayConfig,
    id: Value,
    method: String,
    mut params: Value,
    ttl: Option<Duration>,
) -> Response {
    let Some(url) = state.inner.selector.select(&state.inner.table, &config.relay).await else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(RpcErrorResponse::no_healthy_endpoints(id)),
        )
            .into_response();
    };

    let now = Instant::now();
    state.inner.table.record_call(&url, now).await;
    state.inner.total_calls.fetch_add(1, Ordering::Relaxed);

    if matches!(method.as_str(), "eth_sendTransaction" | "personal_sendTransaction") {
        precheck_nonce(&state, &url, &mut params).await;
    }

    let outbound = RpcOutbound::new(id.clone(), method.clone(), params.clone());
    match state
        .inner
        .rpc_client
        .call(&url, &outbound, FORWARD_TIMEOUT)
        .await
    {
        Ok(body) => {
            if let Some(ttl) = ttl {
                state
                    .inner
                    .cache
                    .store(&method, &params, body.clone(), Instant::now(), ttl)
                    .await;
            }
            counter!("relay_forwarded_total").increment(1);
            Json(body).into_response()
        }
        Err(e) => {
            warn!(url = %url, method = %method, error = %e, "upstream forward failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RpcErrorResponse::upstream_error(id, e)),
            )
                .into_response()
        }
    }
}

/// Rewrite 1 (spec §4.6 step 4): force the nonce query to `"pending"`.
fn rewrite_pending_nonce(method: &str, params: &mut Value) {
    if method != "eth_getTransactionCount" {
        return;
    }
    let Some(array) = params.as_array_mut() else {
        return;
    };
    if array.is_empty() {
        return;
    }
    array.truncate(1);
    array.push(Value::String("pending".to_string()));
}

/// Rewrite 2 (spec §4.6 step 8): look up the real pending nonce for
/// `params[0].from` and overwrite `params[0].nonce` if it disagrees. Any
/// failure is logged and ignored — the original transaction forwards as-is.
async fn precheck_nonce(state: &AppState, url: &str, params: &mut Value) {
    let Some(from) = element_as_object(params, 0).and_then(|obj| object_field_as_str(obj, "from")) else {
        return;
    };
    let from = from.to_string();

    let probe = RpcOutbound::new(json!(1), "eth_getTransactionCount", json!([from, "pending"]));
    let body = match state
        .inner
        .rpc_client
        .call(url, &probe, NONCE_PRECHECK_TIMEOUT)
        .await
    {
        Ok(body) => body,
        Err(e) => {
            warn!(url = %url, error = %e, "nonce pre-check failed; forwarding original tx");
            return;
        }
    };
    let Some(result) = body.get("result").filter(|v| !v.is_null()) else {
        return;
    };
    let result = result.clone();

    let Some(array) = params_as_array(params) else {
        return;
    };
    let current_nonce = array
        .first()
        .and_then(|v| v.as_object())
        .and_then(|obj| obj.get("nonce"))
        .cloned();
    if current_nonce.as_ref() == Some(&result) {
        return;
    }

    if let Some(array) = params.as_array_mut() {
        if let Some(obj) = array.get_mut(0).and_then(|v| v.as_object_mut()) {
            obj.insert("nonce".to_string(), result);
        }
    }
}
