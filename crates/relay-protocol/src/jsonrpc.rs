//! JSON-RPC 2.0 envelope types and small accessors over the dynamic
//! `params` value. Per the design notes, `params` is heterogeneous (an
//! array of mixed types, an object, or absent) — rather than forcing a
//! schema on it, it's kept as a `serde_json::Value` tree and the rewrites
//! (spec §4.6 steps 4 and 8) walk it with these helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound JSON-RPC request. `method` defaults to an empty string and
/// `params` to an empty array when absent — a deliberate pass-through
/// rather than a parse error (spec §7, `MalformedRequest`).
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default = "default_id")]
    pub id: Value,
    #[serde(default)]
    pub method: String,
    #[serde(default = "empty_params")]
    pub params: Value,
}

fn default_id() -> Value {
    Value::from(0)
}

fn empty_params() -> Value {
    Value::Array(Vec::new())
}

/// Outbound envelope forwarded to an upstream endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RpcOutbound {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub method: String,
    pub params: Value,
}

impl RpcOutbound {
    pub fn new(id: Value, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC error envelope, per spec §4.6 steps 6 and 9.
#[derive(Debug, Clone, Serialize)]
pub struct RpcErrorResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub error: RpcErrorBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

impl RpcErrorResponse {
    pub fn no_healthy_endpoints(id: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: RpcErrorBody {
                code: -32000,
                message: "No healthy RPCs available".to_string(),
            },
        }
    }

    pub fn upstream_error(id: Value, detail: impl std::fmt::Display) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            error: RpcErrorBody {
                code: -32603,
                message: format!("Upstream provider error: {detail}"),
            },
        }
    }
}

/// Returns `params` as a slice of array elements, or `None` if it isn't an
/// array (the source of the `Non-goals: not an array` branches in §4.6).
pub fn params_as_array(params: &Value) -> Option<&Vec<Value>> {
    params.as_array()
}

/// Element at index `i`, treated as an object, or `None`.
pub fn element_as_object(params: &Value, i: usize) -> Option<&serde_json::Map<String, Value>> {
    params_as_array(params)?.get(i)?.as_object()
}

/// `params[i].<field>` as a string, if present.
pub fn object_field_as_str<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &str,
) -> Option<&'a str> {
    obj.get(field)?.as_str()
}

/// Canonical JSON encoding of a value: object keys sorted lexicographically
/// at every level (spec §4.4, P2). Used as (part of) the cache key so that
/// semantically equal params with reordered keys hash identically.
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value)).expect("canonicalized value always serializes")
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for k in keys {
                sorted.insert(k.clone(), canonicalize(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults_method_and_params_when_absent() {
        let req: RpcRequest = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(req.method, "");
        assert_eq!(req.params, Value::Array(Vec::new()));
    }

    #[test]
    fn request_defaults_id_to_zero_when_absent() {
        let req: RpcRequest = serde_json::from_str(r#"{"method": "eth_blockNumber"}"#).unwrap();
        assert_eq!(req.id, Value::from(0));
    }

    #[test]
    fn canonical_json_ignores_key_order() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn canonical_json_sorts_nested_objects() {
        let a = json!([{"z": 1, "y": {"d": 1, "c": 2}}]);
        let b = json!([{"y": {"c": 2, "d": 1}, "z": 1}]);
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn element_as_object_reads_from_address() {
        let params = json!([{"from": "0xabc", "nonce": "0x5"}]);
        let obj = element_as_object(&params, 0).unwrap();
        assert_eq!(object_field_as_str(obj, "from"), Some("0xabc"));
    }
}
