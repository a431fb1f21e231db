//! C4 — response cache. Keyed by method name plus the canonical JSON
//! encoding of `params` (spec §4.4, P2), so semantically identical calls hit
//! regardless of key order or which client id they arrived under.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use relay_protocol::jsonrpc::canonical_json;
use serde_json::Value;
use tokio::sync::RwLock;

struct Entry {
    result: Value,
    expires_at: Instant,
}

pub struct ResponseCache {
    inner: RwLock<HashMap<String, Entry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn key(method: &str, params: &Value) -> String {
        format!("{method}:{}", canonical_json(params))
    }

    /// `ttl_secs` for `method`, or `None` if the method has no configured
    /// TTL — callers should skip both lookup and store in that case.
    pub fn ttl_for(cache_ttl: &HashMap<String, u64>, method: &str) -> Option<Duration> {
        cache_ttl.get(method).map(|secs| Duration::from_secs(*secs))
    }

    pub async fn lookup(&self, method: &str, params: &Value, now: Instant) -> Option<Value> {
        let key = Self::key(method, params);
        let store = self.inner.read().await;
        let entry = store.get(&key)?;
        if entry.expires_at > now {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    pub async fn store(&self, method: &str, params: &Value, result: Value, now: Instant, ttl: Duration) {
        let key = Self::key(method, params);
        let mut store = self.inner.write().await;
        store.insert(
            key,
            Entry {
                result,
                expires_at: now + ttl,
            },
        );
    }

    /// Drop every entry. Called when a config reload empties `cache_ttl`
    /// entirely (the Python original's behavior when the section disappears
    /// rather than just shrinks).
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn lookup_misses_before_store() {
        let cache = ResponseCache::new();
        let hit = cache.lookup("eth_chainId", &json!([]), Instant::now()).await;
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn store_then_lookup_hits_within_ttl() {
        let cache = ResponseCache::new();
        let now = Instant::now();
        cache
            .store("eth_chainId", &json!([]), json!("0x1"), now, Duration::from_secs(60))
            .await;
        let hit = cache.lookup("eth_chainId", &json!([]), now).await;
        assert_eq!(hit, Some(json!("0x1")));
    }

    #[tokio::test]
    async fn lookup_misses_after_ttl_expires() {
        let cache = ResponseCache::new();
        let now = Instant::now();
        cache
            .store("eth_chainId", &json!([]), json!("0x1"), now, Duration::from_secs(1))
            .await;
        let later = now + Duration::from_secs(2);
        let hit = cache.lookup("eth_chainId", &json!([]), later).await;
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn reordered_param_keys_hit_the_same_entry() {
        let cache = ResponseCache::new();
        let now = Instant::now();
        cache
            .store(
                "eth_call",
                &json!([{"to": "0xabc", "data": "0x1"}]),
                json!("0xresult"),
                now,
                Duration::from_secs(60),
            )
            .await;
        let hit = cache
            .lookup("eth_call", &json!([{"data": "0x1", "to": "0xabc"}]), now)
            .await;
        assert_eq!(hit, Some(json!("0xresult")));
    }

    #[tokio::test]
    async fn clear_drops_all_entries() {
        let cache = ResponseCache::new();
        let now = Instant::now();
        cache
            .store("eth_chainId", &json!([]), json!("0x1"), now, Duration::from_secs(60))
            .await;
        cache.clear().await;
        assert!(cache.lookup("eth_chainId", &json!([]), now).await.is_none());
    }
}
