//! Shared application state for the relay. Collects the config store, the
//! endpoint table, the cache, the selector, and the health monitor behind a
//! single cloneable handle, the same shape the teacher used for its admin
//! panel's `AppState`.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use relay_core::{ConfigStore, EndpointTable, HealthMonitor, ReqwestRpcClient, ResponseCache, RpcClient, Selector};
use relay_protocol::config::RelayConfig;

#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub start_time: Instant,
    pub config_store: ConfigStore,
    pub table: Arc<EndpointTable>,
    pub cache: ResponseCache,
    pub selector: Selector,
    pub health_monitor: HealthMonitor,
    pub rpc_client: Arc<dyn RpcClient>,
    /// Unix seconds of the last `update_statuses` run, throttled to
    /// `relay.monitor_interval` regardless of which worker observes it.
    pub last_monitor_run_unix_secs: AtomicI64,
    pub total_calls: AtomicU64,
    pub cached_calls: AtomicU64,
}

impl AppState {
    pub fn new(config_store: ConfigStore) -> anyhow::Result<Self> {
        let initial = config_store.current();
        let table = Arc::new(EndpointTable::new(&initial));
        let rpc_client: Arc<dyn RpcClient> = Arc::new(ReqwestRpcClient::new()?);
        let health_monitor = HealthMonitor::new(table.clone(), rpc_client.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                start_time: Instant::now(),
                config_store,
                table,
                cache: ResponseCache::new(),
                selector: Selector::new(),
                health_monitor,
                rpc_client,
                last_monitor_run_unix_secs: AtomicI64::new(0),
                total_calls: AtomicU64::new(0),
                cached_calls: AtomicU64::new(0),
            }),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    pub fn current_config(&self) -> Arc<RelayConfig> {
        self.inner.config_store.current()
    }

    /// Poll C1 for a reload and react to whichever sections changed. Called
    /// on entry to every HTTP handler (spec §4.6 step 1, §4.7).
    pub async fn maybe_reload(&self) {
        let event = self.inner.config_store.maybe_reload();
        if !event.any() {
            return;
        }
        let config = self.inner.config_store.current();
        self.inner
            .table
            .reconcile(&config, event.endpoints_changed)
            .await;
        if event.cache_ttl_changed && config.cache_ttl.is_empty() {
            self.inner.cache.clear().await;
        }
    }

    /// Run the health monitor at most once per `monitor_interval`, from
    /// whichever worker happens to notice the window has elapsed first.
    pub async fn maybe_run_monitor(&self, config: &RelayConfig) {
        let now = unix_secs();
        let last = self.inner.last_monitor_run_unix_secs.load(Ordering::Relaxed);
        if now - last < config.relay.monitor_interval as i64 {
            return;
        }
        if self
            .inner
            .last_monitor_run_unix_secs
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        self.inner.health_monitor.update_statuses(config).await;
    }
}

fn unix_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
