//! C1 — config store. Holds the active `RelayConfig` behind an `ArcSwap` so
//! `current()` is a lock-free read that never blocks on file I/O, and
//! throttles reload-from-disk attempts to once every
//! `CONFIG_RELOAD_THROTTLE_SECS` regardless of how many callers ask.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use relay_protocol::config::RelayConfig;
use relay_protocol::CONFIG_RELOAD_THROTTLE_SECS;
use tracing::{debug, warn};

/// Which top-level sections changed between the previous and newly
/// published snapshot. The endpoint table and cache each care about a
/// different subset of this.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadEvent {
    pub endpoints_changed: bool,
    pub weights_changed: bool,
    pub cache_ttl_changed: bool,
}

impl ReloadEvent {
    pub fn any(&self) -> bool {
        self.endpoints_changed || self.weights_changed || self.cache_ttl_changed
    }
}

pub struct ConfigStore {
    path: PathBuf,
    current: ArcSwap<RelayConfig>,
    /// Seconds since `UNIX_EPOCH` of the last reload attempt — an atomic so
    /// concurrent callers never trigger more than one read per throttle
    /// window (P5).
    last_check_unix_secs: AtomicI64,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, initial: RelayConfig) -> Self {
        Self {
            path: path.into(),
            current: ArcSwap::from_pointee(initial),
            last_check_unix_secs: AtomicI64::new(0),
        }
    }

    pub fn load_from_file(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {:?}: {e}", path))?;
        let config = RelayConfig::from_yaml_str(&contents)
            .map_err(|e| anyhow::anyhow!("failed to parse config file {:?}: {e}", path))?;
        Ok(Self::new(path, config))
    }

    /// Current snapshot. Lock-free; safe to call on every request.
    pub fn current(&self) -> Arc<RelayConfig> {
        self.current.load_full()
    }

    /// Reload from disk if the throttle window has elapsed and the file
    /// parses and differs from the current snapshot. Silent on any I/O or
    /// parse failure (`ConfigReadError`, spec §7) — the previous snapshot
    /// stays active.
    pub fn maybe_reload(&self) -> ReloadEvent {
        let now = unix_secs();
        let last = self.last_check_unix_secs.load(Ordering::Relaxed);
        if now - last < CONFIG_RELOAD_THROTTLE_SECS as i64 {
            return ReloadEvent::default();
        }
        // Claim this throttle window before doing the I/O so concurrent
        // callers racing past the check above still only read the file once.
        if self
            .last_check_unix_secs
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return ReloadEvent::default();
        }

        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = ?self.path, error = %e, "config reload: read failed, keeping snapshot");
                return ReloadEvent::default();
            }
        };
        let parsed: RelayConfig = match RelayConfig::from_yaml_str(&contents) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "config reload: parse failed, keeping snapshot");
                return ReloadEvent::default();
            }
        };

        let previous = self.current.load();
        if *previous == parsed {
            return ReloadEvent::default();
        }

        let event = ReloadEvent {
            endpoints_changed: previous.all_urls() != parsed.all_urls(),
            weights_changed: previous.rpc_endpoints != parsed.rpc_endpoints,
            cache_ttl_changed: previous.cache_ttl != parsed.cache_ttl,
        };
        self.current.store(Arc::new(parsed));
        event
    }
}

fn unix_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn maybe_reload_is_throttled_within_window() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rpc_endpoints:\n  primary:\n    - url: \"http://a\"").unwrap();
        let store = ConfigStore::load_from_file(file.path()).unwrap();

        // Force the throttle window open for exactly one read.
        store.last_check_unix_secs.store(0, Ordering::Relaxed);
        let first = store.maybe_reload();
        assert!(!first.any());

        // Second call within the same window must not re-read the file.
        writeln!(file, "garbage: [").unwrap();
        let second = store.maybe_reload();
        assert!(!second.any());
    }

    #[test]
    fn maybe_reload_detects_endpoint_set_change() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rpc_endpoints:\n  primary:\n    - url: \"http://a\"").unwrap();
        let store = ConfigStore::load_from_file(file.path()).unwrap();
        store.last_check_unix_secs.store(0, Ordering::Relaxed);

        std::fs::write(
            file.path(),
            "rpc_endpoints:\n  primary:\n    - url: \"http://a\"\n    - url: \"http://b\"\n",
        )
        .unwrap();
        // Reset the clock claim so the next call actually re-reads.
        store.last_check_unix_secs.store(0, Ordering::Relaxed);
        let event = store.maybe_reload();
        assert!(event.endpoints_changed);
    }

    #[test]
    fn maybe_reload_ignores_unparseable_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rpc_endpoints:\n  primary:\n    - url: \"http://a\"").unwrap();
        let store = ConfigStore::load_from_file(file.path()).unwrap();
        let before = store.current();

        std::fs::write(file.path(), "not: [valid, yaml,").unwrap();
        store.last_check_unix_secs.store(0, Ordering::Relaxed);
        store.maybe_reload();
        let after = store.current();
        assert_eq!(*before, *after);
    }
}
