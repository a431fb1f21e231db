pub mod config;
pub mod endpoint;
pub mod jsonrpc;

/// Default listen port for the relay's HTTP surface.
pub const DEFAULT_PORT: u16 = 5000;

/// Default host for the relay's HTTP surface.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default seconds between health monitor cycles.
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 5;

/// Default "behind" tolerance before an endpoint is demoted as stale.
pub const DEFAULT_MAX_BLOCKS_BEHIND: u64 = 6;

/// Minimum interval between config file re-reads, regardless of caller.
pub const CONFIG_RELOAD_THROTTLE_SECS: u64 = 30;

/// Window over which per-endpoint call timestamps are retained.
pub const TIMESTAMP_WINDOW_SECS: u64 = 60;

/// Back-off between rate-limit retries in the selector.
pub const RATE_LIMIT_BACKOFF_MS: u64 = 50;
