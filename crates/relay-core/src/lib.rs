pub mod cache;
pub mod config_store;
pub mod endpoint_table;
pub mod health_monitor;
pub mod rpc_client;
pub mod selector;

pub use cache::ResponseCache;
pub use config_store::{ConfigStore, ReloadEvent};
pub use endpoint_table::EndpointTable;
pub use health_monitor::HealthMonitor;
pub use rpc_client::{ReqwestRpcClient, RpcClient, RpcClientError};
pub use selector::Selector;
