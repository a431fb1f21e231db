use clap::Parser;
use relay_core::ConfigStore;
use relay_server::api;
use relay_server::state::AppState;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "relay-server", about = "JSON-RPC reverse proxy and load balancer for Ethereum-compatible RPC providers")]
struct Args {
    /// Path to the relay's YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Override the listen address from the config file, e.g. 0.0.0.0:5000
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!(config = %args.config, "relay starting");

    let config_store = ConfigStore::load_from_file(&args.config)?;
    let state = AppState::new(config_store)?;

    let config = state.current_config();
    state.inner.health_monitor.update_statuses(&config).await;

    let listen = args
        .listen
        .unwrap_or_else(|| format!("{}:{}", config.relay.host, config.relay.port));

    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!(addr = %listen, "relay listening");

    axum::serve(listener, app).await?;

    Ok(())
}
