use anyhow::Context;
use calc_dispatch::config::ServerConfig;
use calc_dispatch::runtime::{init_tracing, shutdown_channel};
use calc_dispatch::server::run_servers;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        db_path = %config.db_path.display(),
        "Starting calc-server"
    );

    run_servers(config, shutdown_channel()).await
}
