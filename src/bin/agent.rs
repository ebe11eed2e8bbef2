use anyhow::Context;
use calc_dispatch::config::AgentConfig;
use calc_dispatch::dispatch::Agent;
use calc_dispatch::runtime::{init_tracing, shutdown_channel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AgentConfig::from_env().context("invalid agent configuration")?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        orchestrator = %config.orchestrator_addr,
        "Starting calc-agent"
    );

    Agent::new(config)
        .run(shutdown_channel())
        .await
        .context("agent failed")
}
