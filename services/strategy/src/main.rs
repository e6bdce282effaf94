use anyhow::Context as _;
use tracing::info;
use tracing_subscriber::EnvFilter;

use momentum_strategy::{ServiceConfig, StrategyService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env();
    info!(nats_url = %config.nats_url, "starting momentum strategy service");

    let service = StrategyService::connect(config)
        .await
        .context("service startup failed")?;

    service.run().await
}
