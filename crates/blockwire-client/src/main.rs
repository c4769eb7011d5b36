mod config;
mod player;
mod proxy;
mod session;

use config::ClientConfig;
use proxy::Proxy;
use session::Session;
use std::path::Path;
use std::sync::Arc;
use blockwire_events::HandlerRegistry;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting blockwire client...");

    let config = ClientConfig::load(Path::new("config/client.toml"))?;

    if let Some(proxy_cfg) = &config.proxy {
        info!(
            "Running in proxy mode: {} -> {}",
            proxy_cfg.listen, proxy_cfg.upstream
        );
        let proxy = Proxy::new(proxy_cfg.listen.clone(), proxy_cfg.upstream.clone());
        proxy.run().await?;
        return Ok(());
    }

    info!(
        "Connecting to {}:{} as {}",
        config.host, config.port, config.player_name
    );

    let registry = Arc::new(HandlerRegistry::new());
    let mut session = Session::connect(
        &config.host,
        config.port,
        &config.player_name,
        &config.locale,
        config.view_distance,
        Path::new(&config.data_dir),
        registry,
    )
    .await?;

    if let Err(e) = session.run().await {
        error!("session ended: {}", e);
    }

    Ok(())
}
