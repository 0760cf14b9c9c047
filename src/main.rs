//! FreeD relay binary
//!
//! Usage: `freed-relay [config.json]`
//!
//! Without an argument, `freed-relay.json` in the working directory is used
//! when present, otherwise the built-in defaults. `FREED_RELAY_*` environment
//! variables override either.

use std::path::Path;

use freed_relay::relay;
use freed_relay::{Config, Result};
use tracing::info;

const DEFAULT_CONFIG_FILE: &str = "freed-relay.json";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("freed_relay=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = if let Some(path) = args.get(1) {
        info!("Loading configuration from {}", path);
        Config::load(Path::new(path))?
    } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
        info!("Loading configuration from {}", DEFAULT_CONFIG_FILE);
        Config::load(Path::new(DEFAULT_CONFIG_FILE))?
    } else {
        info!("Using default configuration");
        Config::default()
    };
    config.apply_env()?;

    info!("freed-relay v{}", freed_relay::VERSION);
    let mut service = relay::bind(&config).await?;

    tokio::select! {
        _ = service.run() => {}
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down");
        }
    }

    service.relay_mut().report_stats();
    Ok(())
}
