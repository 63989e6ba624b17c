//! Latent Host
//!
//! Runs a session over the tokio platform and drives its tick loop through a
//! demo scripted scenario.

mod config;
mod scenario;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use latent_runtime::Session;
use latent_runtime::platform::TokioPlatform;

use crate::config::HostConfig;

/// Latent task bridge host
#[derive(Parser, Debug)]
#[command(name = "latent_host")]
#[command(about = "Drive a latent task session through a scripted scenario", long_about = None)]
struct Args {
    /// Path to a host.toml file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Milliseconds between ticks
    #[arg(long)]
    tick_ms: Option<u64>,
}

fn main() -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("latent_host=info,latent_runtime=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting latent host v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            HostConfig::load(path)?
        }
        None => HostConfig::default(),
    };
    if let Some(ticks) = args.ticks {
        config.host.max_ticks = ticks;
    }
    if let Some(tick_ms) = args.tick_ms {
        config.host.tick_interval_ms = tick_ms;
    }

    let platform = Arc::new(
        TokioPlatform::current()?
            .with_asset_latency(Duration::from_millis(config.host.asset_latency_ms))
            .with_mounted(scenario::MOUNTED_ASSETS.iter().copied()),
    );
    let session = Session::new(config.session.clone(), platform.clone());

    scenario::run(&session, &platform, &config.host).await
}
