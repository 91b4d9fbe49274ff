//! Authoritative sync server binary

use anyhow::Context;
use clap::Parser;
use prospect_together::common::Config;
use prospect_together::store::{Persistence, SaveScheduler, SnapshotFile};
use prospect_together::SyncServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "prospect-server")]
#[command(about = "Shared prospecting map server")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address for the sync channel
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Minutes between periodic saves (1-60)
    #[arg(long)]
    save_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config from file and environment, then apply CLI overrides
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(minutes) = cli.save_interval {
        config.storage.save_interval_minutes = minutes;
    }
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting prospect-server {}", prospect_together::BUILD_INFO);

    let file = SnapshotFile::new(config.storage.server_file());
    let persistence = Arc::new(Persistence::open(file)?);
    tracing::info!(
        "Loaded {} prospect record(s) from {}",
        persistence.store().len(),
        persistence.file().path().display()
    );

    let scheduler = SaveScheduler::new(persistence.clone());
    scheduler.start(config.storage.save_interval());

    let server = SyncServer::new(persistence.store().clone());
    let listener = TcpListener::bind(config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;

    let served = server
        .serve_until(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    // Final save runs whatever happened to the listener
    let saved = scheduler.shutdown();
    served?;
    if saved? {
        tracing::info!("Final save complete");
    }
    Ok(())
}
