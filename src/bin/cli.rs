//! CLI for prospecting data files and live sync

use anyhow::Context;
use clap::{Parser, Subcommand};
use prospect_together::common::{format_bytes, Config, SharingSettings};
use prospect_together::exchange::{ChatExchange, ChatOrigin, ImportOutcome};
use prospect_together::store::{Persistence, SaveScheduler, SnapshotFile, StoredSnapshot};
use prospect_together::SyncClient;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "prospect")]
#[command(about = "Shared prospecting map CLI")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what a data file holds, without modifying it
    Stats {
        /// Data file (defaults to the client file in the data directory)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Upgrade a data file to the current schema in place
    Migrate {
        /// Data file
        #[arg(long)]
        file: PathBuf,
    },

    /// Print the data file as a chat payload
    Export {
        /// Data file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Merge a chat line carrying a payload into a data file
    Import {
        /// Data file
        #[arg(long)]
        file: Option<PathBuf>,

        /// The chat line, marker included
        line: String,
    },

    /// Sync a data file with a running server until interrupted
    Connect {
        /// Server address
        #[arg(long)]
        server: Option<SocketAddr>,

        /// Data file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Push every local record to the server after connecting
        #[arg(long)]
        share_all: bool,

        /// Keep own discoveries local
        #[arg(long)]
        no_auto_share: bool,
    },
}

fn open_client_data(config: &Config, file: Option<PathBuf>) -> anyhow::Result<Persistence> {
    let file = match file {
        Some(path) => SnapshotFile::new(path),
        None => {
            let file = SnapshotFile::new(config.storage.client_file());
            file.adopt_legacy(&config.storage.legacy_client_file())?;
            file
        }
    };
    Ok(Persistence::open(file)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Stats { file } => {
            let path = file.unwrap_or_else(|| config.storage.client_file());
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let stored = StoredSnapshot::parse(&bytes)
                .with_context(|| format!("parsing {}", path.display()))?;
            let version = stored.version();
            let snapshot = stored.into_current();
            let unparsed = snapshot
                .records
                .iter()
                .filter(|record| record.values().is_none())
                .count();
            let store = prospect_together::RecordStore::from_snapshot(snapshot);

            println!("Data file: {}", path.display());
            println!("  Size: {}", format_bytes(bytes.len() as u64));
            println!("  Schema version: {}", version);
            println!("  Records: {}", store.len());
            println!("  Unparsed readings: {}", unparsed);
            println!("  Ores found: {}", store.found_ores().join(", "));
        }

        Commands::Migrate { file } => {
            let snapshot_file = SnapshotFile::new(&file);
            if !snapshot_file.exists() {
                anyhow::bail!("{} does not exist", file.display());
            }
            let snapshot = snapshot_file.load()?;
            println!(
                "{} is at the current schema with {} record(s)",
                file.display(),
                snapshot.len()
            );
        }

        Commands::Export { file } => {
            let persistence = open_client_data(&config, file)?;
            let settings = Arc::new(SharingSettings::from(&config.sharing));
            let exchange = ChatExchange::new(persistence.store().clone(), settings);
            println!("{}", exchange.share_text()?);
        }

        Commands::Import { file, line } => {
            let persistence = open_client_data(&config, file)?;
            // Importing by hand is an explicit opt-in for this one line.
            let settings = Arc::new(SharingSettings::new(config.sharing.auto_share, true));
            let exchange = ChatExchange::new(persistence.store().clone(), settings);
            match exchange.on_chat_line(&line, ChatOrigin::Other) {
                ImportOutcome::Imported(count) => {
                    persistence.save()?;
                    println!(
                        "Imported {} record(s) into {}",
                        count,
                        persistence.file().path().display()
                    );
                }
                ImportOutcome::NotPayload => anyhow::bail!("no prospecting data found in line"),
                ImportOutcome::Rejected => anyhow::bail!("prospecting data could not be decoded"),
                other => anyhow::bail!("line not imported: {:?}", other),
            }
        }

        Commands::Connect {
            server,
            file,
            share_all,
            no_auto_share,
        } => {
            let persistence = Arc::new(open_client_data(&config, file)?);
            let settings = Arc::new(SharingSettings::from(&config.sharing));
            if no_auto_share {
                settings.set_auto_share(false);
            }

            let scheduler = SaveScheduler::new(persistence.clone());
            scheduler.start(config.storage.save_interval());

            let addr = server.unwrap_or(config.server.bind_addr);
            let mut client =
                SyncClient::connect(addr, persistence.store().clone(), settings).await?;
            if share_all {
                let sent = client.replicator().share_all();
                println!("Shared {} record(s)", sent);
            }

            let mut changes = persistence.store().subscribe();
            loop {
                tokio::select! {
                    changed = changes.recv() => match changed {
                        Ok(batch) => println!(
                            "Received {} record(s), {} stored",
                            batch.len(),
                            persistence.store().len()
                        ),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("Missed {} change notification(s)", skipped);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = client.closed() => {
                        println!("Server closed the connection");
                        break;
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            client.disconnect();
            if scheduler.shutdown()? {
                println!("Saved {}", persistence.file().path().display());
            }
        }
    }

    Ok(())
}
