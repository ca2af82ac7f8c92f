//! # albumsync
//!
//! Command-line client for a remote photo library.
//!
//! ## Commands
//!
//! - `browse`: Interactive folder browser (cache first, revalidated in the background)
//! - `ls`: List one folder
//! - `sync-album`: Resync an album and reload its folder in place
//! - `chat`: Send a message over the realtime channel and print replies
//! - `status`: Show configuration and local state
//!
//! ## Example
//!
//! ```bash
//! # Browse the offline demo library
//! albumsync --mock browse
//!
//! # List a folder on a real service
//! albumsync --config albumsync.toml ls /Trips/Italy
//!
//! # Resync an album while looking at its folder
//! albumsync sync-album A123 --folder /Trips/Italy
//!
//! # Talk on the realtime channel
//! albumsync chat "hello" --session conv-1
//! ```

use albumsync_client::{
    BusInterceptor, ChannelManager, EventBus, HttpClient, HttpPhotoApi,
    MockTransport, PhotoApi, SyncEngine, WebSocketTransport,
};
use albumsync_types::SessionId;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::broadcast::error::RecvError;

mod commands;
mod config;
mod demo;

use commands::{browse, chat, ls, status, sync_album};

/// Browse and sync a remote photo library.
#[derive(Parser, Debug)]
#[command(name = "albumsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (default: ./albumsync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the persisted client id
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use the built-in demo library and a loopback channel (no network)
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Browse folders interactively (commands are read from stdin)
    Browse,

    /// List one folder
    Ls {
        /// Folder path
        #[arg(default_value = "/")]
        path: String,
    },

    /// Resync an album and reload its folder in place
    SyncAlbum {
        /// Album identifier
        album_id: String,

        /// Folder to load first, so the album is shown in context
        #[arg(long)]
        folder: Option<String>,
    },

    /// Send a message over the realtime channel and print replies
    Chat {
        /// Message text
        message: String,

        /// Conversation to continue
        #[arg(long, short)]
        session: Option<String>,

        /// Seconds to wait for replies
        #[arg(long, default_value = "3")]
        wait: u64,
    },

    /// Show configuration and local state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let (config_path, client_config) = config::load_client_config(cli.config.as_deref())?;
    let bus = EventBus::new();
    spawn_event_log(&bus);

    let mut stdout = std::io::stdout();

    match cli.command {
        Commands::Status => {
            status::run(&data_dir, &config_path, &client_config, cli.mock, &mut stdout).await?;
        }
        Commands::Chat {
            message,
            session,
            wait,
        } => {
            let client_id = config::load_or_create_client_id(&data_dir).await?;
            let session_id = session
                .as_deref()
                .map(SessionId::parse)
                .transpose()
                .context("Invalid session id")?;
            let wait = Duration::from_secs(wait);
            let channel_config = client_config.realtime.channel();

            if cli.mock {
                let transport = MockTransport::new();
                transport.set_echo(true);
                let channel = ChannelManager::new(transport, channel_config, bus);
                chat::run(&channel, client_id, session_id, &message, wait, &mut stdout).await?;
            } else {
                let channel = ChannelManager::new(WebSocketTransport::new(), channel_config, bus);
                chat::run(&channel, client_id, session_id, &message, wait, &mut stdout).await?;
            }
        }
        command => {
            if cli.mock {
                let engine = SyncEngine::new(demo::photo_api(), bus);
                run_library(&engine, command).await?;
            } else {
                let http = HttpClient::new(
                    client_config.api.base_url.clone(),
                    client_config.api.timeout(),
                )
                .context("Failed to build HTTP client")?
                .with_interceptor(BusInterceptor::new(bus.clone()));
                let engine = SyncEngine::new(HttpPhotoApi::new(http), bus);
                run_library(&engine, command).await?;
            }
        }
    }

    Ok(())
}

/// Run a command that works on the album tree.
async fn run_library<A: PhotoApi>(engine: &SyncEngine<A>, command: Commands) -> Result<()> {
    let mut stdout = std::io::stdout();
    match command {
        Commands::Browse => {
            let stdin = BufReader::new(tokio::io::stdin());
            browse::run(engine, stdin, &mut stdout).await
        }
        Commands::Ls { path } => ls::run(engine, &path, &mut stdout).await,
        Commands::SyncAlbum { album_id, folder } => {
            sync_album::run(engine, &album_id, folder.as_deref(), &mut stdout).await
        }
        Commands::Chat { .. } | Commands::Status => Ok(()),
    }
}

/// Install the stderr log subscriber (`RUST_LOG` overrides the default).
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        // Prefix match: also covers the albumsync_* library crates
        tracing_subscriber::EnvFilter::new("albumsync=info")
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Mirror every bus event into the debug log.
fn spawn_event_log(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::debug!(
                    seq = event.seq,
                    topic = %event.topic,
                    "{}",
                    serde_json::to_string(&event.event).unwrap_or_default()
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event log fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Get the default data directory for albumsync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "albumsync", "albumsync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
