use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use klk_core::{Companion, ConfigStore, Launcher, Settings, WatchInfo};
use klk_store::{FileSlotStore, MemorySlotStore, SlotStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

mod stdio;

use stdio::{ActionSink, InboundLine, StdioHost, StdioTransport};

#[derive(Parser)]
#[command(
    name = "klk",
    about = "klk companion bridge: configuration round-trips between the watch and its page"
)]
struct Cli {
    /// Path to klk.toml (defaults to ./klk.toml, then ~/.config/klk/klk.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configuration page URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Override the config slot file
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Keep the config slot in memory only
    #[arg(long, global = true)]
    memory_store: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read host events from stdin and write host actions to stdout
    Serve {
        /// Platform of the connected watch (omit to emulate a host without watch info)
        #[arg(long)]
        platform: Option<String>,

        /// Treat every send as delivered without waiting for an ack line
        #[arg(long)]
        auto_ack: bool,
    },
    /// Print the URL the next showConfiguration would open
    Url {
        #[arg(long)]
        platform: Option<String>,
    },
    /// Print the stored configuration
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so they don't interfere with the action stream on stdout
    fmt()
        .with_env_filter(EnvFilter::from_env("KLK_LOG"))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;

    if let Some(url) = cli.base_url {
        settings.surface.base_url = url;
    }
    if let Some(path) = cli.storage {
        settings.storage.path = Some(path);
    }
    if cli.memory_store {
        settings.storage.in_memory = true;
    }

    let store = ConfigStore::new(build_slot(&settings));
    tracing::info!(backend = store.backend_name(), "Config store ready");

    match cli.command {
        Command::Serve { platform, auto_ack } => {
            settings.transport.auto_ack |= auto_ack;
            serve(settings, store, platform.map(WatchInfo::new)).await
        }
        Command::Url { platform } => {
            let host = StdioHost::new(Arc::new(ActionSink::stdout()), platform.map(WatchInfo::new));
            let launcher = Launcher::new(settings.surface.base_url, store, Arc::new(host));
            println!("{}", launcher.build_url());
            Ok(())
        }
        Command::Show => {
            let json = store.load().to_json()?;
            println!("{json}");
            Ok(())
        }
    }
}

fn load_settings(explicit: Option<&std::path::Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return Settings::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    let candidates = [
        Some(PathBuf::from("klk.toml")),
        dirs::config_dir().map(|d| d.join("klk").join("klk.toml")),
    ];
    for path in candidates.into_iter().flatten() {
        if path.exists() {
            tracing::info!(path = %path.display(), "Loading config");
            return Settings::from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()));
        }
    }

    tracing::debug!("No klk.toml found, using defaults");
    Ok(Settings::default())
}

fn build_slot(settings: &Settings) -> Arc<dyn SlotStore> {
    if settings.storage.in_memory {
        return Arc::new(MemorySlotStore::new());
    }
    let path = settings
        .storage
        .path
        .clone()
        .unwrap_or_else(FileSlotStore::default_path);
    Arc::new(FileSlotStore::new(path))
}

async fn serve(settings: Settings, store: ConfigStore, watch: Option<WatchInfo>) -> Result<()> {
    let sink = Arc::new(ActionSink::stdout());
    let host = Arc::new(StdioHost::new(sink.clone(), watch));
    let transport = Arc::new(StdioTransport::new(sink, settings.transport.auto_ack));

    let mut companion = Companion::new(
        settings.surface.base_url.clone(),
        store,
        host,
        transport.clone(),
    );

    tracing::info!(
        base_url = %settings.surface.base_url,
        auto_ack = settings.transport.auto_ack,
        "klk companion serving on stdio"
    );

    // Events and acks share one ordered stream so an ack is never seen
    // before the send it settles.
    let (tx, mut rx) = mpsc::channel::<InboundLine>(64);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read stdin: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<InboundLine>(&line) {
                Ok(inbound) => {
                    if tx.send(inbound).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(line = %line, "Ignoring unrecognised input: {e}"),
            }
        }
    });

    while let Some(inbound) = rx.recv().await {
        match inbound {
            InboundLine::Event(event) => {
                companion.dispatch(event);
                // Let spawned deliveries emit and register before the next line
                tokio::task::yield_now().await;
            }
            InboundLine::Ack { ack } => {
                transport.resolve(ack, Ok(()));
            }
            InboundLine::Nack { nack, error } => {
                transport.resolve(nack, Err(error));
            }
        }
    }
    tracing::info!("Host input closed");

    reader.await.context("stdin reader task failed")?;
    transport.close();

    let outcomes = companion.drain().await;
    let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
    tracing::info!(
        delivered,
        failed = outcomes.len() - delivered,
        "klk companion shutting down"
    );
    Ok(())
}
