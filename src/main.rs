mod app;
mod config;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::{App, ClearTarget};

#[derive(Parser, Debug)]
#[command(name = "wellsync")]
#[command(about = "Offline cache and mutation sync engine")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/wellsync/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Behave as if the network were unreachable
  #[arg(long, global = true)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Read a path through its cache strategy
  Get { path: String },
  /// Send a write; queued when offline
  Send {
    method: String,
    path: String,
    /// JSON body
    #[arg(short, long)]
    body: Option<String>,
  },
  /// Replay queued writes now
  Sync,
  /// Show connectivity and the queue
  Status,
  /// Probe connectivity and sync in the background until interrupted
  Watch,
  /// Empty a store partition
  Clear {
    #[arg(value_enum)]
    target: ClearTarget,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _guard = init_logging(&config.log_level)?;

  let app = App::new(config, args.offline).await?;

  match args.command {
    Command::Get { path } => print(&app.get(&path).await?)?,
    Command::Send { method, path, body } => {
      print(&app.send(&method, &path, body.as_deref()).await?)?
    }
    Command::Sync => print(&app.sync().await?)?,
    Command::Status => print(&app.status().await?)?,
    Command::Watch => app.watch().await?,
    Command::Clear { target } => {
      let removed = app.clear(target).await?;
      println!("removed {} entries", removed);
    }
  }

  Ok(())
}

/// Log to a daily file under the data directory, keeping stdout for results.
fn init_logging(level: &str) -> Result<WorkerGuard> {
  let dir = dirs::data_dir()
    .ok_or_else(|| eyre!("Could not determine the data directory"))?
    .join("wellsync")
    .join("logs");
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, "wellsync.log"));
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(level))
    .map_err(|e| eyre!("Invalid log level {:?}: {}", level, e))?;

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}

fn print<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
