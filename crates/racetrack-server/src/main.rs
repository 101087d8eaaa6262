//! racetrack server binary.
//!
//! Reads `racetrack.toml` (or the path specified with `--config`), opens the
//! SQLite store, and serves the registration API and the reader listener
//! until interrupted.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use racetrack_server::{Server, ServerConfig, expand_tilde};
use racetrack_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Racetrack RFID timing server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "racetrack.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = ServerConfig::load(&cli.config)?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let server = Server::bind(&server_cfg, store).await?;
  tracing::info!(
    http = %server.http_addr()?,
    readers = %server.reader_addr()?,
    store = %store_path.display(),
    "racetrack ready"
  );

  server
    .run(async {
      if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
      }
    })
    .await
}
