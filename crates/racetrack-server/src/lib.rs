//! Process composition for Racetrack: one SQLite store shared by the
//! registration HTTP listener and the reader TCP listener.

use std::{
  future::Future,
  net::SocketAddr,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use axum::Router;
use racetrack_core::resolver::RegistryResolver;
use racetrack_ingest::{IngestConfig, Ingestor};
use racetrack_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from the TOML config file and
/// `RACETRACK_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub store_path:  PathBuf,
  pub http_host:   String,
  pub http_port:   u16,
  pub reader_host: String,
  pub reader_port: u16,
  pub ingest:      IngestConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      store_path:  PathBuf::from("race_system.db"),
      http_host:   "0.0.0.0".to_string(),
      http_port:   8080,
      reader_host: "0.0.0.0".to_string(),
      reader_port: 9090,
      ingest:      IngestConfig::default(),
    }
  }
}

impl ServerConfig {
  /// Layer the optional file at `path` under the environment.
  ///
  /// Nested keys use a double underscore: `RACETRACK_INGEST__FRAMING=line`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("RACETRACK")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }
}

// ─── Server ───────────────────────────────────────────────────────────────────

type SqliteIngestor = Ingestor<RegistryResolver<SqliteStore>, SqliteStore>;

/// Both listeners, bound and ready to serve.
pub struct Server {
  http:     TcpListener,
  readers:  TcpListener,
  store:    Arc<SqliteStore>,
  ingestor: SqliteIngestor,
}

impl Server {
  /// Bind the HTTP and reader listeners described by `config`.
  pub async fn bind(config: &ServerConfig, store: SqliteStore) -> anyhow::Result<Self> {
    let http_addr = format!("{}:{}", config.http_host, config.http_port);
    let http = TcpListener::bind(&http_addr)
      .await
      .with_context(|| format!("failed to bind {http_addr}"))?;

    let reader_addr = format!("{}:{}", config.reader_host, config.reader_port);
    let readers = TcpListener::bind(&reader_addr)
      .await
      .with_context(|| format!("failed to bind {reader_addr}"))?;

    let store = Arc::new(store);
    let resolver = Arc::new(RegistryResolver::new(Arc::clone(&store)));
    let ingestor = Ingestor::new(resolver, Arc::clone(&store), config.ingest.clone());

    Ok(Self { http, readers, store, ingestor })
  }

  pub fn http_addr(&self) -> std::io::Result<SocketAddr> { self.http.local_addr() }

  pub fn reader_addr(&self) -> std::io::Result<SocketAddr> { self.readers.local_addr() }

  pub fn ingestor(&self) -> &SqliteIngestor { &self.ingestor }

  /// Serve both listeners until `shutdown` resolves or either one fails,
  /// then stop the other and wait for both to drain.
  pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
  where
    F: Future<Output = ()> + Send + 'static,
  {
    let Self { http, readers, store, ingestor } = self;
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);

    tokio::spawn({
      let stop_tx = Arc::clone(&stop_tx);
      async move {
        shutdown.await;
        tracing::info!("shutdown requested");
        let _ = stop_tx.send(true);
      }
    });

    let app = Router::new()
      .nest("/api", racetrack_api::api_router(store))
      .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", http.local_addr()?);
    let http_task = tokio::spawn({
      let stop_tx = Arc::clone(&stop_tx);
      let stop_rx = stop_rx.clone();
      async move {
        let res = axum::serve(http, app)
          .with_graceful_shutdown(stopped(stop_rx))
          .await;
        let _ = stop_tx.send(true);
        res
      }
    });

    let reader_task = tokio::spawn({
      let stop_tx = Arc::clone(&stop_tx);
      async move {
        let res = ingestor.serve(readers, stopped(stop_rx)).await;
        let _ = stop_tx.send(true);
        res
      }
    });

    let (http_res, reader_res) = tokio::join!(http_task, reader_task);
    http_res
      .context("http task panicked")?
      .context("http server error")?;
    reader_res
      .context("reader task panicked")?
      .context("reader listener error")?;

    tracing::info!("server stopped");
    Ok(())
  }
}

async fn stopped(mut rx: watch::Receiver<bool>) {
  // A dropped sender also means nobody is left to keep us running.
  let _ = rx.wait_for(|stop| *stop).await;
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use racetrack_ingest::{FrameOutcome, Framing};
  use racetrack_core::store::{EventStore, ParticipantRegistry};
  use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpStream,
    sync::oneshot,
  };

  fn loopback_config() -> ServerConfig {
    ServerConfig {
      http_host: "127.0.0.1".into(),
      http_port: 0,
      reader_host: "127.0.0.1".into(),
      reader_port: 0,
      ..ServerConfig::default()
    }
  }

  #[test]
  fn defaults_match_reference_ports() {
    let cfg = ServerConfig::default();
    assert_eq!(cfg.http_port, 8080);
    assert_eq!(cfg.reader_port, 9090);
    assert_eq!(cfg.ingest.event_type, "checkpoint");
    assert_eq!(cfg.ingest.framing, Framing::Chunk);
  }

  #[test]
  fn partial_toml_keeps_defaults() {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(
        "reader_port = 7000\n[ingest]\nframing = \"line\"\nmax_connections = 8\n",
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap();
    let cfg: ServerConfig = settings.try_deserialize().unwrap();

    assert_eq!(cfg.reader_port, 7000);
    assert_eq!(cfg.http_port, 8080);
    assert_eq!(cfg.ingest.framing, Framing::Line);
    assert_eq!(cfg.ingest.max_connections, 8);
    assert_eq!(cfg.ingest.event_type, "checkpoint");
  }

  #[test]
  fn missing_config_file_is_not_an_error() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/racetrack.toml")).unwrap();
    assert_eq!(cfg.store_path, PathBuf::from("race_system.db"));
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/race.db")),
      PathBuf::from(home).join("race.db")
    );
    assert_eq!(expand_tilde(Path::new("/tmp/race.db")), PathBuf::from("/tmp/race.db"));
  }

  async fn http_post(addr: SocketAddr, path: &str, body: &str) -> String {
    let mut conn = TcpStream::connect(addr).await.unwrap();
    let req = format!(
      "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\
       Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
      body.len()
    );
    conn.write_all(req.as_bytes()).await.unwrap();
    let mut resp = String::new();
    conn.read_to_string(&mut resp).await.unwrap();
    resp
  }

  #[tokio::test]
  async fn registration_and_reader_share_one_store() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let server = Server::bind(&loopback_config(), store.clone()).await.unwrap();
    let http = server.http_addr().unwrap();
    let readers = server.reader_addr().unwrap();
    let mut outcomes = server.ingestor().subscribe();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(server.run(async {
      let _ = stop_rx.await;
    }));

    let resp = http_post(
      http,
      "/api/register",
      r#"{"name":"Ada","age":30,"gender":"F","rfidTag":"TAG1"}"#,
    )
    .await;
    assert!(resp.starts_with("HTTP/1.1 201"), "{resp}");

    let resp = http_post(
      http,
      "/api/register",
      r#"{"name":"Bob","age":41,"gender":"M","rfidTag":"TAG1"}"#,
    )
    .await;
    assert!(resp.starts_with("HTTP/1.1 409"), "{resp}");

    let mut reader = TcpStream::connect(readers).await.unwrap();
    reader.write_all(b"TAG1").await.unwrap();
    let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), outcomes.recv())
      .await
      .unwrap()
      .unwrap();
    let FrameOutcome::Recorded { event, .. } = outcome else {
      panic!("expected Recorded, got {outcome:?}");
    };

    let ada = store.find_by_tag("TAG1").await.unwrap().unwrap();
    assert_eq!(event.participant_id, ada);
    assert_eq!(store.list_by_participant(ada).await.unwrap().len(), 1);
    assert_eq!(store.list_participants().await.unwrap().len(), 1);

    drop(reader);
    stop_tx.send(()).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), running)
      .await
      .unwrap()
      .unwrap()
      .unwrap();
  }
}
