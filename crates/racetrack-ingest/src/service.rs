//! [`Ingestor`] — the accept loop and the per-connection state machine.

use std::{
  future::Future,
  net::SocketAddr,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use racetrack_core::{
  StoreError, participant::ParticipantId, resolver::TagResolver,
  store::EventStore,
};
use tokio::{
  io::{AsyncRead, AsyncReadExt as _},
  net::TcpListener,
  sync::{Semaphore, broadcast, watch},
  task::{JoinError, JoinSet},
};
use tracing::Instrument as _;
use uuid::Uuid;

use crate::{
  config::IngestConfig,
  frame::FrameDecoder,
  outcome::{
    CloseReason, ConnectionStats, ConnectionSummary, FrameOutcome, Stage,
  },
};

/// Outcomes buffered per subscriber before it starts lagging.
const OUTCOME_CAPACITY: usize = 1024;

/// Pause after a failed `accept` so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// ─── Ingestor ────────────────────────────────────────────────────────────────

/// Turns reader frames into race events.
///
/// Cloning is cheap; clones share the resolver, the event store, the
/// outcome channel and the active-connection count.
pub struct Ingestor<R, E> {
  resolver: Arc<R>,
  events:   Arc<E>,
  config:   Arc<IngestConfig>,
  outcomes: broadcast::Sender<FrameOutcome>,
  active:   Arc<AtomicUsize>,
}

impl<R, E> Clone for Ingestor<R, E> {
  fn clone(&self) -> Self {
    Self {
      resolver: Arc::clone(&self.resolver),
      events:   Arc::clone(&self.events),
      config:   Arc::clone(&self.config),
      outcomes: self.outcomes.clone(),
      active:   Arc::clone(&self.active),
    }
  }
}

impl<R, E> Ingestor<R, E>
where
  R: TagResolver + 'static,
  E: EventStore + 'static,
{
  pub fn new(resolver: Arc<R>, events: Arc<E>, config: IngestConfig) -> Self {
    let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);
    Self {
      resolver,
      events,
      config: Arc::new(config),
      outcomes,
      active: Arc::new(AtomicUsize::new(0)),
    }
  }

  pub fn config(&self) -> &IngestConfig { &self.config }

  /// Receive every [`FrameOutcome`] produced after this call.
  pub fn subscribe(&self) -> broadcast::Receiver<FrameOutcome> {
    self.outcomes.subscribe()
  }

  /// Connections currently being served.
  pub fn active_connections(&self) -> usize {
    self.active.load(Ordering::SeqCst)
  }

  // ── Accept loop ─────────────────────────────────────────────────────────

  /// Serve readers on `listener` until `shutdown` resolves, then drain.
  ///
  /// A permit from the admission gate is taken *before* each `accept`, so
  /// once `max_connections` readers are connected further peers wait in the
  /// listen backlog. On shutdown, open connections are told to close and
  /// given `drain_timeout` to finish their current frame; stragglers are
  /// aborted.
  pub async fn serve<F>(
    &self,
    listener: TcpListener,
    shutdown: F,
  ) -> std::io::Result<()>
  where
    F: Future<Output = ()> + Send,
  {
    let gate = Arc::new(Semaphore::new(self.config.admission_permits()));
    let (stop_tx, stop_rx) = watch::channel(false);
    let mut connections = JoinSet::new();

    tracing::info!(addr = %listener.local_addr()?, "reader listener started");
    tokio::pin!(shutdown);

    loop {
      while let Some(done) = connections.try_join_next() {
        reap(done);
      }

      let permit = tokio::select! {
        () = &mut shutdown => break,
        Some(done) = connections.join_next() => { reap(done); continue; }
        permit = Arc::clone(&gate).acquire_owned() => match permit {
          Ok(p) => p,
          Err(_) => break,
        },
      };

      let (stream, peer) = tokio::select! {
        () = &mut shutdown => break,
        accepted = listener.accept() => match accepted {
          Ok(conn) => conn,
          Err(e) => {
            tracing::warn!(error = %e, "failed to accept reader connection");
            tokio::time::sleep(ACCEPT_BACKOFF).await;
            continue;
          }
        },
      };

      let ingestor = self.clone();
      let stop = stop_rx.clone();
      let span = tracing::info_span!("reader", conn = %Uuid::new_v4(), %peer);
      connections.spawn(
        async move {
          let _permit = permit;
          ingestor.serve_peer(stream, peer, stop).await
        }
        .instrument(span),
      );
    }

    drop(listener);
    let _ = stop_tx.send(true);
    tracing::info!(
      open = connections.len(),
      "reader listener stopping, draining connections"
    );

    let drained = tokio::time::timeout(self.config.drain_timeout(), async {
      while let Some(done) = connections.join_next().await {
        reap(done);
      }
    })
    .await
    .is_ok();

    if !drained {
      tracing::warn!(
        remaining = connections.len(),
        "drain timed out, aborting connections"
      );
      connections.shutdown().await;
    }
    Ok(())
  }

  async fn serve_peer<S>(
    &self,
    stream: S,
    peer: SocketAddr,
    stop: watch::Receiver<bool>,
  ) -> ConnectionSummary
  where
    S: AsyncRead + Unpin + Send,
  {
    tracing::info!(%peer, "reader connected");
    self.handle_connection(stream, stop).await
  }

  // ── Connection state machine ────────────────────────────────────────────

  /// Process one reader stream until it closes.
  ///
  /// Connected → Reading → Resolving → (Recording) → Reading … → Closed.
  /// Frames are handled strictly one at a time, so events from the same
  /// connection are recorded in arrival order. Unknown tags and storage
  /// failures are reported and the loop carries on; only the transport
  /// (EOF, read error, deadline), an overlong line, or `stop` closes it.
  pub async fn handle_connection<S>(
    &self,
    mut stream: S,
    mut stop: watch::Receiver<bool>,
  ) -> ConnectionSummary
  where
    S: AsyncRead + Unpin + Send,
  {
    let _active = ActiveGuard::enter(&self.active);
    let max_len = self.config.max_frame_len.max(1);
    let mut decoder = FrameDecoder::new(self.config.framing, max_len);
    let mut scratch = vec![0u8; max_len];
    let mut stats = ConnectionStats::default();

    let reason = loop {
      // Reading
      let read = tokio::select! {
        () = shutdown_requested(&mut stop) => break CloseReason::Shutdown,
        read = self.read_chunk(&mut stream, &mut scratch) => read,
      };

      let tags = match read {
        Ok(0) => {
          if let Some(tag) = decoder.finish() {
            self.process(tag, &mut stats).await;
          }
          break CloseReason::PeerClosed;
        }
        Ok(n) => match decoder.push(&scratch[..n]) {
          Ok(tags) => tags,
          Err(_) => break CloseReason::FrameTooLong,
        },
        Err(reason) => break reason,
      };

      for tag in tags {
        self.process(tag, &mut stats).await;
      }
    };

    tracing::info!(
      ?reason,
      frames = stats.frames,
      recorded = stats.recorded,
      unknown = stats.unknown,
      failed = stats.failed,
      "reader disconnected"
    );
    ConnectionSummary { stats, reason }
  }

  async fn read_chunk<S>(
    &self,
    stream: &mut S,
    scratch: &mut [u8],
  ) -> Result<usize, CloseReason>
  where
    S: AsyncRead + Unpin + Send,
  {
    let read = match self.config.read_timeout() {
      Some(deadline) => tokio::time::timeout(deadline, stream.read(scratch))
        .await
        .map_err(|_| CloseReason::TimedOut)?,
      None => stream.read(scratch).await,
    };
    read.map_err(|e| CloseReason::ReadError(e.to_string()))
  }

  async fn process(&self, tag: String, stats: &mut ConnectionStats) {
    let outcome = self.ingest_frame(tag).await;
    stats.count(&outcome);
    self.publish(outcome);
  }

  // ── Per-frame pipeline ──────────────────────────────────────────────────

  /// Resolve `tag` and, if it belongs to a participant, append one event.
  pub async fn ingest_frame(&self, tag: String) -> FrameOutcome {
    // Resolving
    let resolved = self.with_busy_retry(|| self.resolver.resolve(&tag)).await;
    let participant_id: ParticipantId = match resolved {
      Ok(Some(id)) => id,
      Ok(None) => return FrameOutcome::UnknownTag { tag },
      Err(e) => {
        return FrameOutcome::StorageFailed {
          tag,
          stage: Stage::Resolve,
          error: e.to_string(),
        };
      }
    };

    // Recording
    let event_type = self.config.event_type.as_str();
    let appended = self
      .with_busy_retry(|| self.events.append(participant_id, event_type))
      .await;
    match appended {
      Ok(event) => FrameOutcome::Recorded { tag, event },
      Err(e) => FrameOutcome::StorageFailed {
        tag,
        stage: Stage::Record,
        error: e.to_string(),
      },
    }
  }

  /// Run `op`, retrying while the store reports transient contention.
  async fn with_busy_retry<T, Er, F, Fut>(&self, mut op: F) -> Result<T, Er>
  where
    Er: StoreError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Er>>,
  {
    let mut attempt = 0;
    loop {
      match op().await {
        Err(e)
          if e.kind().is_transient() && attempt < self.config.busy_retries =>
        {
          attempt += 1;
          tracing::debug!(attempt, error = %e, "store busy, retrying");
          tokio::time::sleep(self.config.busy_backoff() * attempt).await;
        }
        res => return res,
      }
    }
  }

  fn publish(&self, outcome: FrameOutcome) {
    match &outcome {
      FrameOutcome::Recorded { tag, event } => tracing::info!(
        %tag,
        participant_id = %event.participant_id,
        event_id = %event.event_id,
        "tag read and recorded"
      ),
      FrameOutcome::UnknownTag { tag } => tracing::warn!(
        error = %racetrack_core::Error::TagNotFound(tag.clone()),
        "frame dropped"
      ),
      FrameOutcome::StorageFailed { tag, stage, error } => tracing::error!(
        %tag,
        ?stage,
        %error,
        "failed to record race event, frame dropped"
      ),
    }
    // No subscribers is the normal case outside tests.
    let _ = self.outcomes.send(outcome);
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Resolves once `stop` is set. A dropped sender means nobody can stop us,
/// so it never resolves in that case.
async fn shutdown_requested(stop: &mut watch::Receiver<bool>) {
  loop {
    if *stop.borrow_and_update() {
      return;
    }
    if stop.changed().await.is_err() {
      std::future::pending::<()>().await;
    }
  }
}

fn reap(done: Result<ConnectionSummary, JoinError>) {
  if let Err(e) = done
    && e.is_panic()
  {
    tracing::error!(error = %e, "reader connection task panicked");
  }
}

/// Keeps the active-connection count in step with live connection loops.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
  fn enter(count: &'a AtomicUsize) -> Self {
    count.fetch_add(1, Ordering::SeqCst);
    Self(count)
  }
}

impl Drop for ActiveGuard<'_> {
  fn drop(&mut self) { self.0.fetch_sub(1, Ordering::SeqCst); }
}
