//! Ingestion settings, deserialised from the `[ingest]` table of the server
//! configuration.

use std::time::Duration;

use racetrack_core::event::DEFAULT_EVENT_TYPE;
use serde::Deserialize;

/// How a reader's byte stream is split into tag frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
  /// Whatever one transport read returns is one tag.
  #[default]
  Chunk,
  /// Newline-delimited tags; a read may carry several, or part of one.
  Line,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
  /// Event type recorded for every resolved frame.
  pub event_type:       String,
  pub framing:          Framing,
  /// Read buffer size in chunk mode, so a longer write arrives as several
  /// frames of at most this many bytes. In line mode, the longest accepted
  /// line in bytes, excluding the newline.
  pub max_frame_len:    usize,
  /// Admission limit on concurrently served readers. `0` lifts the limit.
  pub max_connections:  usize,
  /// Idle deadline for each read. `0` waits forever.
  pub read_timeout_ms:  u64,
  /// Extra attempts for a store call that failed with a busy/locked error.
  pub busy_retries:     u32,
  /// Base delay between busy retries; grows linearly with the attempt.
  pub busy_backoff_ms:  u64,
  /// How long shutdown waits for open connections before aborting them.
  pub drain_timeout_ms: u64,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      event_type:       DEFAULT_EVENT_TYPE.to_owned(),
      framing:          Framing::default(),
      max_frame_len:    1024,
      max_connections:  1024,
      read_timeout_ms:  300_000,
      busy_retries:     3,
      busy_backoff_ms:  50,
      drain_timeout_ms: 10_000,
    }
  }
}

impl IngestConfig {
  pub fn read_timeout(&self) -> Option<Duration> {
    (self.read_timeout_ms > 0).then(|| Duration::from_millis(self.read_timeout_ms))
  }

  pub fn busy_backoff(&self) -> Duration { Duration::from_millis(self.busy_backoff_ms) }

  pub fn drain_timeout(&self) -> Duration { Duration::from_millis(self.drain_timeout_ms) }

  /// Number of permits for the admission gate.
  pub fn admission_permits(&self) -> usize {
    match self.max_connections {
      0 => tokio::sync::Semaphore::MAX_PERMITS,
      n => n,
    }
  }
}
