//! What happened to each frame and each connection.

use racetrack_core::event::RaceEvent;

/// Which store call failed for a [`FrameOutcome::StorageFailed`] frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Resolve,
  Record,
}

/// The result of processing a single frame. Published to subscribers of
/// [`crate::Ingestor::subscribe`] and logged; never sent to the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
  Recorded { tag: String, event: RaceEvent },
  /// No participant owns the tag. Zero events were written.
  UnknownTag { tag: String },
  /// The store failed; the frame is dropped, not retried later.
  StorageFailed { tag: String, stage: Stage, error: String },
}

impl FrameOutcome {
  pub fn tag(&self) -> &str {
    match self {
      Self::Recorded { tag, .. }
      | Self::UnknownTag { tag }
      | Self::StorageFailed { tag, .. } => tag,
    }
  }
}

/// Why a connection reached its terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
  /// Zero-byte read.
  PeerClosed,
  ReadError(String),
  /// No data within the configured read deadline.
  TimedOut,
  /// Line mode only: a line exceeded `max_frame_len`.
  FrameTooLong,
  Shutdown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
  pub frames:   u64,
  pub recorded: u64,
  pub unknown:  u64,
  pub failed:   u64,
}

impl ConnectionStats {
  pub(crate) fn count(&mut self, outcome: &FrameOutcome) {
    self.frames += 1;
    match outcome {
      FrameOutcome::Recorded { .. } => self.recorded += 1,
      FrameOutcome::UnknownTag { .. } => self.unknown += 1,
      FrameOutcome::StorageFailed { .. } => self.failed += 1,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
  pub stats:  ConnectionStats,
  pub reason: CloseReason,
}
