//! Reader ingestion for Racetrack.
//!
//! Accepts checkpoint-reader connections over TCP, turns each frame into a
//! tag lookup, and appends one race event per resolved tag. Every connection
//! runs in its own task; tasks share the registry and event store but take no
//! locks of their own.
//!
//! The protocol is fire-and-forget: nothing is written back to the reader.
//! Per-frame results are logged and published as [`FrameOutcome`]s.

pub mod config;
mod frame;
pub mod outcome;
mod service;

pub use config::{Framing, IngestConfig};
pub use outcome::{
  CloseReason, ConnectionStats, ConnectionSummary, FrameOutcome, Stage,
};
pub use service::Ingestor;
