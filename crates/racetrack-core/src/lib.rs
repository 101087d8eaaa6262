//! Core types and trait definitions for the Racetrack timing system.
//!
//! This crate is deliberately free of network and database dependencies.
//! All other crates depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod event;
pub mod participant;
pub mod resolver;
pub mod store;

pub use error::{Error, ErrorKind, Result, StoreError};
