//! In-process stand-in for the `intcoind` JSON-RPC interface.
//!
//! Answers the subset of methods the harness and its tests rely on, with the
//! same envelope and HTTP status conventions as the real daemon. Chain state
//! is a plain in-memory list of deterministic block hashes so that separate
//! mock instances at the same height agree on every hash.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod chain;
mod daemon;
pub mod port_allocator;

pub use chain::{MockChain, RecordedRequest, block_hash};
pub use daemon::{MockDaemon, MockDaemonOptions};
