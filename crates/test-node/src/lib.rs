//! Lifecycle management for a single `intcoind` process under test.
//!
//! A [`NodeHandle`] spawns the daemon with a generated configuration, waits
//! for its RPC interface to answer, and guarantees the process is gone after
//! [`NodeHandle::stop`] (or when the handle is dropped).
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod binary;
mod config;
mod error;
mod node;
mod process;

pub use binary::{BUILD_OUTPUT_DIRS, DAEMON_ENV_VAR, DAEMON_NAME, discover_daemon};
pub use config::{NodeConfig, NodeOptions};
pub use error::{Error, Result};
pub use node::{NodeHandle, NodeState};
