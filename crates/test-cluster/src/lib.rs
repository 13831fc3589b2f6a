//! A cluster of `intcoind` nodes on one machine.
//!
//! [`Cluster::setup`] starts every node in a fresh temporary root and
//! [`Cluster::teardown`] stops them and removes it again. In between, the
//! cluster wires nodes together and waits for their chain state to converge.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod cluster;
mod config;
mod error;

pub use cluster::Cluster;
pub use config::{ClusterConfig, DEFAULT_BASE_PORT, DEFAULT_BASE_RPC_PORT};
pub use error::{Error, Result};
