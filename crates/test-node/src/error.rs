//! Error types for the test-node crate.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use crate::node::NodeState;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the test-node crate.
#[derive(Debug, Error)]
pub enum Error
where
    Self: Send + Sync,
{
    /// The daemon executable could not be located.
    #[error("intcoind binary not found (searched: {})", display_paths(.searched))]
    BinaryNotFound {
        /// Every location that was checked.
        searched: Vec<PathBuf>,
    },

    /// An operation was attempted from a state that does not allow it.
    #[error("cannot {operation} node {index} while it is {state}")]
    InvalidState {
        /// Node index.
        index: usize,
        /// The rejected operation.
        operation: &'static str,
        /// The state the node was in.
        state: NodeState,
    },

    /// IO error.
    #[error("io error ({0}): {1}")]
    Io(&'static str, #[source] io::Error),

    /// The node index does not fit the configured port ranges.
    #[error("ports for node {index} overflow the port range")]
    PortOverflow {
        /// Node index.
        index: usize,
    },

    /// The daemon exited before its RPC interface became ready.
    #[error("node {index} exited during startup with {status}")]
    ProcessExited {
        /// Node index.
        index: usize,
        /// Exit status of the daemon.
        status: ExitStatus,
    },

    /// An RPC call failed.
    #[error(transparent)]
    Rpc(#[from] intcoin_rpc_client::Error),

    /// Sending a signal to the daemon failed.
    #[error("failed to signal node {index}: {source}")]
    Signal {
        /// Node index.
        index: usize,
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },

    /// The daemon did not answer the readiness probe in time.
    #[error("node {index} did not become ready within {timeout:?}")]
    StartupTimeout {
        /// Node index.
        index: usize,
        /// The readiness deadline that elapsed.
        timeout: Duration,
    },

    /// The spawned process has no pid.
    #[error("spawned process for node {index} has no pid")]
    MissingPid {
        /// Node index.
        index: usize,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
