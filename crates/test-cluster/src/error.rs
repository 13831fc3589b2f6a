//! Error types for the test-cluster crate.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the test-cluster crate.
#[derive(Debug, Error)]
pub enum Error
where
    Self: Send + Sync,
{
    /// A cluster needs at least one node.
    #[error("cluster must contain at least one node")]
    EmptyCluster,

    /// IO error.
    #[error("io error ({0}): {1}")]
    Io(&'static str, #[source] io::Error),

    /// A node operation failed.
    #[error(transparent)]
    Node(#[from] intcoin_test_node::Error),

    /// No node exists at the given index.
    #[error("no node {index} in a cluster of {len}")]
    NodeIndex {
        /// The requested index.
        index: usize,
        /// Number of nodes in the cluster.
        len: usize,
    },

    /// An RPC call failed.
    #[error(transparent)]
    Rpc(#[from] intcoin_rpc_client::Error),

    /// Node heights did not converge in time.
    #[error("nodes did not sync within {timeout:?}, last heights: {heights:?}")]
    SyncTimeout {
        /// The deadline that elapsed.
        timeout: Duration,
        /// Last observed height per node, `None` where the call failed.
        heights: Vec<Option<u64>>,
    },

    /// One or more nodes could not be stopped during teardown.
    #[error("teardown failed for {} node(s): {}", .failures.len(), display_failures(.failures))]
    Teardown {
        /// Index and error of every node that failed to stop.
        failures: Vec<(usize, intcoin_test_node::Error)>,
    },

    /// The cluster has already been torn down.
    #[error("cluster has been torn down")]
    TornDown,
}

fn display_failures(failures: &[(usize, intcoin_test_node::Error)]) -> String {
    failures
        .iter()
        .map(|(index, error)| format!("node {index}: {error}"))
        .collect::<Vec<_>>()
        .join("; ")
}
