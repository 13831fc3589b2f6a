//! Error type for test bodies.

use thiserror::Error;

use crate::assertions::AssertionError;

/// Everything a test body can fail with.
///
/// Only [`TestError::Assertion`] counts as a test failure; every other
/// variant means the test could not run to completion.
#[derive(Debug, Error)]
pub enum TestError {
    /// A check on the observed state failed.
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    /// A cluster operation failed, including sync timeouts.
    #[error(transparent)]
    Cluster(#[from] intcoin_test_cluster::Error),

    /// A node operation failed.
    #[error(transparent)]
    Node(#[from] intcoin_test_node::Error),

    /// An RPC call failed unexpectedly.
    #[error(transparent)]
    Rpc(#[from] intcoin_rpc_client::Error),
}
