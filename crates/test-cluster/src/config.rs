//! Cluster configuration.

use std::path::PathBuf;
use std::time::Duration;

use intcoin_test_node::NodeOptions;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Default base P2P port.
pub const DEFAULT_BASE_PORT: u16 = 19400;

/// Default base RPC port.
pub const DEFAULT_BASE_RPC_PORT: u16 = 19500;

/// Everything needed to set up a cluster.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Number of nodes.
    pub node_count: usize,

    /// P2P port of node 0; node `i` listens on `base_port + i`.
    pub base_port: u16,

    /// RPC port of node 0; node `i` serves RPC on `base_rpc_port + i`.
    pub base_rpc_port: u16,

    /// RPC username shared by all nodes.
    pub rpc_user: String,

    /// RPC password shared by all nodes. Random per configuration, so a
    /// daemon left over on one of the ports rejects the readiness probe.
    pub rpc_password: String,

    /// Daemon binary, timeouts and arguments common to every node.
    pub node_options: NodeOptions,

    /// Extra daemon arguments per node, indexed like the nodes.
    pub extra_args: Vec<Vec<String>>,

    /// Interval between polls while waiting for convergence.
    pub sync_interval: Duration,

    /// Default deadline for [`Cluster::sync_all`](crate::Cluster::sync_all).
    pub sync_timeout: Duration,

    /// Keep the temporary root after teardown.
    pub keep_tmpdir: bool,

    /// Directory the temporary root is created in; the system default if
    /// unset.
    pub tmpdir_parent: Option<PathBuf>,
}

impl ClusterConfig {
    /// Creates a configuration for `node_count` nodes launched with
    /// `node_options`.
    #[must_use]
    pub fn new(node_count: usize, node_options: NodeOptions) -> Self {
        Self {
            node_count,
            base_port: DEFAULT_BASE_PORT,
            base_rpc_port: DEFAULT_BASE_RPC_PORT,
            rpc_user: "intcoin".to_string(),
            rpc_password: Uuid::new_v4().simple().to_string(),
            node_options,
            extra_args: Vec::new(),
            sync_interval: Duration::from_millis(500),
            sync_timeout: Duration::from_secs(60),
            keep_tmpdir: false,
            tmpdir_parent: None,
        }
    }

    /// Sets the base P2P and RPC ports.
    #[must_use]
    pub const fn with_ports(mut self, base_port: u16, base_rpc_port: u16) -> Self {
        self.base_port = base_port;
        self.base_rpc_port = base_rpc_port;
        self
    }

    /// Sets the RPC credentials.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.rpc_user = user.into();
        self.rpc_password = password.into();
        self
    }

    /// Sets the per-node extra daemon arguments.
    #[must_use]
    pub fn with_extra_args(mut self, extra_args: Vec<Vec<String>>) -> Self {
        self.extra_args = extra_args;
        self
    }

    /// Sets the convergence poll interval.
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the default convergence deadline.
    #[must_use]
    pub const fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// Keeps the temporary root after teardown.
    #[must_use]
    pub const fn with_keep_tmpdir(mut self, keep: bool) -> Self {
        self.keep_tmpdir = keep;
        self
    }

    /// Creates the temporary root inside `parent`.
    #[must_use]
    pub fn with_tmpdir_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.tmpdir_parent = Some(parent.into());
        self
    }

    /// Extra daemon arguments of node `index`.
    #[must_use]
    pub fn extra_args_for(&self, index: usize) -> &[String] {
        self.extra_args.get(index).map_or(&[], Vec::as_slice)
    }

    /// Checks that the cluster is non-empty and every node's ports fit in
    /// `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyCluster`] or a port overflow error.
    pub fn validate(&self) -> Result<()> {
        if self.node_count == 0 {
            return Err(Error::EmptyCluster);
        }

        let last = self.node_count - 1;
        let fits = |base: u16| {
            u16::try_from(last)
                .ok()
                .and_then(|offset| base.checked_add(offset))
                .is_some()
        };

        if fits(self.base_port) && fits(self.base_rpc_port) {
            Ok(())
        } else {
            Err(intcoin_test_node::Error::PortOverflow { index: last }.into())
        }
    }
}
