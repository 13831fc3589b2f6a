//! Per-node configuration.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Immutable identity of one node in a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Position of the node in its cluster.
    pub index: usize,

    /// Data directory passed as `-datadir`.
    pub data_dir: PathBuf,

    /// P2P listen port.
    pub p2p_port: u16,

    /// JSON-RPC port.
    pub rpc_port: u16,

    /// RPC username.
    pub rpc_user: String,

    /// RPC password.
    pub rpc_password: String,
}

impl NodeConfig {
    /// Derives the configuration of node `index`: ports are `base + index`
    /// and the data directory is `<root>/node<index>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PortOverflow`] if either port exceeds `u16::MAX`.
    pub fn for_index(
        index: usize,
        root: &Path,
        base_port: u16,
        base_rpc_port: u16,
        rpc_user: &str,
        rpc_password: &str,
    ) -> Result<Self> {
        let offset = u16::try_from(index).map_err(|_| Error::PortOverflow { index })?;
        let p2p_port = base_port
            .checked_add(offset)
            .ok_or(Error::PortOverflow { index })?;
        let rpc_port = base_rpc_port
            .checked_add(offset)
            .ok_or(Error::PortOverflow { index })?;

        Ok(Self {
            index,
            data_dir: root.join(format!("node{index}")),
            p2p_port,
            rpc_port,
            rpc_user: rpc_user.to_string(),
            rpc_password: rpc_password.to_string(),
        })
    }

    /// Address other nodes use to reach this node's P2P port.
    #[must_use]
    pub fn p2p_addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.p2p_port))
    }

    /// Command-line flags for the daemon: identity, regtest mode, RPC server
    /// enabled, logging to the console, no daemonisation.
    #[must_use]
    pub fn daemon_args(&self) -> Vec<String> {
        vec![
            format!("-datadir={}", self.data_dir.display()),
            format!("-port={}", self.p2p_port),
            format!("-rpcport={}", self.rpc_port),
            format!("-rpcuser={}", self.rpc_user),
            format!("-rpcpassword={}", self.rpc_password),
            "-rpcbind=127.0.0.1".to_string(),
            "-regtest".to_string(),
            "-server".to_string(),
            "-listen=1".to_string(),
            "-printtoconsole".to_string(),
        ]
    }
}

/// How a node is launched and supervised.
#[derive(Debug, Clone)]
pub struct NodeOptions {
    /// Executable to launch.
    pub binary: PathBuf,

    /// Arguments placed before the daemon flags, for running the daemon
    /// under a wrapper (e.g. `valgrind`).
    pub leading_args: Vec<String>,

    /// Arguments appended after the generated daemon flags.
    pub extra_args: Vec<String>,

    /// Deadline for the readiness probe.
    pub startup_timeout: Duration,

    /// Interval between readiness probes.
    pub readiness_interval: Duration,

    /// Per-request timeout of a single readiness probe.
    pub probe_timeout: Duration,

    /// Per-request timeout for regular RPC calls.
    pub rpc_timeout: Duration,

    /// Time to wait for a voluntary exit after the RPC `stop`.
    pub stop_grace_period: Duration,

    /// Time to wait for exit after `SIGTERM` before sending `SIGKILL`.
    pub terminate_grace_period: Duration,
}

impl NodeOptions {
    /// Creates options with default timeouts for `binary`.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            leading_args: Vec::new(),
            extra_args: Vec::new(),
            startup_timeout: Duration::from_secs(60),
            readiness_interval: Duration::from_millis(100),
            probe_timeout: Duration::from_secs(2),
            rpc_timeout: Duration::from_secs(30),
            stop_grace_period: Duration::from_secs(10),
            terminate_grace_period: Duration::from_secs(5),
        }
    }

    /// Sets the arguments placed before the daemon flags.
    #[must_use]
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the arguments appended after the daemon flags.
    #[must_use]
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the readiness deadline.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Sets both stop grace periods.
    #[must_use]
    pub const fn with_stop_grace_periods(mut self, stop: Duration, terminate: Duration) -> Self {
        self.stop_grace_period = stop;
        self.terminate_grace_period = terminate;
        self
    }
}
