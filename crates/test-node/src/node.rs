//! The node handle and its lifecycle state machine.

use std::fmt;

use intcoin_rpc_client::{RpcClient, RpcClientOptions};
use nix::sys::signal::Signal;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::{NodeConfig, NodeOptions};
use crate::error::{Error, Result};
use crate::process::DaemonProcess;

/// Lifecycle state of a node.
///
/// `NotStarted -> Starting -> Running -> Stopping -> Stopped`, and a stopped
/// node may be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// The daemon has never been launched.
    NotStarted,
    /// The daemon is launched but its RPC interface has not answered yet.
    Starting,
    /// The daemon answers RPC.
    Running,
    /// Shutdown is in progress.
    Stopping,
    /// The daemon process has exited and been reaped.
    Stopped,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Handle to one daemon process under test.
///
/// Dropping the handle kills a still-running daemon.
pub struct NodeHandle {
    config: NodeConfig,
    options: NodeOptions,
    state: NodeState,
    process: Option<DaemonProcess>,
    rpc: RpcClient,
    probe: RpcClient,
}

impl NodeHandle {
    /// Creates a handle for a node that is not started yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the RPC clients cannot be built.
    pub fn new(config: NodeConfig, options: NodeOptions) -> Result<Self> {
        let rpc_options =
            RpcClientOptions::new(config.rpc_port, &config.rpc_user, &config.rpc_password);

        let rpc = RpcClient::new(rpc_options.clone().with_timeout(options.rpc_timeout))?;
        let probe = RpcClient::new(rpc_options.with_timeout(options.probe_timeout))?;

        Ok(Self {
            config,
            options,
            state: NodeState::NotStarted,
            process: None,
            rpc,
            probe,
        })
    }

    /// Position of the node in its cluster.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.config.index
    }

    /// The node's configuration.
    #[must_use]
    pub const fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> NodeState {
        self.state
    }

    /// PID of the daemon while a process exists.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(DaemonProcess::pid)
    }

    /// Whether a daemon process exists and has not exited. An exited
    /// process is reaped by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the process status cannot be polled.
    pub fn is_process_alive(&mut self) -> Result<bool> {
        match self.process.as_mut() {
            Some(process) => Ok(process.try_exit_status()?.is_none()),
            None => Ok(false),
        }
    }

    /// RPC client bound to this node. Calls fail at the transport level
    /// while the node is not running.
    #[must_use]
    pub const fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Launches the daemon and waits until its RPC interface answers.
    ///
    /// On failure the process is gone and the node is `Stopped`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] unless the node is `NotStarted` or `Stopped`
    /// - [`Error::ProcessExited`] if the daemon exits before it is ready
    /// - [`Error::StartupTimeout`] if the readiness deadline elapses
    pub async fn start(&mut self, extra_args: &[String]) -> Result<()> {
        if !matches!(self.state, NodeState::NotStarted | NodeState::Stopped) {
            return Err(self.invalid_state("start"));
        }

        let index = self.index();

        tokio::fs::create_dir_all(&self.config.data_dir)
            .await
            .map_err(|e| Error::Io("failed to create data directory", e))?;

        let args: Vec<String> = self
            .options
            .leading_args
            .iter()
            .cloned()
            .chain(self.config.daemon_args())
            .chain(self.options.extra_args.iter().cloned())
            .chain(extra_args.iter().cloned())
            .collect();

        info!(
            node = index,
            rpc_port = self.config.rpc_port,
            p2p_port = self.config.p2p_port,
            "starting node"
        );

        self.process = Some(DaemonProcess::spawn(&self.options.binary, &args, index)?);
        self.state = NodeState::Starting;

        match self.wait_until_ready().await {
            Ok(()) => {
                self.state = NodeState::Running;
                info!(node = index, "node ready");
                Ok(())
            }
            Err(e) => {
                warn!(node = index, "node failed to start: {}", e);
                if let Some(mut process) = self.process.take() {
                    if let Err(kill_error) = process.kill().await {
                        warn!(node = index, "failed to kill daemon: {}", kill_error);
                    }
                    process.finish_output().await;
                }
                self.state = NodeState::Stopped;
                Err(e)
            }
        }
    }

    /// Shuts the daemon down: RPC `stop`, then `SIGTERM`, then `SIGKILL`,
    /// each after its grace period. A node that is not running is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] while the node is starting or
    /// stopping, or an error if the process could not be terminated.
    pub async fn stop(&mut self) -> Result<()> {
        match self.state {
            NodeState::NotStarted | NodeState::Stopped => return Ok(()),
            NodeState::Starting | NodeState::Stopping => return Err(self.invalid_state("stop")),
            NodeState::Running => {}
        }

        let index = self.index();
        info!(node = index, "stopping node");
        self.state = NodeState::Stopping;

        let Some(mut process) = self.process.take() else {
            self.state = NodeState::Stopped;
            return Ok(());
        };

        // The daemon may already be unresponsive; signals follow regardless.
        match time::timeout(self.options.stop_grace_period, self.rpc.stop()).await {
            Ok(Ok(())) => debug!(node = index, "stop RPC accepted"),
            Ok(Err(e)) => debug!(node = index, "stop RPC failed: {}", e),
            Err(_) => debug!(node = index, "stop RPC timed out"),
        }

        let result = self.terminate(&mut process).await;
        process.finish_output().await;
        self.state = NodeState::Stopped;

        if result.is_ok() {
            info!(node = index, "node stopped");
        }
        result
    }

    /// Mines `count` blocks on this node and returns their hashes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] unless the node is running, or the
    /// RPC error.
    pub async fn generate_blocks(&self, count: u64) -> Result<Vec<String>> {
        if self.state != NodeState::Running {
            return Err(self.invalid_state("generate blocks on"));
        }

        Ok(self.rpc.generate(count).await?)
    }

    async fn wait_until_ready(&mut self) -> Result<()> {
        let index = self.index();
        let timeout = self.options.startup_timeout;
        let deadline = Instant::now() + timeout;

        let mut interval = time::interval(self.options.readiness_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            self.ensure_not_exited()?;

            match time::timeout_at(deadline, self.probe.get_blockchain_info()).await {
                Ok(Ok(info)) => {
                    // The answer may come from another server on the port.
                    self.ensure_not_exited()?;
                    debug!(node = index, chain = %info.chain, blocks = info.blocks, "readiness probe succeeded");
                    return Ok(());
                }
                // Warmup errors and refused connections both mean "not yet".
                Ok(Err(e)) => trace!(node = index, "readiness probe failed: {}", e),
                Err(_) => return Err(Error::StartupTimeout { index, timeout }),
            }

            if Instant::now() >= deadline {
                return Err(Error::StartupTimeout { index, timeout });
            }
        }
    }

    fn ensure_not_exited(&mut self) -> Result<()> {
        let index = self.index();
        let process = self.process.as_mut().ok_or(Error::MissingPid { index })?;

        match process.try_exit_status()? {
            Some(status) => Err(Error::ProcessExited { index, status }),
            None => Ok(()),
        }
    }

    async fn terminate(&self, process: &mut DaemonProcess) -> Result<()> {
        let index = self.index();

        if let Some(status) = process.wait_for_exit(self.options.stop_grace_period).await? {
            debug!(node = index, %status, "daemon exited");
            return Ok(());
        }

        warn!(node = index, "daemon still running after stop RPC, sending SIGTERM");
        process.signal(Signal::SIGTERM)?;

        if let Some(status) = process
            .wait_for_exit(self.options.terminate_grace_period)
            .await?
        {
            debug!(node = index, %status, "daemon exited after SIGTERM");
            return Ok(());
        }

        warn!(node = index, "daemon ignored SIGTERM, sending SIGKILL");
        let status = process.kill().await?;
        debug!(node = index, %status, "daemon killed");

        Ok(())
    }

    const fn invalid_state(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            index: self.config.index,
            operation,
            state: self.state,
        }
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle")
            .field("index", &self.config.index)
            .field("state", &self.state)
            .field("pid", &self.pid())
            .field("rpc_port", &self.config.rpc_port)
            .finish_non_exhaustive()
    }
}
