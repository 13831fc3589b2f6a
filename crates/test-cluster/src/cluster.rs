//! Cluster setup, wiring, convergence and teardown.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::join_all;
use intcoin_rpc_client::RpcClient;
use intcoin_test_node::{NodeConfig, NodeHandle, NodeState};
use tempfile::TempDir;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ClusterConfig;
use crate::error::{Error, Result};

/// An ordered set of running nodes sharing one temporary root.
///
/// Either every node is running or the cluster has been torn down. Dropping
/// a cluster that was not torn down kills its daemons and removes the root.
pub struct Cluster {
    config: ClusterConfig,
    nodes: Vec<NodeHandle>,
    root: Option<TempDir>,
    root_path: PathBuf,
}

impl Cluster {
    /// Creates a fresh temporary root and starts every node in index order.
    ///
    /// If any node fails to start, the nodes started so far are stopped, the
    /// root is removed, and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the root cannot be
    /// created, or a node fails to start.
    pub async fn setup(config: ClusterConfig) -> Result<Self> {
        config.validate()?;

        let root = create_root(&config)?;
        let root_path = root.path().to_path_buf();

        info!(
            nodes = config.node_count,
            root = %root_path.display(),
            "setting up cluster"
        );

        let mut nodes = Vec::with_capacity(config.node_count);

        for index in 0..config.node_count {
            if let Err(e) = start_node(&config, &root_path, index, &mut nodes).await {
                warn!(node = index, "cluster setup failed, cleaning up: {}", e);
                for (index, e) in stop_nodes(&mut nodes).await {
                    warn!(node = index, "failed to stop node during cleanup: {}", e);
                }
                if let Err(e) = root.close() {
                    warn!("failed to remove temporary root: {}", e);
                }
                return Err(e);
            }
        }

        info!(nodes = nodes.len(), "cluster running");

        Ok(Self {
            config,
            nodes,
            root: Some(root),
            root_path,
        })
    }

    /// The configuration the cluster was set up with.
    #[must_use]
    pub const fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Path of the temporary root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the cluster has no nodes. Never true for a set-up cluster.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in index order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    /// Node `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeIndex`] if there is no such node.
    pub fn node(&self, index: usize) -> Result<&NodeHandle> {
        self.nodes.get(index).ok_or(Error::NodeIndex {
            index,
            len: self.nodes.len(),
        })
    }

    /// Node `index`, mutably, for restarting it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeIndex`] if there is no such node.
    pub fn node_mut(&mut self, index: usize) -> Result<&mut NodeHandle> {
        let len = self.nodes.len();
        self.nodes.get_mut(index).ok_or(Error::NodeIndex { index, len })
    }

    /// RPC client of node `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeIndex`] if there is no such node.
    pub fn rpc(&self, index: usize) -> Result<&RpcClient> {
        Ok(self.node(index)?.rpc())
    }

    /// Asks node `from` to connect to node `to`'s P2P port.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown index, a torn-down cluster, or a
    /// failed `addnode` call.
    pub async fn connect_nodes(&self, from: usize, to: usize) -> Result<()> {
        self.ensure_live()?;

        let peer = self.node(to)?.config().p2p_addr().to_string();
        debug!(from, to, %peer, "connecting nodes");
        self.node(from)?.rpc().add_node(&peer).await?;

        Ok(())
    }

    /// Connects every node to its successor: `0 -> 1 -> ... -> n-1`.
    ///
    /// # Errors
    ///
    /// Returns the first failed `addnode` call.
    pub async fn connect_chain(&self) -> Result<()> {
        for index in 1..self.nodes.len() {
            self.connect_nodes(index - 1, index).await?;
        }

        info!(nodes = self.nodes.len(), "nodes connected in a chain");
        Ok(())
    }

    /// Polls every node's block count until all are equal and returns the
    /// agreed height.
    ///
    /// Transport failures count as "not yet" and are reported as `None`;
    /// an RPC error from the daemon is returned immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SyncTimeout`] with the last observed heights once
    /// `timeout` elapses.
    pub async fn sync_heights(&self, timeout: Duration) -> Result<u64> {
        self.ensure_live()?;

        let deadline = Instant::now() + timeout;
        let mut heights = vec![None; self.nodes.len()];
        let mut interval = self.poll_interval();

        loop {
            interval.tick().await;

            // A poll still in flight at the deadline is abandoned.
            let Ok(polled) = time::timeout_at(deadline, self.poll_heights()).await else {
                break;
            };
            heights = polled?;

            if let Some(height) = agreed_height(&heights) {
                debug!(height, "nodes in sync");
                return Ok(height);
            }

            if Instant::now() >= deadline {
                break;
            }
        }

        Err(Error::SyncTimeout { timeout, heights })
    }

    /// [`sync_heights`](Self::sync_heights) with the configured default
    /// deadline.
    ///
    /// # Errors
    ///
    /// See [`sync_heights`](Self::sync_heights).
    pub async fn sync_all(&self) -> Result<u64> {
        self.sync_heights(self.config.sync_timeout).await
    }

    /// Returns every node's block hash at `height`, in index order.
    ///
    /// # Errors
    ///
    /// Returns the first failed `getblockhash` call.
    pub async fn block_hashes_at(&self, height: u64) -> Result<Vec<String>> {
        self.ensure_live()?;

        join_all(self.nodes.iter().map(|node| node.rpc().get_block_hash(height)))
            .await
            .into_iter()
            .map(|hash| hash.map_err(Error::from))
            .collect()
    }

    /// Polls node `index`'s balance until it reaches `minimum`.
    ///
    /// Returns `Ok(false)` if `timeout` elapses first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeIndex`] for an unknown node or the RPC error
    /// reported by the daemon.
    pub async fn wait_for_balance(
        &self,
        index: usize,
        minimum: f64,
        timeout: Duration,
    ) -> Result<bool> {
        self.ensure_live()?;
        let rpc = self.rpc(index)?;
        let deadline = Instant::now() + timeout;
        let mut interval = self.poll_interval();

        loop {
            interval.tick().await;

            let Ok(polled) = time::timeout_at(deadline, rpc.get_balance()).await else {
                return Ok(false);
            };

            match polled {
                Ok(balance) if balance >= minimum => return Ok(true),
                Ok(balance) => debug!(node = index, balance, minimum, "waiting for balance"),
                Err(e) if e.is_transport() => debug!(node = index, "balance poll failed: {}", e),
                Err(e) => return Err(e.into()),
            }

            if Instant::now() >= deadline {
                return Ok(false);
            }
        }
    }

    /// Stops every node and removes the temporary root (or keeps it when
    /// configured to). Every node is attempted even if some fail. Calling
    /// this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Teardown`] listing the nodes that failed to stop.
    pub async fn teardown(&mut self) -> Result<()> {
        let Some(root) = self.root.take() else {
            return Ok(());
        };

        info!(nodes = self.nodes.len(), "tearing down cluster");

        let failures = stop_nodes(&mut self.nodes).await;
        for (index, e) in &failures {
            warn!(node = index, "failed to stop node: {}", e);
        }

        if self.config.keep_tmpdir {
            let path = root.keep();
            info!(root = %path.display(), "keeping temporary root");
        } else if let Err(e) = root.close() {
            warn!(root = %self.root_path.display(), "failed to remove temporary root: {}", e);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Teardown { failures })
        }
    }

    fn poll_interval(&self) -> time::Interval {
        let mut interval = time::interval(self.config.sync_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    async fn poll_heights(&self) -> Result<Vec<Option<u64>>> {
        let results = join_all(self.nodes.iter().map(|node| node.rpc().get_block_count())).await;

        let mut heights = Vec::with_capacity(results.len());
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(height) => heights.push(Some(height)),
                Err(e) if e.is_transport() => {
                    debug!(node = index, "height poll failed: {}", e);
                    heights.push(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        debug!(?heights, "polled heights");
        Ok(heights)
    }

    const fn ensure_live(&self) -> Result<()> {
        if self.root.is_some() {
            Ok(())
        } else {
            Err(Error::TornDown)
        }
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        let Some(root) = self.root.take() else {
            return;
        };

        let running = self
            .nodes
            .iter()
            .filter(|node| node.state() != NodeState::Stopped)
            .count();
        if running > 0 {
            warn!(running, "cluster dropped without teardown, killing daemons");
        }

        // Handles kill their daemons when dropped.
        self.nodes.clear();

        if self.config.keep_tmpdir {
            let path = root.keep();
            info!(root = %path.display(), "keeping temporary root");
        }
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("root", &self.root_path)
            .field("nodes", &self.nodes)
            .field("torn_down", &self.root.is_none())
            .finish()
    }
}

fn create_root(config: &ClusterConfig) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("intcoin_func_test_");

    match &config.tmpdir_parent {
        Some(parent) => {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Io("failed to create temporary root parent", e))?;
            builder.tempdir_in(parent)
        }
        None => builder.tempdir(),
    }
    .map_err(|e| Error::Io("failed to create temporary root", e))
}

async fn start_node(
    config: &ClusterConfig,
    root: &Path,
    index: usize,
    nodes: &mut Vec<NodeHandle>,
) -> Result<()> {
    let node_config = NodeConfig::for_index(
        index,
        root,
        config.base_port,
        config.base_rpc_port,
        &config.rpc_user,
        &config.rpc_password,
    )?;

    let mut node = NodeHandle::new(node_config, config.node_options.clone())?;
    node.start(config.extra_args_for(index)).await?;
    nodes.push(node);

    Ok(())
}

async fn stop_nodes(nodes: &mut [NodeHandle]) -> Vec<(usize, intcoin_test_node::Error)> {
    let mut failures = Vec::new();

    for node in nodes.iter_mut() {
        if let Err(e) = node.stop().await {
            failures.push((node.index(), e));
        }
    }

    failures
}

fn agreed_height(heights: &[Option<u64>]) -> Option<u64> {
    let first = (*heights.first()?)?;
    heights
        .iter()
        .all(|height| *height == Some(first))
        .then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agreed_height() {
        assert_eq!(agreed_height(&[Some(5), Some(5), Some(5)]), Some(5));
        assert_eq!(agreed_height(&[Some(5), Some(4), Some(5)]), None);
        assert_eq!(agreed_height(&[Some(0), None]), None);
        assert_eq!(agreed_height(&[None, None]), None);
        assert_eq!(agreed_height(&[]), None);
    }
}
