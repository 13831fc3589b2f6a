//! Runner tests against stand-in daemons backed by mock RPC servers.

use std::path::Path;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use intcoin_rpc_client::rpc_error_code;
use intcoin_rpc_mock::port_allocator::allocate_port_range;
use intcoin_rpc_mock::{MockDaemon, MockDaemonOptions};
use intcoin_test_framework::assertions::{assert_equal, assert_raises_rpc_error};
use intcoin_test_framework::{
    Cluster, ClusterConfig, Context, FunctionalTest, Outcome, TestError, TestRunner,
};
use intcoin_test_node::NodeOptions;
use tempfile::TempDir;

struct Environment {
    config: ClusterConfig,
    mocks: Vec<MockDaemon>,
    parent: TempDir,
}

async fn environment(nodes: u16) -> Environment {
    let base_port = allocate_port_range(nodes);
    let base_rpc_port = allocate_port_range(nodes);
    let parent = tempfile::tempdir().unwrap();

    let mut options = NodeOptions::new("/bin/sh")
        .with_leading_args(["-c", "exec sleep 600", "intcoind"])
        .with_startup_timeout(Duration::from_secs(2))
        .with_stop_grace_periods(Duration::from_millis(100), Duration::from_secs(2));
    options.readiness_interval = Duration::from_millis(20);
    options.probe_timeout = Duration::from_millis(200);

    let config = ClusterConfig::new(usize::from(nodes), options)
        .with_ports(base_port, base_rpc_port)
        .with_sync_interval(Duration::from_millis(50))
        .with_tmpdir_parent(parent.path());

    let mut mocks = Vec::new();
    for offset in 0..nodes {
        let options = MockDaemonOptions::default()
            .with_credentials(&config.rpc_user, &config.rpc_password);
        mocks.push(
            MockDaemon::start_on_port(base_rpc_port + offset, options)
                .await
                .expect("Failed to start mock daemon"),
        );
    }

    Environment {
        config,
        mocks,
        parent,
    }
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[tokio::test]
async fn test_passing_body() {
    let env = environment(2).await;

    let body = async |cluster: &mut Cluster| -> Result<(), TestError> {
        cluster.node(0)?.generate_blocks(10).await?;
        assert_equal(cluster.rpc(0)?.get_block_count().await?, 10u64).context("height")?;
        Ok(())
    };

    let report = TestRunner::run("mine", env.config.clone(), body).await;

    assert_eq!(report.name, "mine");
    assert_eq!(report.outcome, Outcome::Passed);
    assert!(env.mocks.iter().all(MockDaemon::stop_requested));
    assert!(is_empty_dir(env.parent.path()));
}

#[tokio::test]
async fn test_failed_assertion_is_not_a_fault() {
    let env = environment(1).await;

    let body = async |cluster: &mut Cluster| -> Result<(), TestError> {
        let height = cluster.rpc(0)?.get_block_count().await?;
        assert_equal(height, 5u64).context("initial height")?;
        Ok(())
    };

    let report = TestRunner::run("height", env.config.clone(), body).await;

    assert_eq!(
        report.outcome,
        Outcome::AssertionFailed("initial height: expected 5, got 0".to_string())
    );
    assert_eq!(report.outcome.exit_code(), 1);
    assert!(env.mocks[0].stop_requested());
    assert!(is_empty_dir(env.parent.path()));
}

#[tokio::test]
async fn test_panic_is_caught_and_cluster_torn_down() {
    let env = environment(1).await;

    let body = async |_cluster: &mut Cluster| -> Result<(), TestError> {
        panic!("unexpected chain state");
    };

    let report = TestRunner::run("panics", env.config.clone(), body).await;

    assert_matches!(
        report.outcome,
        Outcome::Faulted(ref message) if message.contains("unexpected chain state")
    );
    assert!(env.mocks[0].stop_requested());
    assert!(is_empty_dir(env.parent.path()));
}

#[tokio::test]
async fn test_unexpected_rpc_error_is_a_fault() {
    let env = environment(1).await;

    let body = async |cluster: &mut Cluster| -> Result<(), TestError> {
        cluster.rpc(0)?.call("nonexistentmethod", vec![]).await?;
        Ok(())
    };

    let report = TestRunner::run("rpc", env.config.clone(), body).await;

    assert_matches!(
        report.outcome,
        Outcome::Faulted(ref message) if message.contains("Method not found")
    );
}

#[tokio::test]
async fn test_expected_rpc_error_passes() {
    let env = environment(1).await;

    let body = async |cluster: &mut Cluster| -> Result<(), TestError> {
        let rpc = cluster.rpc(0)?;
        let address = rpc.get_new_address().await?;
        assert_raises_rpc_error(
            rpc.send_to_address(&address, 1_000_000.0).await,
            rpc_error_code::WALLET_INSUFFICIENT_FUNDS,
            "insufficient funds",
        )?;
        Ok(())
    };

    let report = TestRunner::run("funds", env.config.clone(), body).await;

    assert_eq!(report.outcome, Outcome::Passed);
}

#[tokio::test]
async fn test_setup_failure_is_a_fault() {
    let env = environment(1).await;
    let mut config = env.config.clone();
    // No mock serves this port, so the node never becomes ready.
    config.base_rpc_port = allocate_port_range(1);
    config.node_options.startup_timeout = Duration::from_millis(500);

    let body = async |_cluster: &mut Cluster| -> Result<(), TestError> {
        unreachable!("body must not run when setup fails")
    };

    let report = TestRunner::run("unreachable", config, body).await;

    assert_matches!(
        report.outcome,
        Outcome::Faulted(ref message) if message.starts_with("cluster setup failed")
    );
    assert!(is_empty_dir(env.parent.path()));
}

struct SyncedHeights;

#[async_trait]
impl FunctionalTest for SyncedHeights {
    fn name(&self) -> &'static str {
        "synced_heights"
    }

    fn node_count(&self) -> usize {
        2
    }

    async fn run(&self, cluster: &mut Cluster) -> Result<(), TestError> {
        cluster.connect_chain().await?;
        let height = cluster.sync_heights(Duration::from_secs(1)).await?;
        assert_equal(height, 0u64)?;
        Ok(())
    }
}

struct WrongNodeCount;

#[async_trait]
impl FunctionalTest for WrongNodeCount {
    fn name(&self) -> &'static str {
        "wrong_node_count"
    }

    fn node_count(&self) -> usize {
        2
    }

    async fn run(&self, cluster: &mut Cluster) -> Result<(), TestError> {
        assert_equal(cluster.len(), 3usize)?;
        Ok(())
    }
}

#[tokio::test]
async fn test_suite_aggregates_outcomes() {
    let env = environment(2).await;
    let runner = TestRunner::new(env.config.clone());
    let tests: Vec<Box<dyn FunctionalTest>> =
        vec![Box::new(SyncedHeights), Box::new(WrongNodeCount)];

    let suite = runner.run_suite(&tests).await;

    assert_eq!(suite.reports.len(), 2);
    assert_eq!(suite.reports[0].outcome, Outcome::Passed);
    assert_matches!(suite.reports[1].outcome, Outcome::AssertionFailed(_));
    assert_eq!(suite.passed(), 1);
    assert_eq!(suite.exit_code(), 1);
    assert_eq!(env.mocks[0].peers().len(), 1);
}
