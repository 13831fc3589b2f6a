//! Cluster tests. Each node is a `/bin/sh` stand-in process paired with a
//! mock RPC server on the node's RPC port.

use std::path::Path;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use intcoin_rpc_mock::port_allocator::allocate_port_range;
use intcoin_rpc_mock::{MockDaemon, MockDaemonOptions, block_hash};
use intcoin_test_cluster::{Cluster, ClusterConfig, Error};
use intcoin_test_node::{NodeOptions, NodeState};
use tempfile::TempDir;
use tracing_test::traced_test;

struct Fixture {
    config: ClusterConfig,
    mocks: Vec<MockDaemon>,
    parent: TempDir,
}

fn stand_in(script: &str) -> NodeOptions {
    let mut options = NodeOptions::new("/bin/sh")
        .with_leading_args(["-c", script, "intcoind"])
        .with_startup_timeout(Duration::from_secs(10))
        .with_stop_grace_periods(Duration::from_millis(100), Duration::from_secs(2));
    options.readiness_interval = Duration::from_millis(20);
    options.probe_timeout = Duration::from_millis(200);
    options.rpc_timeout = Duration::from_millis(500);
    options
}

/// Prepares a cluster of `count` nodes with mocks serving the first
/// `with_mocks` RPC ports.
async fn fixture(count: u16, with_mocks: u16, script: &str) -> Fixture {
    let base_port = allocate_port_range(count);
    let base_rpc_port = allocate_port_range(count);
    let parent = tempfile::tempdir().unwrap();

    let config = ClusterConfig::new(usize::from(count), stand_in(script))
        .with_ports(base_port, base_rpc_port)
        .with_sync_interval(Duration::from_millis(50))
        .with_sync_timeout(Duration::from_secs(2))
        .with_tmpdir_parent(parent.path());

    let mut mocks = Vec::new();
    for offset in 0..with_mocks {
        let options =
            MockDaemonOptions::default().with_credentials(&config.rpc_user, &config.rpc_password);
        let mock = MockDaemon::start_on_port(base_rpc_port + offset, options)
            .await
            .expect("Failed to start mock daemon");
        mocks.push(mock);
    }

    Fixture {
        config,
        mocks,
        parent,
    }
}

fn process_is_gone(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat")).map_or(true, |stat| {
        stat.rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z'))
    })
}

fn is_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path).unwrap().next().is_none()
}

#[tokio::test]
#[traced_test]
async fn test_setup_starts_every_node() {
    let fixture = fixture(3, 3, "exec sleep 600").await;

    let mut cluster = Cluster::setup(fixture.config.clone()).await.unwrap();

    assert_eq!(cluster.len(), 3);
    assert!(
        cluster
            .nodes()
            .iter()
            .all(|node| node.state() == NodeState::Running)
    );
    for (index, node) in cluster.nodes().iter().enumerate() {
        assert_eq!(node.index(), index);
        assert_eq!(node.config().data_dir, cluster.root().join(format!("node{index}")));
        assert_eq!(
            usize::from(node.config().rpc_port),
            usize::from(fixture.config.base_rpc_port) + index
        );
    }
    assert!(cluster.root().starts_with(fixture.parent.path()));

    let pids: Vec<u32> = cluster.nodes().iter().filter_map(|node| node.pid()).collect();
    cluster.teardown().await.unwrap();

    assert!(pids.into_iter().all(process_is_gone));
    assert!(is_empty_dir(fixture.parent.path()));
    assert!(fixture.mocks.iter().all(MockDaemon::stop_requested));
}

#[tokio::test]
#[traced_test]
async fn test_failed_setup_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pids");
    let script = format!("echo $$ >> {}; exec sleep 600", pid_file.display());
    // Node 2 has no RPC server and never becomes ready.
    let mut fixture = fixture(3, 2, &script).await;
    fixture.config.node_options = fixture
        .config
        .node_options
        .with_startup_timeout(Duration::from_secs(1));

    let error = Cluster::setup(fixture.config.clone()).await.unwrap_err();

    assert_matches!(
        error,
        Error::Node(intcoin_test_node::Error::StartupTimeout { index: 2, .. })
    );
    let pids = std::fs::read_to_string(&pid_file).unwrap();
    let pids: Vec<u32> = pids.lines().map(|line| line.trim().parse().unwrap()).collect();
    assert_eq!(pids.len(), 3);
    assert!(pids.into_iter().all(process_is_gone));
    assert!(is_empty_dir(fixture.parent.path()));
}

#[tokio::test]
async fn test_leftover_daemon_on_rpc_port_fails_setup() {
    let fixture = fixture(1, 0, "sleep 0.3; exit 1").await;
    // A server from another run, using the old fixed credentials.
    let leftover = MockDaemonOptions::default().with_credentials("intcoin", "intcoin");
    let _leftover = MockDaemon::start_on_port(fixture.config.base_rpc_port, leftover)
        .await
        .expect("Failed to start mock daemon");

    let error = Cluster::setup(fixture.config.clone()).await.unwrap_err();

    assert_matches!(
        error,
        Error::Node(intcoin_test_node::Error::ProcessExited { index: 0, .. })
    );
    assert!(is_empty_dir(fixture.parent.path()));
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_spawning() {
    let fixture = fixture(1, 0, "exec sleep 600").await;
    let mut config = fixture.config.clone();
    config.node_count = 0;

    let error = Cluster::setup(config).await.unwrap_err();

    assert_matches!(error, Error::EmptyCluster);
    assert!(is_empty_dir(fixture.parent.path()));
}

#[tokio::test]
async fn test_connect_chain_wires_successors() {
    let fixture = fixture(3, 3, "exec sleep 600").await;
    let mut cluster = Cluster::setup(fixture.config.clone()).await.unwrap();

    cluster.connect_chain().await.unwrap();

    let base_port = fixture.config.base_port;
    assert_eq!(fixture.mocks[0].peers(), vec![format!("127.0.0.1:{}", base_port + 1)]);
    assert_eq!(fixture.mocks[1].peers(), vec![format!("127.0.0.1:{}", base_port + 2)]);
    assert!(fixture.mocks[2].peers().is_empty());

    let request = fixture.mocks[0]
        .requests()
        .into_iter()
        .find(|request| request.method == "addnode")
        .unwrap();
    assert_eq!(request.params[1], "onetry");

    cluster.connect_nodes(2, 0).await.unwrap();
    assert_eq!(fixture.mocks[2].peers(), vec![format!("127.0.0.1:{base_port}")]);

    cluster.teardown().await.unwrap();
}

#[tokio::test]
async fn test_sync_heights_returns_agreed_height() {
    let fixture = fixture(2, 2, "exec sleep 600").await;
    let mut cluster = Cluster::setup(fixture.config.clone()).await.unwrap();
    fixture.mocks[0].set_height(7);
    fixture.mocks[1].set_height(5);

    let mocks = &fixture.mocks;
    let catch_up = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        mocks[1].set_height(7);
    };
    let (height, ()) = tokio::join!(cluster.sync_heights(Duration::from_secs(5)), catch_up);

    assert_eq!(height.unwrap(), 7);

    cluster.teardown().await.unwrap();
}

#[tokio::test]
async fn test_sync_timeout_reports_last_heights() {
    let fixture = fixture(3, 3, "exec sleep 600").await;
    let mut cluster = Cluster::setup(fixture.config.clone()).await.unwrap();
    fixture.mocks[0].set_height(10);
    fixture.mocks[1].set_height(10);
    fixture.mocks[2].set_height(9);

    let started = Instant::now();
    let error = cluster
        .sync_heights(Duration::from_millis(500))
        .await
        .unwrap_err();

    assert_matches!(
        error,
        Error::SyncTimeout { timeout, ref heights }
            if timeout == Duration::from_millis(500) && heights == &[Some(10), Some(10), Some(9)]
    );
    assert!(started.elapsed() < Duration::from_secs(3));

    cluster.teardown().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_node_reports_unknown_height() {
    let fixture = fixture(2, 2, "exec sleep 600").await;
    let mut cluster = Cluster::setup(fixture.config.clone()).await.unwrap();
    // Longer than the RPC timeout, so every poll of node 1 fails.
    fixture.mocks[1].set_response_delay(Duration::from_secs(2));

    let error = cluster.sync_heights(Duration::from_secs(1)).await.unwrap_err();

    assert_matches!(error, Error::SyncTimeout { ref heights, .. } if heights == &[Some(0), None]);

    fixture.mocks[1].set_response_delay(Duration::ZERO);
    cluster.teardown().await.unwrap();
}

#[tokio::test]
async fn test_block_hashes_at_height() {
    let fixture = fixture(2, 2, "exec sleep 600").await;
    let mut cluster = Cluster::setup(fixture.config.clone()).await.unwrap();
    cluster.node(0).unwrap().generate_blocks(3).await.unwrap();
    cluster.node(1).unwrap().generate_blocks(3).await.unwrap();

    let hashes = cluster.block_hashes_at(2).await.unwrap();

    assert_eq!(hashes, vec![block_hash(2), block_hash(2)]);
    assert_matches!(
        cluster.block_hashes_at(4).await,
        Err(Error::Rpc(e)) if e.rpc_code() == Some(-8)
    );

    cluster.teardown().await.unwrap();
}

#[tokio::test]
async fn test_wait_for_balance() {
    let fixture = fixture(2, 2, "exec sleep 600").await;
    let mut cluster = Cluster::setup(fixture.config.clone()).await.unwrap();
    fixture.mocks[1].set_balance(50.0);

    assert!(cluster.wait_for_balance(1, 50.0, Duration::from_secs(1)).await.unwrap());
    assert!(!cluster.wait_for_balance(0, 1.0, Duration::from_millis(300)).await.unwrap());
    assert_matches!(
        cluster.wait_for_balance(5, 1.0, Duration::from_millis(300)).await,
        Err(Error::NodeIndex { index: 5, len: 2 })
    );

    cluster.teardown().await.unwrap();
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    let fixture = fixture(1, 1, "exec sleep 600").await;
    let mut cluster = Cluster::setup(fixture.config.clone()).await.unwrap();

    cluster.teardown().await.unwrap();
    cluster.teardown().await.unwrap();

    assert_eq!(cluster.node(0).unwrap().state(), NodeState::Stopped);
    assert_matches!(cluster.sync_all().await, Err(Error::TornDown));
    assert_eq!(
        fixture.mocks[0]
            .methods()
            .iter()
            .filter(|method| *method == "stop")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_keep_tmpdir_preserves_root() {
    let fixture = fixture(1, 1, "exec sleep 600").await;
    let mut cluster = Cluster::setup(fixture.config.clone().with_keep_tmpdir(true))
        .await
        .unwrap();
    let root = cluster.root().to_path_buf();

    cluster.teardown().await.unwrap();

    assert!(root.join("node0").is_dir());
}

#[tokio::test]
async fn test_drop_kills_daemons_and_removes_root() {
    let fixture = fixture(2, 2, "exec sleep 600").await;
    let cluster = Cluster::setup(fixture.config.clone()).await.unwrap();
    let pids: Vec<u32> = cluster.nodes().iter().filter_map(|node| node.pid()).collect();

    drop(cluster);

    let deadline = Instant::now() + Duration::from_secs(5);
    while !pids.iter().all(|pid| process_is_gone(*pid)) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(pids.iter().all(|pid| process_is_gone(*pid)));
    assert!(is_empty_dir(fixture.parent.path()));
}
