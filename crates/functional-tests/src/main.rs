//! Runs the `intcoind` functional tests against locally spawned clusters.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use intcoin_functional_tests::{TestRunner, all_tests, select_tests};
use intcoin_test_cluster::{ClusterConfig, DEFAULT_BASE_PORT, DEFAULT_BASE_RPC_PORT};
use intcoin_test_node::{NodeOptions, discover_daemon};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the intcoind binary; searched for in build directories and
    /// on PATH if unset
    #[arg(long, env = "INTCOIND")]
    daemon: Option<PathBuf>,

    /// P2P port of node 0
    #[arg(long, default_value_t = DEFAULT_BASE_PORT, env = "INTCOIN_TEST_BASE_PORT")]
    base_port: u16,

    /// RPC port of node 0
    #[arg(long, default_value_t = DEFAULT_BASE_RPC_PORT, env = "INTCOIN_TEST_BASE_RPC_PORT")]
    base_rpc_port: u16,

    /// Directory the per-test temporary directories are created in
    #[arg(long, env = "INTCOIN_TEST_TMPDIR")]
    tmpdir: Option<PathBuf>,

    /// Keep node data directories after each test
    #[arg(long)]
    keep_tmpdir: bool,

    /// Seconds a node may take to answer RPC after launch
    #[arg(long, default_value_t = 60)]
    startup_timeout_secs: u64,

    /// Seconds to wait for nodes to agree on a height
    #[arg(long, default_value_t = 60)]
    sync_timeout_secs: u64,

    /// List the available tests and exit
    #[arg(long)]
    list: bool,

    /// Tests to run, in order; all tests if none are given
    tests: Vec<String>,
}

impl Args {
    fn cluster_template(&self, daemon: PathBuf) -> ClusterConfig {
        let options = NodeOptions::new(daemon)
            .with_startup_timeout(Duration::from_secs(self.startup_timeout_secs));

        let mut config = ClusterConfig::new(1, options)
            .with_ports(self.base_port, self.base_rpc_port)
            .with_sync_timeout(Duration::from_secs(self.sync_timeout_secs))
            .with_keep_tmpdir(self.keep_tmpdir);

        if let Some(tmpdir) = &self.tmpdir {
            config = config.with_tmpdir_parent(tmpdir);
        }

        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list {
        for test in all_tests() {
            println!("{:<12} {} node(s)", test.name(), test.node_count());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let tests = select_tests(&args.tests)?;
    let daemon = discover_daemon(args.daemon.as_deref())
        .context("cannot run functional tests without an intcoind binary")?;
    info!(daemon = %daemon.display(), tests = tests.len(), "starting functional tests");

    let runner = TestRunner::new(args.cluster_template(daemon));
    let suite = runner.run_suite(&tests).await;

    println!();
    for report in &suite.reports {
        println!(
            "{:<12} {:>8.2?}  {}",
            report.name, report.duration, report.outcome
        );
    }
    println!("{}/{} passed", suite.passed(), suite.reports.len());

    Ok(ExitCode::from(suite.exit_code()))
}
