//! Running functional tests against a cluster.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use intcoin_test_cluster::{Cluster, ClusterConfig};
use tracing::{error, info, warn};

use crate::error::TestError;

/// A functional test: how many nodes it needs and what it does with them.
#[async_trait]
pub trait FunctionalTest: Send + Sync {
    /// Short unique name, used to select the test.
    fn name(&self) -> &'static str;

    /// Number of nodes the cluster is set up with.
    fn node_count(&self) -> usize;

    /// Extra daemon arguments per node.
    fn extra_args(&self) -> Vec<Vec<String>> {
        Vec::new()
    }

    /// The test body.
    async fn run(&self, cluster: &mut Cluster) -> Result<(), TestError>;
}

/// Classified result of one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The body completed without error.
    Passed,
    /// An assertion failed.
    AssertionFailed(String),
    /// The test could not run to completion: setup failure, panic, timeout,
    /// or an unexpected error.
    Faulted(String),
}

impl Outcome {
    /// Process exit code for this outcome: 0 when passed, 1 otherwise.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Passed => 0,
            Self::AssertionFailed(_) | Self::Faulted(_) => 1,
        }
    }

    /// Whether the test passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => f.write_str("passed"),
            Self::AssertionFailed(message) => write!(f, "assertion failed: {message}"),
            Self::Faulted(message) => write!(f, "faulted: {message}"),
        }
    }
}

impl From<Result<(), TestError>> for Outcome {
    fn from(result: Result<(), TestError>) -> Self {
        match result {
            Ok(()) => Self::Passed,
            Err(TestError::Assertion(e)) => Self::AssertionFailed(e.to_string()),
            Err(e) => Self::Faulted(e.to_string()),
        }
    }
}

/// Result of one test run.
#[derive(Debug, Clone)]
pub struct TestReport {
    /// Test name.
    pub name: String,
    /// Classified result.
    pub outcome: Outcome,
    /// Wall-clock time including setup and teardown.
    pub duration: Duration,
}

/// Results of a sequence of tests.
#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    /// One report per test, in run order.
    pub reports: Vec<TestReport>,
}

impl SuiteReport {
    /// Number of passed tests.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.reports
            .iter()
            .filter(|report| report.outcome.is_passed())
            .count()
    }

    /// Reports of tests that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &TestReport> {
        self.reports
            .iter()
            .filter(|report| !report.outcome.is_passed())
    }

    /// 0 if every test passed, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        u8::from(self.failures().next().is_some())
    }
}

/// Runs functional tests, each against its own cluster.
#[derive(Debug, Clone)]
pub struct TestRunner {
    template: ClusterConfig,
}

impl TestRunner {
    /// Creates a runner. Each test's cluster is `template` with the test's
    /// node count and extra arguments.
    #[must_use]
    pub const fn new(template: ClusterConfig) -> Self {
        Self { template }
    }

    /// Sets up a cluster from `config`, runs `body` against it and tears it
    /// down on every exit path.
    ///
    /// Panics in `body` are caught and reported as [`Outcome::Faulted`].
    pub async fn run<F>(name: &str, config: ClusterConfig, body: F) -> TestReport
    where
        F: AsyncFnOnce(&mut Cluster) -> Result<(), TestError>,
    {
        let started = Instant::now();
        info!(test = name, nodes = config.node_count, "running test");

        let outcome = match Cluster::setup(config).await {
            Ok(mut cluster) => {
                let result = AssertUnwindSafe(async { body(&mut cluster).await })
                    .catch_unwind()
                    .await;

                let outcome = result.map_or_else(
                    |panic| Outcome::Faulted(format!("test panicked: {}", panic_message(panic))),
                    Outcome::from,
                );

                if let Err(e) = cluster.teardown().await {
                    warn!(test = name, "teardown incomplete: {}", e);
                }

                outcome
            }
            Err(e) => Outcome::Faulted(format!("cluster setup failed: {e}")),
        };

        let duration = started.elapsed();
        if outcome.is_passed() {
            info!(test = name, ?duration, "test passed");
        } else {
            error!(test = name, ?duration, "test {}", outcome);
        }

        TestReport {
            name: name.to_string(),
            outcome,
            duration,
        }
    }

    /// Runs one functional test.
    pub async fn run_test(&self, test: &dyn FunctionalTest) -> TestReport {
        let mut config = self.template.clone();
        config.node_count = test.node_count();
        config.extra_args = test.extra_args();

        Self::run(test.name(), config, async |cluster: &mut Cluster| {
            test.run(cluster).await
        })
        .await
    }

    /// Runs `tests` one after another.
    pub async fn run_suite(&self, tests: &[Box<dyn FunctionalTest>]) -> SuiteReport {
        let mut suite = SuiteReport::default();

        for test in tests {
            suite.reports.push(self.run_test(test.as_ref()).await);
        }

        info!(
            passed = suite.passed(),
            total = suite.reports.len(),
            "suite finished"
        );
        for report in suite.failures() {
            error!(test = %report.name, "{}", report.outcome);
        }

        suite
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic.downcast::<String>().map_or_else(
        |panic| {
            panic.downcast::<&'static str>().map_or_else(
                |_| "unknown panic".to_owned(),
                |message| (*message).to_owned(),
            )
        },
        |message| *message,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::AssertionError;

    #[test]
    fn test_only_assertions_are_failures() {
        let failed = Outcome::from(Err(TestError::from(AssertionError::new("expected 1, got 2"))));
        let faulted = Outcome::from(Err(TestError::from(intcoin_rpc_client::Error::Rpc {
            code: -32601,
            message: "Method not found".to_string(),
        })));

        assert_eq!(Outcome::from(Ok(())), Outcome::Passed);
        assert_eq!(failed, Outcome::AssertionFailed("expected 1, got 2".to_string()));
        assert!(matches!(faulted, Outcome::Faulted(ref message) if message.contains("Method not found")));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Outcome::Passed.exit_code(), 0);
        assert_eq!(Outcome::AssertionFailed(String::new()).exit_code(), 1);
        assert_eq!(Outcome::Faulted(String::new()).exit_code(), 1);
    }

    #[test]
    fn test_suite_exit_code() {
        let report = |outcome| TestReport {
            name: "t".to_string(),
            outcome,
            duration: Duration::ZERO,
        };
        let mut suite = SuiteReport::default();
        assert_eq!(suite.exit_code(), 0);

        suite.reports.push(report(Outcome::Passed));
        assert_eq!(suite.exit_code(), 0);

        suite.reports.push(report(Outcome::Faulted("boom".to_string())));
        assert_eq!(suite.exit_code(), 1);
        assert_eq!(suite.passed(), 1);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(7)), "unknown panic");
    }
}
