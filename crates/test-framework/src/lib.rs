//! Test runner and assertions for `intcoind` functional tests.
//!
//! A functional test is an async body run against a freshly set-up
//! [`Cluster`]. The [`TestRunner`] owns the cluster for the duration of the
//! test, classifies the result into an [`Outcome`], and tears the cluster
//! down on every exit path, panics included.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

pub mod assertions;
mod error;
mod runner;

pub use assertions::{AssertionError, AssertionResult, Context};
pub use error::TestError;
pub use intcoin_test_cluster::{Cluster, ClusterConfig};
pub use runner::{FunctionalTest, Outcome, SuiteReport, TestReport, TestRunner};
