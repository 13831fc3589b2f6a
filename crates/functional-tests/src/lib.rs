//! Functional tests for `intcoind`, written against the cluster harness.
//!
//! Each test is a [`FunctionalTest`] with its own node count. Run them with
//! the `intcoin-functional` binary or through [`TestRunner`] directly.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod basic;
mod block;
mod blockchain;
mod mining;
mod rpc;
mod wallet;

pub use basic::BasicTest;
pub use block::Block;
pub use blockchain::BlockchainTest;
pub use intcoin_test_framework::{FunctionalTest, TestRunner};
pub use mining::MiningTest;
pub use rpc::RpcTest;
pub use wallet::WalletTest;

use thiserror::Error;

/// A requested test name matched no functional test.
#[derive(Debug, Error)]
#[error("unknown test {name:?} (available: {})", test_names().join(", "))]
pub struct UnknownTestError {
    /// The name that was requested.
    pub name: String,
}

/// Every functional test, in the order they run by default.
#[must_use]
pub fn all_tests() -> Vec<Box<dyn FunctionalTest>> {
    vec![
        Box::new(BasicTest),
        Box::new(MiningTest),
        Box::new(BlockchainTest),
        Box::new(RpcTest),
        Box::new(WalletTest),
    ]
}

/// Names of every functional test.
#[must_use]
pub fn test_names() -> Vec<&'static str> {
    all_tests().iter().map(|test| test.name()).collect()
}

/// Selects tests by name, in the order given. An empty selection means every
/// test.
///
/// # Errors
///
/// Returns [`UnknownTestError`] for the first name that matches no test.
pub fn select_tests(names: &[String]) -> Result<Vec<Box<dyn FunctionalTest>>, UnknownTestError> {
    if names.is_empty() {
        return Ok(all_tests());
    }

    let mut available = all_tests();
    let mut selected = Vec::with_capacity(names.len());

    for name in names {
        let position = available
            .iter()
            .position(|test| test.name() == name.as_str())
            .ok_or_else(|| UnknownTestError { name: name.clone() })?;
        selected.push(available.swap_remove(position));
    }

    Ok(selected)
}
