//! Mining, balances and a simple send on a single node.

use async_trait::async_trait;
use intcoin_test_framework::assertions::{assert_equal, assert_greater_than, assert_not_equal};
use intcoin_test_framework::{Cluster, Context, FunctionalTest, TestError};
use tracing::info;

/// Basic chain and wallet operations on one node.
#[derive(Debug, Clone, Copy)]
pub struct BasicTest;

#[async_trait]
impl FunctionalTest for BasicTest {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn node_count(&self) -> usize {
        1
    }

    async fn run(&self, cluster: &mut Cluster) -> Result<(), TestError> {
        let node = cluster.node(0)?;
        let rpc = node.rpc();

        assert_equal(rpc.get_block_count().await?, 0u64).context("initial block count")?;

        let hashes = node.generate_blocks(10).await?;
        assert_equal(hashes.len(), 10usize).context("generated block hashes")?;
        assert_equal(rpc.get_block_count().await?, 10u64).context("block count after mining")?;

        let balance = rpc.get_balance().await?;
        assert_greater_than(balance, 0.0).context("balance after mining")?;
        info!(balance, "mined 10 blocks");

        let address = rpc.get_new_address().await?;
        assert_not_equal(address.as_str(), "").context("new address")?;

        let txid = rpc.send_to_address(&address, 10.0).await?;
        assert_equal(txid.len(), 64usize).context("transaction id length")?;
        info!(%txid, "transaction sent");

        node.generate_blocks(1).await?;
        assert_equal(rpc.get_block_count().await?, 11u64).context("block count after confirming")?;

        Ok(())
    }
}
