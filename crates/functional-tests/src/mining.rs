//! Block generation on a single node.

use async_trait::async_trait;
use intcoin_test_framework::assertions::{assert_equal, assert_greater_than};
use intcoin_test_framework::{Cluster, Context, FunctionalTest, TestError};
use tracing::info;

use crate::block::Block;

/// Block generation, rewards and block metadata.
#[derive(Debug, Clone, Copy)]
pub struct MiningTest;

#[async_trait]
impl FunctionalTest for MiningTest {
    fn name(&self) -> &'static str {
        "mining"
    }

    fn node_count(&self) -> usize {
        1
    }

    async fn run(&self, cluster: &mut Cluster) -> Result<(), TestError> {
        let node = cluster.node(0)?;
        let rpc = node.rpc();

        let initial = rpc.get_block_count().await?;
        let hashes = node.generate_blocks(1).await?;
        assert_equal(hashes.len(), 1usize).context("single block generation")?;
        assert_equal(rpc.get_block_count().await?, initial + 1).context("height after one block")?;

        let hashes = node.generate_blocks(100).await?;
        assert_equal(hashes.len(), 100usize).context("batch generation")?;
        assert_equal(rpc.get_block_count().await?, 101u64).context("height after batch")?;

        let balance = rpc.get_balance().await?;
        assert_greater_than(balance, 0.0).context("mining rewards")?;
        info!(balance, "mining rewards accumulated");

        let best = Block::fetch(rpc, &rpc.get_best_block_hash().await?).await?;
        assert_equal(best.height, 101u64).context("best block height")?;
        assert_greater_than(best.time, 0).context("best block timestamp")?;

        node.generate_blocks(50).await?;
        assert_equal(rpc.get_block_count().await?, 151u64).context("final height")?;

        let hashes = node.generate_blocks(0).await?;
        assert_equal(hashes.len(), 0usize).context("generating zero blocks")?;
        assert_equal(rpc.get_block_count().await?, 151u64).context("height after generating zero blocks")?;

        Ok(())
    }
}
