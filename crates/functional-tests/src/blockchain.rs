//! Block propagation across three connected nodes.

use async_trait::async_trait;
use intcoin_test_framework::assertions::assert_equal;
use intcoin_test_framework::{Cluster, Context, FunctionalTest, TestError};
use tracing::info;

/// Blocks mined on any node of a chain-connected cluster reach every node.
#[derive(Debug, Clone, Copy)]
pub struct BlockchainTest;

#[async_trait]
impl FunctionalTest for BlockchainTest {
    fn name(&self) -> &'static str {
        "blockchain"
    }

    fn node_count(&self) -> usize {
        3
    }

    async fn run(&self, cluster: &mut Cluster) -> Result<(), TestError> {
        cluster.connect_chain().await?;

        assert_heights(cluster, 0).await?;

        for (miner, blocks, expected) in [(0, 10, 10), (1, 5, 15)] {
            cluster.node(miner)?.generate_blocks(blocks).await?;
            let height = cluster.sync_all().await?;
            assert_equal(height, expected).context(format!("height after node {miner} mined"))?;
            assert_heights(cluster, expected).await?;
            info!(height, "all nodes synchronised");
        }

        for height in 1..=15 {
            let hashes = cluster.block_hashes_at(height).await?;
            for (index, hash) in hashes.iter().enumerate().skip(1) {
                assert_equal(hash, &hashes[0])
                    .context(format!("block {height} hash on node {index}"))?;
            }
        }

        cluster.node(2)?.generate_blocks(20).await?;
        cluster.sync_all().await?;
        assert_equal(cluster.rpc(0)?.get_block_count().await?, 35u64)
            .context("height after node 2 mined")?;

        let info = cluster.rpc(0)?.get_blockchain_info().await?;
        assert_equal(info.chain.as_str(), "regtest").context("chain")?;
        assert_equal(info.blocks, 35u64).context("blockchain info blocks")?;

        Ok(())
    }
}

async fn assert_heights(cluster: &Cluster, expected: u64) -> Result<(), TestError> {
    for node in cluster.nodes() {
        let height = node.rpc().get_block_count().await?;
        assert_equal(height, expected).context(format!("height of node {}", node.index()))?;
    }

    Ok(())
}
