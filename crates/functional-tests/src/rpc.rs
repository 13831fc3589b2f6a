//! The RPC surface of a single node.

use async_trait::async_trait;
use intcoin_rpc_client::rpc_error_code;
use intcoin_test_framework::assertions::{
    assert_equal, assert_greater_than, assert_raises_rpc_error,
};
use intcoin_test_framework::{Cluster, Context, FunctionalTest, TestError};
use serde_json::Value;
use tracing::info;

use crate::block::Block;

/// Shapes of the informational RPCs and error reporting.
#[derive(Debug, Clone, Copy)]
pub struct RpcTest;

#[async_trait]
impl FunctionalTest for RpcTest {
    fn name(&self) -> &'static str {
        "rpc"
    }

    fn node_count(&self) -> usize {
        1
    }

    async fn run(&self, cluster: &mut Cluster) -> Result<(), TestError> {
        let node = cluster.node(0)?;
        let rpc = node.rpc();

        let info = rpc.get_blockchain_info().await?;
        assert_equal(info.chain.as_str(), "regtest").context("chain")?;
        assert_equal(info.blocks, 0u64).context("initial blocks")?;

        let network: Value = rpc.call("getnetworkinfo", vec![]).await?;
        for field in ["version", "protocolversion"] {
            assert_equal(network.get(field).is_some(), true)
                .context(format!("getnetworkinfo field {field}"))?;
        }

        node.generate_blocks(10).await?;
        assert_equal(rpc.get_block_count().await?, 10u64).context("height after mining")?;

        let hash = rpc.get_block_hash(1).await?;
        let block = Block::fetch(rpc, &hash).await?;
        assert_equal(block.height, 1u64).context("getblock height")?;
        assert_equal(&block.hash, &hash).context("getblock hash")?;

        assert_raises_rpc_error(
            rpc.call("nonexistentmethod", vec![]).await,
            rpc_error_code::METHOD_NOT_FOUND,
            "",
        )
        .context("unknown method")?;

        let help: String = rpc.call_as("help", vec![]).await?;
        assert_greater_than(help.len(), 0).context("help text")?;

        let peers = rpc.get_peer_info().await?;
        info!(peers = peers.len(), "getpeerinfo returned a list");

        Ok(())
    }
}
