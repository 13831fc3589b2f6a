//! Transfers between the wallets of two nodes.

use async_trait::async_trait;
use intcoin_rpc_client::rpc_error_code;
use intcoin_test_framework::assertions::{
    assert_equal, assert_greater_or_equal, assert_greater_than, assert_raises_rpc_error,
};
use intcoin_test_framework::{Cluster, Context, FunctionalTest, TestError};
use tracing::info;

/// Blocks needed before the first coinbase can be spent.
const COINBASE_MATURITY: u64 = 100;

/// Sending coins between two nodes and rejecting overspends.
#[derive(Debug, Clone, Copy)]
pub struct WalletTest;

#[async_trait]
impl FunctionalTest for WalletTest {
    fn name(&self) -> &'static str {
        "wallet"
    }

    fn node_count(&self) -> usize {
        2
    }

    async fn run(&self, cluster: &mut Cluster) -> Result<(), TestError> {
        cluster.connect_chain().await?;
        let timeout = cluster.config().sync_timeout;
        let (node0, node1) = (cluster.node(0)?, cluster.node(1)?);

        node0.generate_blocks(COINBASE_MATURITY + 1).await?;
        let balance0 = node0.rpc().get_balance().await?;
        assert_greater_than(balance0, 0.0).context("node 0 balance after mining")?;

        let address0 = node0.rpc().get_new_address().await?;
        let address1 = node1.rpc().get_new_address().await?;

        let txid = node0.rpc().send_to_address(&address1, 50.0).await?;
        info!(%txid, "sent 50 to node 1");
        node0.generate_blocks(1).await?;
        cluster.sync_all().await?;

        let received = cluster.wait_for_balance(1, 50.0, timeout).await?;
        assert_equal(received, true).context("node 1 received 50")?;
        assert_greater_or_equal(node1.rpc().get_balance().await?, 50.0)
            .context("node 1 balance")?;

        let txid = node1.rpc().send_to_address(&address0, 25.0).await?;
        info!(%txid, "sent 25 back to node 0");
        node0.generate_blocks(1).await?;
        cluster.sync_all().await?;

        let final0 = node0.rpc().get_balance().await?;
        let final1 = node1.rpc().get_balance().await?;
        info!(node0 = final0, node1 = final1, "final balances");

        assert_raises_rpc_error(
            node1.rpc().send_to_address(&address0, 999_999.0).await,
            rpc_error_code::WALLET_INSUFFICIENT_FUNDS,
            "insufficient funds",
        )
        .context("overspend")?;

        Ok(())
    }
}
