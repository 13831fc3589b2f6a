//! Typed `getblock` results.

use intcoin_rpc_client::RpcClient;
use serde::Deserialize;
use serde_json::json;

/// The fields of a `getblock` result the tests look at.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Block {
    /// Block hash.
    pub hash: String,

    /// Height in the chain.
    pub height: u64,

    /// Block timestamp in seconds since the epoch.
    pub time: u64,
}

impl Block {
    /// Fetches the block with `hash`.
    ///
    /// # Errors
    ///
    /// Returns the RPC error if the call fails or the result has a different
    /// shape.
    pub async fn fetch(rpc: &RpcClient, hash: &str) -> intcoin_rpc_client::Result<Self> {
        rpc.call_as("getblock", vec![json!(hash)]).await
    }
}
