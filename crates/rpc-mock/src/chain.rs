use serde_json::{Value, json};

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const WALLET_INSUFFICIENT_FUNDS: i64 = -6;
const INVALID_PARAMETER: i64 = -8;
const INVALID_ADDRESS_OR_KEY: i64 = -5;

/// Timestamp of the mock genesis block; blocks follow every ten minutes.
const GENESIS_TIME: u64 = 1_700_000_000;

/// Returns the deterministic hash the mock assigns to the block at `height`.
#[must_use]
pub fn block_hash(height: u64) -> String {
    format!("{height:064x}")
}

/// A request received by a mock daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Method name.
    pub method: String,

    /// Positional parameters.
    pub params: Vec<Value>,
}

/// In-memory chain and wallet state of a mock daemon.
#[derive(Debug, Clone)]
pub struct MockChain {
    chain: String,
    height: u64,
    balance: f64,
    block_reward: f64,
    next_address: u64,
    next_txid: u64,
    peers: Vec<String>,
    requests: Vec<RecordedRequest>,
    stop_requested: bool,
}

impl MockChain {
    pub(crate) fn new(chain: &str, block_reward: f64) -> Self {
        Self {
            chain: chain.to_string(),
            height: 0,
            balance: 0.0,
            block_reward,
            next_address: 0,
            next_txid: 0,
            peers: Vec::new(),
            requests: Vec::new(),
            stop_requested: false,
        }
    }

    /// Current chain height.
    #[must_use]
    pub const fn height(&self) -> u64 {
        self.height
    }

    /// Current wallet balance.
    #[must_use]
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Peers added through `addnode`.
    #[must_use]
    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    /// Whether a `stop` request has been received.
    #[must_use]
    pub const fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub(crate) fn set_height(&mut self, height: u64) {
        self.height = height;
    }

    pub(crate) fn set_balance(&mut self, balance: f64) {
        self.balance = balance;
    }

    /// Dispatches one call. `Err` carries `(code, message)`.
    pub(crate) fn dispatch(
        &mut self,
        method: &str,
        params: &[Value],
    ) -> Result<Value, (i64, String)> {
        self.requests.push(RecordedRequest {
            method: method.to_string(),
            params: params.to_vec(),
        });

        match method {
            "getblockchaininfo" => Ok(json!({
                "chain": self.chain,
                "blocks": self.height,
                "bestblockhash": block_hash(self.height),
            })),
            "getblockcount" => Ok(json!(self.height)),
            "getbestblockhash" => Ok(json!(block_hash(self.height))),
            "getblock" => {
                let height = params
                    .first()
                    .and_then(Value::as_str)
                    .and_then(|hash| u64::from_str_radix(hash, 16).ok())
                    .filter(|height| *height <= self.height)
                    .ok_or_else(|| (INVALID_ADDRESS_OR_KEY, "Block not found".to_string()))?;
                Ok(json!({
                    "hash": block_hash(height),
                    "height": height,
                    "time": GENESIS_TIME + height * 600,
                }))
            }
            "getnetworkinfo" => Ok(json!({
                "version": 10000,
                "subversion": "/INTcoin:0.1.0/",
                "protocolversion": 70015,
                "connections": self.peers.len(),
            })),
            "help" => Ok(json!(
                "addnode \"node\" \"command\"\ngenerate nblocks\ngetbalance\ngetblock \"hash\"\n\
                 getblockchaininfo\ngetblockcount\ngetblockhash height\ngetnetworkinfo\n\
                 getnewaddress\ngetpeerinfo\nsendtoaddress \"address\" amount\nstop"
            )),
            "getblockhash" => {
                let height = u64_param(params, 0)?;
                if height > self.height {
                    return Err((INVALID_PARAMETER, "Block height out of range".to_string()));
                }
                Ok(json!(block_hash(height)))
            }
            "generate" => {
                let blocks = u64_param(params, 0)?;
                let first = self.height + 1;
                self.height += blocks;
                #[allow(clippy::cast_precision_loss)]
                {
                    self.balance += blocks as f64 * self.block_reward;
                }
                Ok(json!((first..=self.height).map(block_hash).collect::<Vec<_>>()))
            }
            "getbalance" => Ok(json!(self.balance)),
            "getnewaddress" => {
                self.next_address += 1;
                Ok(json!(format!("int1qmock{:032x}", self.next_address)))
            }
            "sendtoaddress" => {
                let amount = params
                    .get(1)
                    .and_then(Value::as_f64)
                    .ok_or_else(|| (INVALID_PARAMS, "Invalid amount".to_string()))?;
                if amount > self.balance {
                    return Err((WALLET_INSUFFICIENT_FUNDS, "Insufficient funds".to_string()));
                }
                self.balance -= amount;
                self.next_txid += 1;
                Ok(json!(format!("{:064x}", u64::MAX - self.next_txid)))
            }
            "addnode" => {
                let address = params
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| (INVALID_PARAMS, "Invalid node address".to_string()))?;
                self.peers.push(address.to_string());
                Ok(Value::Null)
            }
            "getpeerinfo" => Ok(json!(
                self.peers
                    .iter()
                    .map(|addr| json!({ "addr": addr }))
                    .collect::<Vec<_>>()
            )),
            "stop" => {
                self.stop_requested = true;
                Ok(json!("INTcoin server stopping"))
            }
            _ => Err((METHOD_NOT_FOUND, "Method not found".to_string())),
        }
    }
}

fn u64_param(params: &[Value], index: usize) -> Result<u64, (i64, String)> {
    params
        .get(index)
        .and_then(Value::as_u64)
        .ok_or_else(|| (INVALID_PARAMS, format!("Expected integer parameter {index}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_extends_chain_and_credits_reward() {
        let mut chain = MockChain::new("regtest", 50.0);

        let hashes = chain.dispatch("generate", &[json!(3)]).unwrap();

        assert_eq!(hashes, json!([block_hash(1), block_hash(2), block_hash(3)]));
        assert_eq!(chain.height(), 3);
        assert!((chain.balance() - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_send_more_than_balance_is_rejected() {
        let mut chain = MockChain::new("regtest", 50.0);
        chain.set_balance(10.0);

        let error = chain
            .dispatch("sendtoaddress", &[json!("int1qx"), json!(11.0)])
            .unwrap_err();

        assert_eq!(error.0, WALLET_INSUFFICIENT_FUNDS);
    }

    #[test]
    fn test_getblock_resolves_generated_hashes() {
        let mut chain = MockChain::new("regtest", 50.0);
        chain.dispatch("generate", &[json!(2)]).unwrap();

        let block = chain.dispatch("getblock", &[json!(block_hash(1))]).unwrap();
        let missing = chain.dispatch("getblock", &[json!(block_hash(3))]).unwrap_err();

        assert_eq!(block["height"], json!(1));
        assert_eq!(missing.0, INVALID_ADDRESS_OR_KEY);
    }

    #[test]
    fn test_unknown_method() {
        let mut chain = MockChain::new("regtest", 50.0);

        let error = chain.dispatch("nonexistentmethod", &[]).unwrap_err();

        assert_eq!(error.0, METHOD_NOT_FOUND);
        assert_eq!(chain.requests().len(), 1);
    }
}
