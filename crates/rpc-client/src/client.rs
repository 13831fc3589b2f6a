use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::trace;
use url::Url;

use crate::error::{Error, Result};
use crate::types::{BlockchainInfo, RpcRequest, RpcResponse};

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for configuring an [`RpcClient`].
#[derive(Debug, Clone)]
pub struct RpcClientOptions {
    /// Host the daemon listens on.
    pub host: String,

    /// RPC port.
    pub port: u16,

    /// RPC username.
    pub user: String,

    /// RPC password.
    pub password: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl RpcClientOptions {
    /// Creates options for a daemon on `127.0.0.1:<port>`.
    #[must_use]
    pub fn new(port: u16, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
            user: user.into(),
            password: password.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// JSON-RPC client bound to a single daemon instance.
#[derive(Debug, Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: Url,
    user: String,
    password: String,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Creates a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(options: RpcClientOptions) -> Result<Self> {
        let url = Url::parse(&format!("http://{}:{}/", options.host, options.port))?;

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            client,
            url,
            user: options.user,
            password: options.password,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Calls `method` with positional `params` and returns the raw result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] if the daemon rejected the call, or a transport
    /// error if no well-formed response was received.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);

        trace!(url = %self.url, id, method, "sending rpc request");

        let response = self
            .client
            .post(self.url.clone())
            .basic_auth(&self.user, Some(&self.password))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        // Daemons report RPC errors with 404/500 and a JSON body, so the
        // status only matters when the body is not an envelope.
        match RpcResponse::from_slice(&body) {
            Ok(envelope) => {
                let result = envelope.into_result();
                trace!(id, method, ok = result.is_ok(), "received rpc response");
                result
            }
            Err(_) if !status.is_success() => Err(Error::HttpStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            Err(e) => Err(e),
        }
    }

    /// Calls `method` and decodes the result into `R`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::call`], plus [`Error::Decode`] if the result has an
    /// unexpected shape.
    pub async fn call_as<R: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<R> {
        let value = self.call(method, params).await?;

        serde_json::from_value(value).map_err(|source| Error::Decode {
            method: method.to_string(),
            source,
        })
    }

    /// Returns the current chain height.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_block_count(&self) -> Result<u64> {
        self.call_as("getblockcount", vec![]).await
    }

    /// Returns the hash of the block at `height`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_block_hash(&self, height: u64) -> Result<String> {
        self.call_as("getblockhash", vec![json!(height)]).await
    }

    /// Returns the hash of the chain tip.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_best_block_hash(&self) -> Result<String> {
        self.call_as("getbestblockhash", vec![]).await
    }

    /// Returns chain information. Used as the readiness probe.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_blockchain_info(&self) -> Result<BlockchainInfo> {
        self.call_as("getblockchaininfo", vec![]).await
    }

    /// Returns the wallet balance.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_balance(&self) -> Result<f64> {
        self.call_as("getbalance", vec![]).await
    }

    /// Returns a fresh wallet address.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_new_address(&self) -> Result<String> {
        self.call_as("getnewaddress", vec![]).await
    }

    /// Sends `amount` coins to `address` and returns the transaction id.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails, e.g. on insufficient funds.
    pub async fn send_to_address(&self, address: &str, amount: f64) -> Result<String> {
        self.call_as("sendtoaddress", vec![json!(address), json!(amount)])
            .await
    }

    /// Mines `blocks` blocks and returns their hashes.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn generate(&self, blocks: u64) -> Result<Vec<String>> {
        self.call_as("generate", vec![json!(blocks)]).await
    }

    /// Asks the daemon to open a one-shot connection to `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn add_node(&self, address: &str) -> Result<()> {
        self.call("addnode", vec![json!(address), json!("onetry")])
            .await
            .map(|_| ())
    }

    /// Returns the daemon's peer list.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn get_peer_info(&self) -> Result<Vec<Value>> {
        self.call_as("getpeerinfo", vec![]).await
    }

    /// Requests a graceful shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the call fails.
    pub async fn stop(&self) -> Result<()> {
        self.call("stop", vec![]).await.map(|_| ())
    }
}
