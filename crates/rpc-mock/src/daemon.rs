use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::chain::{MockChain, RecordedRequest};

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;

/// Options for configuring a [`MockDaemon`].
#[derive(Debug, Clone)]
pub struct MockDaemonOptions {
    /// Expected RPC username.
    pub rpc_user: String,

    /// Expected RPC password.
    pub rpc_password: String,

    /// Network name reported by `getblockchaininfo`.
    pub chain: String,

    /// Coins credited to the wallet per generated block.
    pub block_reward: f64,
}

impl Default for MockDaemonOptions {
    fn default() -> Self {
        Self {
            rpc_user: "intcoin".to_string(),
            rpc_password: "intcoin".to_string(),
            chain: "regtest".to_string(),
            block_reward: 50.0,
        }
    }
}

impl MockDaemonOptions {
    /// Sets the expected credentials.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.rpc_user = user.into();
        self.rpc_password = password.into();
        self
    }
}

struct Shared {
    authorization: String,
    chain: Mutex<MockChain>,
    response_delay: Mutex<Duration>,
}

/// A JSON-RPC server answering like `intcoind` on a local port.
///
/// The server shuts down when the value is dropped.
pub struct MockDaemon {
    addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown_token: CancellationToken,
}

impl MockDaemon {
    /// Starts a mock daemon on an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(options: MockDaemonOptions) -> io::Result<Self> {
        Self::start_on_port(0, options).await
    }

    /// Starts a mock daemon on `127.0.0.1:<port>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start_on_port(port: u16, options: MockDaemonOptions) -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
        let addr = listener.local_addr()?;

        let credentials = format!("{}:{}", options.rpc_user, options.rpc_password);
        let shared = Arc::new(Shared {
            authorization: format!("Basic {}", STANDARD.encode(credentials)),
            chain: Mutex::new(MockChain::new(&options.chain, options.block_reward)),
            response_delay: Mutex::new(Duration::ZERO),
        });

        let app = Router::new()
            .route("/", post(handle_rpc))
            .with_state(Arc::clone(&shared));

        let shutdown_token = CancellationToken::new();
        let server_token = shutdown_token.clone();

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(server_token.cancelled_owned())
                .await
            {
                error!("mock daemon server failed: {}", e);
            }
        });

        debug!(%addr, "mock daemon listening");

        Ok(Self {
            addr,
            shared,
            shutdown_token,
        })
    }

    /// Returns the address the server listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server listens on.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the current chain height.
    #[must_use]
    pub fn height(&self) -> u64 {
        self.shared.chain.lock().height()
    }

    /// Moves the chain tip to `height`, as if blocks had been received.
    pub fn set_height(&self, height: u64) {
        self.shared.chain.lock().set_height(height);
    }

    /// Overrides the wallet balance.
    pub fn set_balance(&self, balance: f64) {
        self.shared.chain.lock().set_balance(balance);
    }

    /// Delays every response by `delay`.
    pub fn set_response_delay(&self, delay: Duration) {
        *self.shared.response_delay.lock() = delay;
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.chain.lock().requests().to_vec()
    }

    /// Returns the methods of every request received so far.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.shared
            .chain
            .lock()
            .requests()
            .iter()
            .map(|request| request.method.clone())
            .collect()
    }

    /// Returns the peers added through `addnode`.
    #[must_use]
    pub fn peers(&self) -> Vec<String> {
        self.shared.chain.lock().peers().to_vec()
    }

    /// Whether a `stop` request has been received.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.shared.chain.lock().stop_requested()
    }

    /// Stops serving requests.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

async fn handle_rpc(
    State(shared): State<Arc<Shared>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let delay = *shared.response_delay.lock();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == shared.authorization);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let Ok(request) = serde_json::from_slice::<Value>(&body) else {
        return envelope(
            StatusCode::INTERNAL_SERVER_ERROR,
            &Value::Null,
            Err((PARSE_ERROR, "Parse error".to_string())),
        );
    };

    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or_default();
    let params = request
        .get("params")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let outcome = shared.chain.lock().dispatch(method, &params);
    let status = match &outcome {
        Ok(_) => StatusCode::OK,
        Err((METHOD_NOT_FOUND, _)) => StatusCode::NOT_FOUND,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    envelope(status, &id, outcome)
}

fn envelope(status: StatusCode, id: &Value, outcome: Result<Value, (i64, String)>) -> Response {
    let body = match outcome {
        Ok(result) => json!({ "result": result, "error": null, "id": id }),
        Err((code, message)) => json!({
            "result": null,
            "error": { "code": code, "message": message },
            "id": id,
        }),
    };

    (status, axum::Json(body)).into_response()
}
