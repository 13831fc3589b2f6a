//! JSON-RPC envelopes and the few result shapes the harness depends on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: &'static str,

    /// Request id. Only used to correlate logs; uniqueness is not required.
    pub id: u64,

    /// Method name.
    pub method: String,

    /// Ordered positional parameters.
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// The error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RpcErrorObject {
    /// Numeric error code.
    pub code: i64,

    /// Error message.
    pub message: String,
}

/// A JSON-RPC response carrying either a result or an error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcResponse {
    /// The result value, `None` when absent or `null`.
    #[serde(default)]
    pub result: Option<Value>,

    /// The error object, `None` when absent or `null`.
    #[serde(default)]
    pub error: Option<RpcErrorObject>,

    /// Echoed request id.
    #[serde(default)]
    pub id: Option<Value>,
}

impl RpcResponse {
    /// Parses a response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if the body is not a JSON object
    /// carrying a `result` or an `error` member.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Error::MalformedResponse(format!("invalid json: {e}")))?;

        let Some(object) = value.as_object() else {
            return Err(Error::MalformedResponse(format!(
                "expected a json object, got {value}"
            )));
        };

        if !object.contains_key("result") && !object.contains_key("error") {
            return Err(Error::MalformedResponse(
                "response has neither `result` nor `error`".to_string(),
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| Error::MalformedResponse(format!("invalid envelope: {e}")))
    }

    /// Converts the envelope into the call outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rpc`] if the envelope carries a non-null error.
    pub fn into_result(self) -> Result<Value> {
        if let Some(RpcErrorObject { code, message }) = self.error {
            return Err(Error::Rpc { code, message });
        }

        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Subset of the `getblockchaininfo` result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockchainInfo {
    /// Network name, `"regtest"` for harness-managed nodes.
    pub chain: String,

    /// Current chain height.
    pub blocks: u64,

    /// Hash of the chain tip.
    #[serde(default)]
    pub bestblockhash: Option<String>,
}
