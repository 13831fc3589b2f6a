//! Error types for the rpc-client crate.

use thiserror::Error;

/// Result type for RPC operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the rpc-client crate.
#[derive(Debug, Error)]
pub enum Error
where
    Self: Send + Sync,
{
    /// The daemon answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// Numeric JSON-RPC error code.
        code: i64,
        /// Human-readable error message.
        message: String,
    },

    /// The request never produced a response (connection refused, timeout, ...).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The daemon answered with a non-success status and a body that is not
    /// a JSON-RPC envelope (for example `401` on bad credentials).
    #[error("http status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The response body is not a JSON-RPC envelope.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The result could not be decoded into the requested type.
    #[error("failed to decode result of `{method}`: {source}")]
    Decode {
        /// The method whose result failed to decode.
        method: String,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The endpoint URL could not be built.
    #[error("invalid rpc url: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if the daemon could not be reached or did not answer
    /// with a well-formed JSON-RPC envelope.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HttpStatus { .. } | Self::MalformedResponse(_)
        )
    }

    /// Returns the JSON-RPC error code if this is an application error.
    #[must_use]
    pub const fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns the JSON-RPC error message if this is an application error.
    #[must_use]
    pub fn rpc_message(&self) -> Option<&str> {
        match self {
            Self::Rpc { message, .. } => Some(message),
            _ => None,
        }
    }
}
