//! JSON-RPC client for a running `intcoind` instance.
//!
//! The client performs exactly one HTTP round trip per call and never
//! retries. Application failures reported by the daemon surface as
//! [`Error::Rpc`]; everything that prevented a well-formed answer from
//! arriving is a transport failure (see [`Error::is_transport`]).
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod client;
mod error;
pub mod rpc_error_code;
mod types;

pub use client::{RpcClient, RpcClientOptions};
pub use error::{Error, Result};
pub use types::{BlockchainInfo, RpcErrorObject, RpcRequest, RpcResponse};
