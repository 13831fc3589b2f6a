//! Well-known JSON-RPC error codes returned by `intcoind`.

/// The request body could not be parsed.
pub const PARSE_ERROR: i64 = -32700;
/// The request is not a valid JSON-RPC request.
pub const INVALID_REQUEST: i64 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

/// Generic application error.
pub const MISC_ERROR: i64 = -1;
/// Unexpected type was passed as a parameter.
pub const TYPE_ERROR: i64 = -3;
/// Generic wallet error.
pub const WALLET_ERROR: i64 = -4;
/// Invalid address or key.
pub const INVALID_ADDRESS_OR_KEY: i64 = -5;
/// Not enough funds in the wallet.
pub const WALLET_INSUFFICIENT_FUNDS: i64 = -6;
/// Invalid, missing or duplicate parameter.
pub const INVALID_PARAMETER: i64 = -8;
/// The daemon is still warming up.
pub const IN_WARMUP: i64 = -28;
