//! RPC transport error types.

use thiserror::Error;

use flowindex_core::error::IndexerError;

use crate::request::JsonRpcError;

/// `RPC_IN_WARMUP`: the node is still loading its block index.
pub const RPC_IN_WARMUP: i64 = -28;
/// `RPC_INVALID_PARAMETER`, returned by `getblockhash` above the tip.
pub const RPC_INVALID_PARAMETER: i64 = -8;

/// Errors that can occur while talking to a Bitcoin node.
#[derive(Debug, Error)]
pub enum RpcError {
    /// HTTP request failed (connection refused, reset, etc.).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success HTTP status without a JSON-RPC error body.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON-RPC error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The client could not be built.
    #[error("client configuration error: {0}")]
    Config(String),
}

impl RpcError {
    /// Returns `true` if this error is retryable (transient).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Rpc(e) => e.code == RPC_IN_WARMUP,
            Self::Deserialization(_) | Self::Config(_) => false,
        }
    }

    /// JSON-RPC error code, if the node answered with one.
    pub fn rpc_code(&self) -> Option<i64> {
        match self {
            Self::Rpc(e) => Some(e.code),
            _ => None,
        }
    }
}

impl From<RpcError> for IndexerError {
    fn from(e: RpcError) -> Self {
        IndexerError::Rpc(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc(code: i64) -> RpcError {
        RpcError::Rpc(JsonRpcError {
            code,
            message: "x".into(),
        })
    }

    #[test]
    fn retryable_classification() {
        assert!(RpcError::Http("connection refused".into()).is_retryable());
        assert!(RpcError::Timeout { ms: 30_000 }.is_retryable());
        assert!(RpcError::Status { status: 503, body: String::new() }.is_retryable());
        assert!(!RpcError::Status { status: 401, body: String::new() }.is_retryable());
        assert!(rpc(RPC_IN_WARMUP).is_retryable());
        assert!(!rpc(RPC_INVALID_PARAMETER).is_retryable());
    }

    #[test]
    fn converts_to_indexer_error() {
        let err: IndexerError = rpc(-5).into();
        assert!(matches!(err, IndexerError::Rpc(ref m) if m.contains("-5")));
    }
}
