//! Error types for copilot-rpc.

use thiserror::Error;

/// Main error type for all transport operations.
#[derive(Debug, Error)]
pub enum RpcError {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Framing violation (oversized body, runaway header).
    #[error("frame error: {0}")]
    Frame(String),

    /// The request-id counter produced a collision in the correlation table.
    /// Fatal to the single request, not to the connection.
    #[error("duplicate request id: {0}")]
    DuplicateId(u64),

    /// The server answered a request with an `error` payload.
    /// Carries the server-supplied value verbatim.
    #[error("server error: {0}")]
    Server(serde_json::Value),

    /// The connection closed; delivered to every request still pending
    /// at that point so no caller hangs forever.
    #[error("connection closed")]
    ConnectionClosed,

    /// A per-request deadline expired before the response arrived.
    #[error("request timed out")]
    Timeout,
}

/// Result type alias using [`RpcError`].
pub type Result<T> = std::result::Result<T, RpcError>;
