//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while framing or exchanging messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u32, max: u32 },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a frame.
    #[error("incomplete message: expected {expected} bytes, got {received}")]
    IncompleteMessage { expected: usize, received: usize },

    #[error("empty message")]
    EmptyMessage,

    /// The peer closed the connection while a reply was expected.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A reply arrived for a different call.
    #[error("reply id {actual} does not match request id {expected}")]
    RequestIdMismatch { expected: String, actual: String },

    /// The reply payload does not answer the request that was sent.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("timeout during {operation}")]
    Timeout { operation: String },
}

impl ProtocolError {
    /// Builds a timeout error for the given operation.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Maps an I/O error, turning socket timeouts into [`ProtocolError::Timeout`].
    pub fn from_io(error: std::io::Error, operation: &str) -> Self {
        match error.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                Self::timeout(operation)
            }
            _ => Self::Io(error),
        }
    }
}
