//! Client error types.

use std::fmt;

use homesim_core::SchemaViolation;
use homesim_protocol::ProtocolError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced to callers of the client.
///
/// Runtime call failures are not errors: they come back as a non-OK
/// [`homesim_protocol::Status`]. Only initialization problems and caller
/// mistakes end up here.
#[derive(Debug)]
pub enum ClientError {
    /// The backend was unreachable when the channel was opened.
    Connection(String),
    Config(String),
    Io(std::io::Error),
    /// Framing or protocol failure outside of a call.
    Protocol(ProtocolError),
    /// A mapping did not fit the message schema.
    Schema(SchemaViolation),
    /// A background thread could not be started or joined.
    Thread(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(msg) => write!(f, "connection error: {}", msg),
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Protocol(err) => write!(f, "protocol error: {}", err),
            Self::Schema(err) => write!(f, "schema violation: {}", err),
            Self::Thread(msg) => write!(f, "thread error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Protocol(err) => Some(err),
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<SchemaViolation> for ClientError {
    fn from(err: SchemaViolation) -> Self {
        Self::Schema(err)
    }
}
