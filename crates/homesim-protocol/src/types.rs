//! Envelope, request/response payloads and call status.

use std::fmt;
use std::str::FromStr;

use homesim_core::StateMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DEFAULT_PORT, PROTOCOL_VERSION};

/// Wraps every message with a protocol version and a request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub protocol_version: String,
    /// Correlates a reply with its call.
    pub request_id: String,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(request_id: impl Into<String>, payload: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION.to_string(),
            request_id: request_id.into(),
            payload,
        }
    }

    pub fn request(request_id: impl Into<String>, request: T) -> Self {
        Self::new(request_id, request)
    }

    pub fn response(request_id: impl Into<String>, response: T) -> Self {
        Self::new(request_id, response)
    }

    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

/// Client to backend payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Invoke `service.method` with a serialized argument message.
    Call {
        service: String,
        method: String,
        #[serde(default)]
        arg: Value,
    },
    /// Liveness check.
    Ping,
}

impl Request {
    pub fn call(service: impl Into<String>, method: impl Into<String>, arg: Value) -> Self {
        Self::Call {
            service: service.into(),
            method: method.into(),
            arg,
        }
    }
}

/// Backend to client payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Reply {
        status: Status,
        #[serde(default)]
        reply: Value,
    },
    Pong,
}

impl Response {
    pub fn reply(status: Status, reply: Value) -> Self {
        Self::Reply { status, reply }
    }

    /// A non-OK reply with an empty message.
    pub fn failure(status: Status) -> Self {
        Self::Reply {
            status,
            reply: Value::Object(StateMap::new()),
        }
    }
}

/// Outcome of one RPC call.
///
/// `Ok` and `RpcError` are the two values every caller must handle; the
/// others are finer-grained non-OK outcomes and mean "do not trust the reply".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Ok,
    /// Transport failure: connection reset, malformed reply, timeout.
    RpcError,
    /// The channel was closed before the call.
    Cancelled,
    /// The backend rejected the argument message.
    InvalidArgument,
    /// Unknown service.
    NotFound,
    /// Unknown method on a known service.
    Unimplemented,
    Internal,
    Unavailable,
    /// The call was skipped because another call held the channel.
    Busy,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::RpcError => "RPC_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::Busy => "BUSY",
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing result of a device operation: `{status, reply}`.
///
/// `reply` is empty whenever `status` is not `OK`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResult {
    pub status: Status,
    pub reply: StateMap,
}

impl CallResult {
    pub fn ok(reply: StateMap) -> Self {
        Self {
            status: Status::Ok,
            reply,
        }
    }

    pub fn failed(status: Status) -> Self {
        Self {
            status,
            reply: StateMap::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

/// Address of one backend process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// An endpoint string is not of the form `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid endpoint `{0}`, expected host:port")]
pub struct ParseEndpointError(String);

impl FromStr for Endpoint {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseEndpointError(s.to_string());
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}
